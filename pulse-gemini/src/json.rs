//! JSON extraction helper
//!
//! Models occasionally wrap JSON in markdown code fences even when asked
//! not to. Strip those before handing the text to serde.

use pulse_core::{PulseError, PulseResult};

/// Extract JSON from a response that might contain markdown code blocks
pub fn extract_json(content: &str) -> PulseResult<String> {
    // Fenced ```json block first
    if let Some(start) = content.find("```json") {
        let start = start + 7;
        if let Some(end) = content[start..].find("```") {
            return Ok(content[start..start + end].trim().to_string());
        }
    }

    // Plain ``` fence, skipping a language identifier if present
    if let Some(start) = content.find("```") {
        let start = start + 3;
        let start = content[start..]
            .find('\n')
            .map(|n| start + n + 1)
            .unwrap_or(start);
        if let Some(end) = content[start..].find("```") {
            return Ok(content[start..start + end].trim().to_string());
        }
    }

    // Raw JSON object or array
    let object = outermost(content, '{', '}');
    let array = outermost(content, '[', ']');
    match (object, array) {
        (Some((os, oe)), Some((as_, ae))) => {
            // Prefer whichever opens first
            if as_ < os {
                Ok(content[as_..=ae].to_string())
            } else {
                Ok(content[os..=oe].to_string())
            }
        }
        (Some((s, e)), None) | (None, Some((s, e))) => Ok(content[s..=e].to_string()),
        (None, None) => Err(PulseError::parse("No JSON found in response")),
    }
}

fn outermost(content: &str, open: char, close: char) -> Option<(usize, usize)> {
    let start = content.find(open)?;
    let end = content.rfind(close)?;
    (end > start).then_some((start, end))
}
