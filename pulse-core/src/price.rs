//! Price snapshot types

use serde::{Deserialize, Serialize};

/// A web citation backing a grounded price snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSource {
    pub title: String,
    pub url: String,
}

/// Current price picture for one symbol
///
/// Price fields are display strings as produced by the upstream model;
/// the documented failure placeholder is `"---"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSnapshot {
    /// Current price in Japanese yen
    pub price_jpy: String,
    /// Current price in US dollars
    pub price_usd: String,
    /// 24-hour change
    pub change_24h: String,
    /// Short narrative, when available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Web citations from grounded search, oldest-ranked first; may be empty
    #[serde(default)]
    pub sources: Vec<PriceSource>,
}

impl PriceSnapshot {
    /// The documented degraded snapshot: placeholder prices, no sources.
    pub fn placeholder() -> Self {
        Self {
            price_jpy: "---".to_string(),
            price_usd: "---".to_string(),
            change_24h: "---".to_string(),
            summary: None,
            sources: Vec::new(),
        }
    }
}
