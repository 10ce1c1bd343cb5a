//! Backend trait for generative calls
//!
//! Services depend on this trait rather than on the concrete HTTP client,
//! so fallback and normalization paths can be exercised with stubs.

use async_trait::async_trait;
use pulse_core::PulseResult;
use serde_json::Value;

/// A web citation attached to a grounded response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

/// Text produced by a grounded (web-search) generation
#[derive(Debug, Clone)]
pub struct GroundedText {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

/// One upstream generative call, in the three shapes the dashboard uses
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Structured output constrained by a JSON schema; returns the raw JSON text.
    async fn generate_json(&self, prompt: &str, schema: Value) -> PulseResult<String>;

    /// Generation with the web-search tool enabled; no schema (the API
    /// rejects both together), citations returned alongside the text.
    async fn generate_grounded(&self, prompt: &str) -> PulseResult<GroundedText>;

    /// Plain text completion.
    async fn generate_text(&self, prompt: &str) -> PulseResult<String>;
}
