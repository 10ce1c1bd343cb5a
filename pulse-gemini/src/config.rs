//! Client configuration

/// Default generation model, overridable via `GEMINI_MODEL`
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Configuration for the Gemini client
///
/// Construction never validates the credential: `from_env` succeeds with a
/// missing key so that cache-only operation keeps working. The key is
/// checked the first time a live call actually needs it, which is where a
/// missing credential becomes a `Config` error.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
}

impl GeminiConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("GEMINI_API_KEY").ok(),
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        }
    }

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}
