//! HTTP client for the Gemini `generateContent` endpoint

use async_trait::async_trait;
use pulse_core::{PulseError, PulseResult};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::backend::{GenerativeBackend, GroundedText, GroundingSource};
use crate::config::GeminiConfig;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini generative API client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Debug, Serialize)]
struct Tool {
    google_search: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> PulseResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| PulseError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create a client configured from the process environment
    pub fn from_env() -> PulseResult<Self> {
        Self::new(GeminiConfig::from_env())
    }

    /// Guarded credential accessor; missing key is a configuration error
    /// raised only when a live call is attempted.
    fn api_key(&self) -> PulseResult<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                PulseError::config("GEMINI_API_KEY environment variable not set")
            })
    }

    async fn generate(&self, request: &GenerateContentRequest) -> PulseResult<Candidate> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/models/{}:generateContent",
            GEMINI_API_BASE, self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| PulseError::network(format!("Gemini API request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
                return Err(PulseError::rate_limited(format!(
                    "Gemini API throttled ({}): {}",
                    status, body
                )));
            }
            return Err(PulseError::api(format!(
                "Gemini API error ({}): {}",
                status, body
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| PulseError::parse(format!("Failed to parse Gemini response: {}", e)))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| PulseError::parse("No candidates in Gemini response"))
    }

    fn candidate_text(candidate: &Candidate) -> PulseResult<String> {
        let text: String = candidate
            .content
            .as_ref()
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(PulseError::parse("Empty text in Gemini response"));
        }
        Ok(text)
    }

    fn grounding_sources(candidate: &Candidate) -> Vec<GroundingSource> {
        candidate
            .grounding_metadata
            .as_ref()
            .map(|metadata| {
                metadata
                    .grounding_chunks
                    .iter()
                    .filter_map(|chunk| chunk.web.as_ref())
                    .filter_map(|web| {
                        let uri = web.uri.clone()?;
                        Some(GroundingSource {
                            title: web.title.clone().unwrap_or_else(|| uri.clone()),
                            uri,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    #[instrument(skip(self, prompt, schema))]
    async fn generate_json(&self, prompt: &str, schema: Value) -> PulseResult<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(schema),
            }),
            tools: None,
        };

        let candidate = self.generate(&request).await?;
        let text = Self::candidate_text(&candidate)?;
        debug!("Structured generation returned {} chars", text.len());
        Ok(text)
    }

    #[instrument(skip(self, prompt))]
    async fn generate_grounded(&self, prompt: &str) -> PulseResult<GroundedText> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: None,
            tools: Some(vec![Tool {
                google_search: Value::Object(Default::default()),
            }]),
        };

        let candidate = self.generate(&request).await?;
        let text = Self::candidate_text(&candidate)?;
        let sources = Self::grounding_sources(&candidate);

        debug!(
            "Grounded generation returned {} chars, {} sources",
            text.len(),
            sources.len()
        );
        Ok(GroundedText { text, sources })
    }

    #[instrument(skip(self, prompt))]
    async fn generate_text(&self, prompt: &str) -> PulseResult<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: None,
            tools: None,
        };

        let candidate = self.generate(&request).await?;
        Self::candidate_text(&candidate)
    }
}
