//! Price snapshot orchestrator
//!
//! Asks the upstream for a web-grounded price picture of one symbol. The
//! grounded endpoint rejects a response schema alongside the search tool,
//! so the prompt itself requests a JSON object and the reply is parsed
//! out of the surrounding text. Grounding citations become the snapshot's
//! source list. Failure degrades to "---" placeholders.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use pulse_core::{PriceSnapshot, PriceSource, PulseError, PulseResult};
use pulse_gemini::{extract_json, GenerativeBackend, GroundedText};

use crate::cache::ResponseCache;
use crate::queue::SerialQueue;
use crate::retry::{with_retry, INITIAL_RETRY_DELAY, MAX_RETRIES};

/// Orchestrates grounded price snapshot requests
pub struct PriceService {
    backend: Arc<dyn GenerativeBackend>,
    cache: Arc<ResponseCache>,
    queue: Arc<SerialQueue>,
}

/// The JSON object the prompt asks the model to embed in its reply
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    #[serde(default)]
    price_jpy: Option<String>,
    #[serde(default)]
    price_usd: Option<String>,
    #[serde(default)]
    change_24h: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

impl PriceService {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        cache: Arc<ResponseCache>,
        queue: Arc<SerialQueue>,
    ) -> Self {
        Self {
            backend,
            cache,
            queue,
        }
    }

    /// Grounded price snapshot for one symbol
    ///
    /// Total from the caller's perspective: cached, fresh, or the
    /// placeholder snapshot.
    #[instrument(skip(self))]
    pub async fn price_snapshot(&self, symbol: &str) -> PriceSnapshot {
        let key = price_cache_key(symbol);
        if let Some(cached) = self.cache.get::<PriceSnapshot>(&key) {
            debug!("Price cache hit for {}", symbol);
            return cached;
        }

        match self.fetch(symbol).await {
            Ok(snapshot) => {
                self.cache.set(&key, &snapshot);
                snapshot
            }
            Err(err) => {
                warn!("Price snapshot for {} degraded to placeholder: {}", symbol, err);
                PriceSnapshot::placeholder()
            }
        }
    }

    async fn fetch(&self, symbol: &str) -> PulseResult<PriceSnapshot> {
        let backend = Arc::clone(&self.backend);
        let prompt = build_price_prompt(symbol);

        let grounded = self
            .queue
            .submit(move || async move {
                with_retry(
                    || backend.generate_grounded(&prompt),
                    MAX_RETRIES,
                    INITIAL_RETRY_DELAY,
                )
                .await
            })
            .await?;

        normalize_snapshot(grounded)
    }
}

fn price_cache_key(symbol: &str) -> String {
    // v3: structured snapshot fields instead of raw text
    format!("price_v3_{}", symbol)
}

fn build_price_prompt(symbol: &str) -> String {
    format!(
        "Find the current price of {} in Japanese yen and US dollars and its \
         24-hour change. Reply with a JSON object of the form \
         {{\"priceJpy\": \"...\", \"priceUsd\": \"...\", \"change24h\": \"...\", \
         \"summary\": \"...\"}} using display-formatted strings. Write the \
         summary in Japanese.",
        symbol
    )
}

/// Parse the embedded JSON and attach the grounding citations
fn normalize_snapshot(grounded: GroundedText) -> PulseResult<PriceSnapshot> {
    let json = extract_json(&grounded.text)?;
    let raw: RawSnapshot = serde_json::from_str(&json)
        .map_err(|e| PulseError::parse(format!("Failed to parse price response: {}", e)))?;

    let placeholder = || "---".to_string();
    Ok(PriceSnapshot {
        price_jpy: raw.price_jpy.unwrap_or_else(placeholder),
        price_usd: raw.price_usd.unwrap_or_else(placeholder),
        change_24h: raw.change_24h.unwrap_or_else(placeholder),
        summary: raw.summary,
        sources: grounded
            .sources
            .into_iter()
            .map(|source| PriceSource {
                title: source.title,
                url: source.uri,
            })
            .collect(),
    })
}
