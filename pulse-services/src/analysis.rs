//! Market analysis orchestrator
//!
//! Produces an AI-generated analysis for a single coin: cache lookup,
//! then a structured generation through the serial queue and retry
//! policy, normalized into [`AiInsight`]. Every failure path degrades to
//! a fixed neutral-risk insight; this operation never returns an error.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use pulse_core::{AiInsight, PulseError, PulseResult, RiskLevel};
use pulse_gemini::{extract_json, GenerativeBackend};

use crate::cache::ResponseCache;
use crate::queue::SerialQueue;
use crate::retry::{with_retry, INITIAL_RETRY_DELAY, MAX_RETRIES};

/// Orchestrates AI market analysis requests
pub struct AnalysisService {
    backend: Arc<dyn GenerativeBackend>,
    cache: Arc<ResponseCache>,
    queue: Arc<SerialQueue>,
}

impl AnalysisService {
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

    /// Analysis for one coin given a caller-supplied price context
    ///
    /// Total from the caller's perspective: cached, fresh, or the
    /// documented fallback.
    #[instrument(skip(self, price_context))]
    pub async fn market_analysis(&self, coin: &str, price_context: &str) -> AiInsight {
        let key = analysis_cache_key(coin);
        if let Some(cached) = self.cache.get::<AiInsight>(&key) {
            debug!("Analysis cache hit for {}", coin);
            return cached;
        }

        match self.fetch(coin, price_context).await {
            Ok(insight) => {
                self.cache.set(&key, &insight);
                insight
            }
            Err(err) => {
                warn!("Market analysis for {} degraded to fallback: {}", coin, err);
                fallback_insight()
            }
        }
    }

    async fn fetch(&self, coin: &str, price_context: &str) -> PulseResult<AiInsight> {
        let backend = Arc::clone(&self.backend);
        let prompt = build_analysis_prompt(coin, price_context);

        let text = self
            .queue
            .submit(move || async move {
                with_retry(
                    || backend.generate_json(&prompt, analysis_schema()),
                    MAX_RETRIES,
                    INITIAL_RETRY_DELAY,
                )
                .await
            })
            .await?;

        parse_insight(&text)
    }
}

fn analysis_cache_key(coin: &str) -> String {
    // v3: risk_level became an enum; older rows must read as misses
    format!("analysis_v3_{}", coin)
}

fn build_analysis_prompt(coin: &str, price_context: &str) -> String {
    format!(
        "You are a professional crypto analyst covering the Japanese market. \
         Analyze {} using this data: {}. \
         Respond in JSON with trend, recommendation, riskLevel (Low, Medium or High) \
         and summary. Write trend, recommendation and summary in Japanese.",
        coin, price_context
    )
}

fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "trend": { "type": "STRING" },
            "recommendation": { "type": "STRING" },
            "riskLevel": { "type": "STRING", "enum": ["Low", "Medium", "High"] },
            "summary": { "type": "STRING" }
        },
        "required": ["trend", "recommendation", "riskLevel", "summary"]
    })
}

fn parse_insight(text: &str) -> PulseResult<AiInsight> {
    let json = extract_json(text)?;
    serde_json::from_str(&json)
        .map_err(|e| PulseError::parse(format!("Failed to parse analysis response: {}", e)))
}

/// The documented degraded analysis: neutral risk, fixed Japanese copy.
fn fallback_insight() -> AiInsight {
    AiInsight {
        trend: "横ばい / 安定".to_string(),
        recommendation: "長期保有を推奨。市場の急変動には注意してください。".to_string(),
        risk_level: RiskLevel::Medium,
        summary: "現在データ分析を最適化中です。価格動向を注視してください。".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::StubBackend;
    use std::time::Duration;
    use tempfile::TempDir;

    fn service_with(stub: StubBackend) -> (AnalysisService, Arc<StubBackend>, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let cache = Arc::new(ResponseCache::new(dir.path().join("cache.db")).expect("cache"));
        let queue = SerialQueue::with_cooldown(Duration::from_millis(10));
        let backend = Arc::new(stub);
        let service = AnalysisService::new(backend.clone(), cache, queue);
        (service, backend, dir)
    }

    const VALID_ANALYSIS: &str = r#"{
        "trend": "上昇トレンド",
        "recommendation": "押し目買いを検討",
        "riskLevel": "Low",
        "summary": "強い買い圧力が継続しています。"
    }"#;

    #[tokio::test]
    async fn upstream_success_returns_normalized_insight() {
        let stub = StubBackend::new();
        stub.push_json(Ok(VALID_ANALYSIS.to_string()));
        let (service, backend, _dir) = service_with(stub);

        let insight = service.market_analysis("BTC", "price: 15,000,000 JPY").await;

        assert_eq!(insight.risk_level, RiskLevel::Low);
        assert_eq!(insight.trend, "上昇トレンド");
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let stub = StubBackend::new();
        stub.push_json(Ok(VALID_ANALYSIS.to_string()));
        let (service, backend, _dir) = service_with(stub);

        let first = service.market_analysis("BTC", "ctx").await;
        let second = service.market_analysis("BTC", "ctx").await;

        assert_eq!(first, second);
        assert_eq!(backend.calls(), 1, "cache hit must not touch the backend");
    }

    #[tokio::test]
    async fn upstream_failure_yields_the_fixed_fallback() {
        let stub = StubBackend::new();
        stub.push_json(Err(PulseError::api("permanently down")));
        let (service, _backend, _dir) = service_with(stub);

        let insight = service.market_analysis("BTC", "ctx").await;

        assert_eq!(insight, fallback_insight());
        assert_eq!(insight.risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn malformed_json_yields_the_fallback_and_is_not_cached() {
        let stub = StubBackend::new();
        stub.push_json(Ok("not valid json".to_string()));
        stub.push_json(Ok(VALID_ANALYSIS.to_string()));
        let (service, backend, _dir) = service_with(stub);

        let degraded = service.market_analysis("BTC", "ctx").await;
        assert_eq!(degraded, fallback_insight());

        // Fallbacks are not cached: the next call tries upstream again
        let recovered = service.market_analysis("BTC", "ctx").await;
        assert_eq!(recovered.risk_level, RiskLevel::Low);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn missing_required_field_yields_the_fallback() {
        let stub = StubBackend::new();
        stub.push_json(Ok(r#"{"trend": "up", "summary": "s"}"#.to_string()));
        let (service, _backend, _dir) = service_with(stub);

        let insight = service.market_analysis("SOL", "ctx").await;
        assert_eq!(insight, fallback_insight());
    }

    #[test]
    fn fenced_analysis_json_is_parsed() {
        let fenced = format!("```json\n{}\n```", VALID_ANALYSIS);
        let insight = parse_insight(&fenced).expect("fenced JSON should parse");
        assert_eq!(insight.risk_level, RiskLevel::Low);
    }

    #[test]
    fn cache_keys_are_versioned_per_coin() {
        assert_eq!(analysis_cache_key("BTC"), "analysis_v3_BTC");
        assert_ne!(analysis_cache_key("BTC"), analysis_cache_key("ETH"));
    }
}
