//! News feed orchestrator
//!
//! Fetches the AI-generated news batch and serves the on-demand summary
//! enhancement. The batch is requested as a single structured response
//! (title, summary, sentiment, optional source/url per item) rather than
//! the legacy per-item enhancement loop, which multiplied total latency by
//! the serial cooldown. An empty upstream batch counts as a failure and
//! yields the fixed fallback set, never an empty feed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use pulse_core::{NewsItem, PulseError, PulseResult, Sentiment};
use pulse_gemini::{extract_json, GenerativeBackend};

use crate::cache::ResponseCache;
use crate::queue::SerialQueue;
use crate::retry::{with_retry, INITIAL_RETRY_DELAY, MAX_RETRIES};

/// Items requested per batch
const NEWS_BATCH_SIZE: usize = 5;

/// Placeholder when the model supplies no article URL
const FALLBACK_NEWS_URL: &str = "https://jp.cointelegraph.com/";

/// Placeholder when the model supplies no source name
const FALLBACK_NEWS_SOURCE: &str = "AI Market Feed";

/// Orchestrates the news feed and per-item summary enhancement
pub struct NewsService {
    backend: Arc<dyn GenerativeBackend>,
    cache: Arc<ResponseCache>,
    queue: Arc<SerialQueue>,
}

/// One item as the model returns it, before normalization
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNewsItem {
    title: String,
    summary: String,
    #[serde(default)]
    actionable_insight: Option<String>,
    #[serde(default)]
    sentiment: Option<Sentiment>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl NewsService {
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

    /// The latest AI-generated news batch
    ///
    /// Total from the caller's perspective: cached, fresh, or the fixed
    /// fallback set. Never empty.
    #[instrument(skip(self))]
    pub async fn latest_news(&self) -> Vec<NewsItem> {
        let key = news_cache_key();
        if let Some(cached) = self.cache.get::<Vec<NewsItem>>(&key) {
            debug!("News cache hit ({} items)", cached.len());
            return cached;
        }

        match self.fetch_batch().await {
            Ok(items) => {
                self.cache.set(&key, &items);
                items
            }
            Err(err) => {
                warn!("News fetch degraded to fallback: {}", err);
                fallback_news_items(Utc::now())
            }
        }
    }

    async fn fetch_batch(&self) -> PulseResult<Vec<NewsItem>> {
        let backend = Arc::clone(&self.backend);
        let prompt = build_news_prompt();

        let text = self
            .queue
            .submit(move || async move {
                with_retry(
                    || backend.generate_json(&prompt, news_schema()),
                    MAX_RETRIES,
                    INITIAL_RETRY_DELAY,
                )
                .await
            })
            .await?;

        let raw = parse_news_batch(&text)?;
        if raw.is_empty() {
            return Err(PulseError::parse("Upstream returned an empty news batch"));
        }
        Ok(normalize_news_items(raw, Utc::now()))
    }

    /// Rewrite one item's summary for retail investors
    ///
    /// Returns the original `brief` unchanged on any failure.
    #[instrument(skip(self, brief))]
    pub async fn enhance_summary(&self, title: &str, brief: &str) -> String {
        let key = enhancement_cache_key(title);
        if let Some(cached) = self.cache.get::<String>(&key) {
            debug!("Enhancement cache hit for {}", title);
            return cached;
        }

        match self.fetch_enhancement(title, brief).await {
            Ok(enhanced) => {
                self.cache.set(&key, &enhanced);
                enhanced
            }
            Err(err) => {
                warn!("Summary enhancement degraded to original text: {}", err);
                brief.to_string()
            }
        }
    }

    async fn fetch_enhancement(&self, title: &str, brief: &str) -> PulseResult<String> {
        let backend = Arc::clone(&self.backend);
        let prompt = format!(
            "Explain the following crypto news for Japanese retail investors in \
             about 150 characters, in Japanese: {} - {}",
            title, brief
        );

        let text = self
            .queue
            .submit(move || async move {
                with_retry(
                    || backend.generate_text(&prompt),
                    MAX_RETRIES,
                    INITIAL_RETRY_DELAY,
                )
                .await
            })
            .await?;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(PulseError::parse("Empty enhancement response"));
        }
        Ok(trimmed.to_string())
    }
}

fn news_cache_key() -> String {
    // v3: batch-structured items with sentiment/actionableInsight
    "latest_news_v3".to_string()
}

fn enhancement_cache_key(title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    format!("enhanced_v2_{}", hex::encode(&hasher.finalize()[..8]))
}

fn build_news_prompt() -> String {
    format!(
        "List the {} most important current cryptocurrency news stories, with \
         emphasis on stories relevant to the Japanese market. For each story \
         provide a title, a summary, an actionable insight for retail \
         investors, a sentiment (positive, neutral or negative) and, when you \
         know them, the source name and article URL. Write titles, summaries \
         and insights in Japanese.",
        NEWS_BATCH_SIZE
    )
}

fn news_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING" },
                "summary": { "type": "STRING" },
                "actionableInsight": { "type": "STRING" },
                "sentiment": { "type": "STRING", "enum": ["positive", "neutral", "negative"] },
                "source": { "type": "STRING" },
                "url": { "type": "STRING" }
            },
            "required": ["title", "summary"]
        }
    })
}

fn parse_news_batch(text: &str) -> PulseResult<Vec<RawNewsItem>> {
    let json = extract_json(text)?;
    serde_json::from_str(&json)
        .map_err(|e| PulseError::parse(format!("Failed to parse news batch: {}", e)))
}

/// Fill defaults and synthesize identifiers for one fetched batch
fn normalize_news_items(raw: Vec<RawNewsItem>, now: DateTime<Utc>) -> Vec<NewsItem> {
    let millis = now.timestamp_millis();
    raw.into_iter()
        .take(NEWS_BATCH_SIZE)
        .enumerate()
        .map(|(index, item)| NewsItem {
            id: format!("news-{}-{}", index, millis),
            title: item.title,
            summary: item.summary,
            actionable_insight: item.actionable_insight,
            url: item.url.unwrap_or_else(|| FALLBACK_NEWS_URL.to_string()),
            source: item
                .source
                .unwrap_or_else(|| FALLBACK_NEWS_SOURCE.to_string()),
            sentiment: item.sentiment.unwrap_or_default(),
            published_at: now,
            is_enhanced: false,
        })
        .collect()
}

/// The documented degraded feed: fixed illustrative items, never empty.
fn fallback_news_items(now: DateTime<Utc>) -> Vec<NewsItem> {
    let make = |index: usize, title: &str, summary: &str| NewsItem {
        id: format!("news-fallback-{}", index),
        title: title.to_string(),
        summary: summary.to_string(),
        actionable_insight: None,
        url: FALLBACK_NEWS_URL.to_string(),
        source: FALLBACK_NEWS_SOURCE.to_string(),
        sentiment: Sentiment::Neutral,
        published_at: now,
        is_enhanced: false,
    };

    vec![
        make(
            0,
            "ビットコイン、機関投資家の需要が継続",
            "大手機関投資家によるビットコインへの資金流入が続いており、市場の下支え要因となっています。",
        ),
        make(
            1,
            "日本の暗号資産税制、見直しの議論が進行",
            "暗号資産の申告分離課税への移行をめぐる議論が国内で進んでいます。個人投資家への影響が注目されます。",
        ),
        make(
            2,
            "主要取引所、セキュリティ強化を発表",
            "国内外の主要取引所がコールドウォレット管理の強化策を相次いで発表しました。",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::StubBackend;
    use std::time::Duration;
    use tempfile::TempDir;

    fn service_with(stub: StubBackend) -> (NewsService, Arc<StubBackend>, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let cache = Arc::new(ResponseCache::new(dir.path().join("cache.db")).expect("cache"));
        let queue = SerialQueue::with_cooldown(Duration::from_millis(10));
        let backend = Arc::new(stub);
        let service = NewsService::new(backend.clone(), cache, queue);
        (service, backend, dir)
    }

    const VALID_BATCH: &str = r#"[
        {
            "title": "ビットコインETFに資金流入",
            "summary": "米国の現物ETFへの資金流入が加速。",
            "actionableInsight": "短期の押し目に注目。",
            "sentiment": "positive",
            "source": "CoinDesk Japan",
            "url": "https://www.coindeskjapan.com/example"
        },
        {
            "title": "イーサリアムのアップグレード完了",
            "summary": "手数料の低下が期待される。"
        }
    ]"#;

    #[tokio::test]
    async fn batch_is_normalized_with_defaults() {
        let stub = StubBackend::new();
        stub.push_json(Ok(VALID_BATCH.to_string()));
        let (service, backend, _dir) = service_with(stub);

        let items = service.latest_news().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].sentiment, Sentiment::Positive);
        assert_eq!(items[0].source, "CoinDesk Japan");

        // Second item carried no sentiment/source/url
        assert_eq!(items[1].sentiment, Sentiment::Neutral);
        assert_eq!(items[1].source, FALLBACK_NEWS_SOURCE);
        assert_eq!(items[1].url, FALLBACK_NEWS_URL);
        assert!(items[1].actionable_insight.is_none());
        assert!(!items[1].is_enhanced);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn ids_are_unique_within_a_batch() {
        let stub = StubBackend::new();
        stub.push_json(Ok(VALID_BATCH.to_string()));
        let (service, _backend, _dir) = service_with(stub);

        let items = service.latest_news().await;
        assert_ne!(items[0].id, items[1].id);
        assert!(items[0].id.starts_with("news-0-"));
        assert!(items[1].id.starts_with("news-1-"));
    }

    #[tokio::test]
    async fn cached_batch_short_circuits_the_backend() {
        let stub = StubBackend::new();
        stub.push_json(Ok(VALID_BATCH.to_string()));
        let (service, backend, _dir) = service_with(stub);

        let first = service.latest_news().await;
        let second = service.latest_news().await;

        assert_eq!(first, second);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn empty_upstream_batch_yields_the_fallback_set() {
        let stub = StubBackend::new();
        stub.push_json(Ok("[]".to_string()));
        let (service, _backend, _dir) = service_with(stub);

        let items = service.latest_news().await;

        assert!(!items.is_empty(), "fallback feed must never be empty");
        assert!(items.iter().all(|i| i.sentiment == Sentiment::Neutral));
        assert!(items.iter().all(|i| i.url == FALLBACK_NEWS_URL));
    }

    #[tokio::test]
    async fn upstream_failure_yields_the_fallback_set() {
        let stub = StubBackend::new();
        stub.push_json(Err(PulseError::network("down")));
        let (service, _backend, _dir) = service_with(stub);

        let items = service.latest_news().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].id, "news-fallback-0");
    }

    #[tokio::test]
    async fn enhancement_success_is_cached() {
        let stub = StubBackend::new();
        stub.push_text(Ok("わかりやすい解説です。".to_string()));
        let (service, backend, _dir) = service_with(stub);

        let first = service.enhance_summary("タイトル", "元の要約").await;
        let second = service.enhance_summary("タイトル", "元の要約").await;

        assert_eq!(first, "わかりやすい解説です。");
        assert_eq!(first, second);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn enhancement_failure_returns_the_original_brief() {
        let stub = StubBackend::new();
        stub.push_text(Err(PulseError::api("down")));
        let (service, _backend, _dir) = service_with(stub);

        let result = service.enhance_summary("タイトル", "元の要約").await;
        assert_eq!(result, "元の要約");
    }

    #[tokio::test]
    async fn empty_enhancement_returns_the_original_brief() {
        let stub = StubBackend::new();
        stub.push_text(Ok("   ".to_string()));
        let (service, _backend, _dir) = service_with(stub);

        let result = service.enhance_summary("タイトル", "元の要約").await;
        assert_eq!(result, "元の要約");
    }

    #[test]
    fn enhancement_keys_are_stable_digests() {
        let a = enhancement_cache_key("同じタイトル");
        let b = enhancement_cache_key("同じタイトル");
        let c = enhancement_cache_key("別のタイトル");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("enhanced_v2_"));
    }

    #[test]
    fn oversized_batch_is_truncated() {
        let raw: Vec<RawNewsItem> = (0..8)
            .map(|i| RawNewsItem {
                title: format!("t{}", i),
                summary: "s".to_string(),
                actionable_insight: None,
                sentiment: None,
                source: None,
                url: None,
            })
            .collect();

        let items = normalize_news_items(raw, Utc::now());
        assert_eq!(items.len(), NEWS_BATCH_SIZE);
    }
}
