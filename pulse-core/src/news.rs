//! News feed data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentiment classification for a news item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

/// A single item in the AI-generated news feed
///
/// A batch of items is produced atomically by one news fetch. Individual
/// items may later have their summary rewritten by the on-demand
/// enhancement call, identified by matching `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    /// Unique within the fetch batch (`news-{index}-{millis}`)
    pub id: String,
    /// Headline
    pub title: String,
    /// Brief summary
    pub summary: String,
    /// One-line takeaway for retail investors, when the model provides one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actionable_insight: Option<String>,
    /// Article URL (placeholder when the model supplies none)
    pub url: String,
    /// Source name (placeholder when the model supplies none)
    pub source: String,
    /// Sentiment classification, `neutral` when absent upstream
    #[serde(default)]
    pub sentiment: Sentiment,
    /// When the batch was produced
    pub published_at: DateTime<Utc>,
    /// Whether the summary has been rewritten by the enhancement call
    #[serde(default)]
    pub is_enhanced: bool,
}
