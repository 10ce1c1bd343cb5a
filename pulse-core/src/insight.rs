//! AI-generated market analysis types

use serde::{Deserialize, Serialize};

/// Risk classification attached to a market analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// AI-generated analysis of a single coin
///
/// All fields are required on a successful generation; a fixed
/// neutral-risk substitute is used when the upstream call fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiInsight {
    /// Short trend description (e.g. "上昇トレンド")
    pub trend: String,
    /// Suggested course of action for the reader
    pub recommendation: String,
    /// Risk classification
    pub risk_level: RiskLevel,
    /// Narrative summary of the analysis
    pub summary: String,
}
