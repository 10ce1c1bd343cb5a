//! Core types for the Crypto Pulse dashboard service
//!
//! This crate defines the shared data structures used across the service
//! layer: AI market insights, news items, price snapshots, and the
//! workspace-wide error type.

pub mod error;
pub mod insight;
pub mod news;
pub mod price;

pub use error::{PulseError, PulseResult};
pub use insight::{AiInsight, RiskLevel};
pub use news::{NewsItem, Sentiment};
pub use price::{PriceSnapshot, PriceSource};
