//! Gemini generative API client
//!
//! Thin reqwest wrapper over the `generateContent` endpoint, covering the
//! three request shapes the dashboard needs: structured output against a
//! JSON schema, web-grounded search, and plain text. The [`GenerativeBackend`]
//! trait is the seam services program against, so orchestrator logic stays
//! testable without the network.

pub mod backend;
pub mod client;
pub mod config;
pub mod json;

pub use backend::{GenerativeBackend, GroundedText, GroundingSource};
pub use client::GeminiClient;
pub use config::GeminiConfig;
pub use json::extract_json;
