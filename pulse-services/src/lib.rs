//! Service layer for the Crypto Pulse dashboard
//!
//! Everything that talks to the generative upstream goes through the same
//! plumbing: a persistent response cache, a single-lane serial queue that
//! keeps at most one upstream call in flight, and a retry policy that
//! absorbs rate-limit errors with exponential backoff. The orchestrator
//! services (`analysis`, `news`, `price`) wire those together per request
//! type and degrade to documented fallbacks instead of surfacing errors.

pub mod analysis;
pub mod cache;
pub mod news;
pub mod price;
pub mod queue;
pub mod retry;

pub use analysis::AnalysisService;
pub use cache::{ResponseCache, CACHE_TTL_MS};
pub use news::NewsService;
pub use price::PriceService;
pub use queue::{SerialQueue, QUEUE_COOLDOWN_MS};
pub use retry::{with_retry, INITIAL_RETRY_DELAY, MAX_RETRIES};
