//! Crypto Pulse API Server
//!
//! HTTP surface for the dashboard: market analysis, the AI news feed,
//! per-item summary enhancement, and grounded price snapshots. All
//! upstream traffic funnels through one shared serial queue and one
//! response cache, constructed here and injected into the services.

mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use pulse_gemini::GeminiClient;
use pulse_services::{AnalysisService, NewsService, PriceService, ResponseCache, SerialQueue};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub analysis_service: Arc<AnalysisService>,
    pub news_service: Arc<NewsService>,
    pub price_service: Arc<PriceService>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pulse_api=debug")),
        )
        .init();

    info!("Starting Crypto Pulse API");

    if std::env::var("GEMINI_API_KEY").is_ok() {
        info!("Gemini API credentials found in environment");
    } else {
        info!("No Gemini API credentials found - live calls will degrade to fallbacks");
    }

    // One backend, one cache, one serial lane, shared by every service
    let backend = Arc::new(GeminiClient::from_env()?);

    let cache_db_path =
        std::env::var("CACHE_DB_PATH").unwrap_or_else(|_| "data/cache.db".to_string());
    info!("Initializing response cache at: {}", cache_db_path);
    let cache = Arc::new(ResponseCache::new(&cache_db_path)?);

    let queue = SerialQueue::new();

    let state = AppState {
        analysis_service: Arc::new(AnalysisService::new(
            backend.clone(),
            cache.clone(),
            queue.clone(),
        )),
        news_service: Arc::new(NewsService::new(
            backend.clone(),
            cache.clone(),
            queue.clone(),
        )),
        price_service: Arc::new(PriceService::new(backend, cache, queue)),
    };

    let app = routes::router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
