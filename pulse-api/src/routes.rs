//! HTTP routes
//!
//! Handlers are infallible: the services degrade to documented fallbacks
//! internally, so every route always answers 200 with a body.

use axum::{
    extract::{Path, Query, State},
    http::{header, Method},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use pulse_core::{AiInsight, NewsItem, PriceSnapshot};

use crate::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/analysis/{coin}", get(get_analysis))
        .route("/api/news", get(get_news))
        .route("/api/news/enhance", post(enhance_summary))
        .route("/api/price/{symbol}", get(get_price))
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct AnalysisQuery {
    /// Caller-supplied price context forwarded into the prompt
    #[serde(default)]
    context: String,
}

async fn get_analysis(
    State(state): State<AppState>,
    Path(coin): Path<String>,
    Query(query): Query<AnalysisQuery>,
) -> Json<AiInsight> {
    Json(
        state
            .analysis_service
            .market_analysis(&coin, &query.context)
            .await,
    )
}

async fn get_news(State(state): State<AppState>) -> Json<Vec<NewsItem>> {
    Json(state.news_service.latest_news().await)
}

#[derive(Debug, Deserialize)]
struct EnhanceRequest {
    title: String,
    brief: String,
}

#[derive(Debug, Serialize)]
struct EnhanceResponse {
    summary: String,
}

async fn enhance_summary(
    State(state): State<AppState>,
    Json(request): Json<EnhanceRequest>,
) -> Json<EnhanceResponse> {
    let summary = state
        .news_service
        .enhance_summary(&request.title, &request.brief)
        .await;
    Json(EnhanceResponse { summary })
}

async fn get_price(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Json<PriceSnapshot> {
    Json(state.price_service.price_snapshot(&symbol).await)
}
