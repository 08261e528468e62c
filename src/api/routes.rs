//! API route handlers.
//!
//! All endpoints return JSON wrapped in `{ success, data }`. The engine
//! is shared via `Arc<RwLock<..>>`; handlers only ever take read locks,
//! so a slow consumer never blocks a tick for long.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::engine::index::{CategoryBreakdownEntry, CurrentIndexReport, IndexStatistics};
use crate::engine::{ExportReport, IndexEngine};
use crate::types::IndexHistoryEntry;

pub type AppState = Arc<RwLock<IndexEngine>>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Standard envelope for every endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

fn ok<T>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentResponse {
    pub index: CurrentIndexReport,
    pub categories: HashMap<String, CategoryBreakdownEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub history: Vec<IndexHistoryEntry>,
    pub statistics: Option<IndexStatistics>,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/cpmi/current
///
/// Always serves the last good value — a failed fetch mid-run shows up
/// only as a stale `lastUpdate`, never as an error here.
pub async fn get_current(State(engine): State<AppState>) -> Json<ApiResponse<CurrentResponse>> {
    let engine = engine.read().await;
    ok(CurrentResponse {
        index: engine.current_index(),
        categories: engine.category_breakdown(),
    })
}

/// GET /api/cpmi/history
pub async fn get_history(State(engine): State<AppState>) -> Json<ApiResponse<HistoryResponse>> {
    let engine = engine.read().await;
    ok(HistoryResponse {
        history: engine.history(),
        statistics: engine.statistics(),
    })
}

/// GET /api/cpmi/categories
pub async fn get_categories(
    State(engine): State<AppState>,
) -> Json<ApiResponse<HashMap<String, CategoryBreakdownEntry>>> {
    let engine = engine.read().await;
    ok(engine.category_breakdown())
}

/// GET /api/cpmi/export
pub async fn get_export(State(engine): State<AppState>) -> Json<ApiResponse<ExportReport>> {
    let engine = engine.read().await;
    ok(engine.export())
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
