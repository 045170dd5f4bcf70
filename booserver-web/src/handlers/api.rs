//! JSON handlers for the BooServer protocol verbs.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use booserver_core::store::MetaData;
use serde::Deserialize;
use serde_json::json;

use crate::server::AppState;

/// Query for `/check`.
#[derive(Deserialize)]
pub struct CheckQuery {
    /// Client's last known freshness timestamp (ms).
    pub date: Option<i64>,
}

/// Query for `/list`.
#[derive(Deserialize)]
pub struct ListQuery {
    /// Media type code filter: `v`, `a` or `p`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Flag value filter.
    pub f: Option<i64>,
    /// Category filter.
    pub c: Option<String>,
}

/// Query for the id-addressed verbs.
#[derive(Deserialize)]
pub struct IdQuery {
    /// Record id.
    pub id: i64,
}

fn internal_error(err: impl std::fmt::Display) -> StatusCode {
    tracing::error!("request failed: {err}");
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Liveness probe.
pub async fn nop() -> StatusCode {
    StatusCode::OK
}

/// Server identity and supported verbs.
pub async fn capability() -> Json<serde_json::Value> {
    Json(json!({
        "name": "BooServer",
        "version": env!("CARGO_PKG_VERSION"),
        "capability": [
            "check", "list", "item", "video", "audio", "photo",
            "chapter", "current", "categories",
        ],
    }))
}

/// Freshness check: tells the client whether the library changed since the
/// timestamp it last saw.
pub async fn check(State(state): State<AppState>, Query(query): Query<CheckQuery>) -> Json<serde_json::Value> {
    let last_updated = state.manager.last_updated();
    let update = query.date.is_none_or(|date| last_updated > date);
    Json(json!({ "update": update, "date": last_updated }))
}

/// Filtered listing of the library.
///
/// # Errors
/// Returns `StatusCode::INTERNAL_SERVER_ERROR` when the store query fails.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<MetaData>>, StatusCode> {
    let store = state.manager.store();
    let records = match query.f {
        Some(flag) => store.get_by_flag(flag).await,
        None => store.get_all().await,
    }
    .map_err(internal_error)?;

    let records = records
        .into_iter()
        .filter(|record| match &query.kind {
            Some(kind) => record.media_type().code() == kind.as_str(),
            None => true,
        })
        .filter(|record| match &query.c {
            Some(category) => &record.category == category,
            None => true,
        })
        .collect();
    Ok(Json(records))
}

/// Chapter markers of one record, probed on demand.
///
/// # Errors
/// Returns `StatusCode::NOT_FOUND` for an unknown id and
/// `StatusCode::INTERNAL_SERVER_ERROR` when probing fails.
pub async fn chapter(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let record = state
        .manager
        .file_by_id(query.id)
        .await
        .map_err(internal_error)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let chapters = state
        .converter
        .chapters(std::path::Path::new(&record.path))
        .await
        .map_err(internal_error)?;
    Ok(Json(json!({ "id": record.id, "chapters": chapters })))
}

/// Current playback state, as last put by a client.
pub async fn current_get(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.current.read().await.clone())
}

/// Replaces the current playback state.
pub async fn current_put(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    *state.current.write().await = body;
    StatusCode::OK
}

/// Distinct categories across the library.
///
/// # Errors
/// Returns `StatusCode::INTERNAL_SERVER_ERROR` when the store query fails.
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, StatusCode> {
    let categories = state.manager.store().categories().await.map_err(internal_error)?;
    Ok(Json(categories))
}
