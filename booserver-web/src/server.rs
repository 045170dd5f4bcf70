//! BooServer HTTP server wiring.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use booserver_core::config::HttpConfig;
use booserver_core::convert::MediaConverter;
use booserver_core::manager::MediaFileManager;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use crate::handlers::{
    audio, capability, categories, chapter, check, current_get, current_put, item, list, nop,
    photo, video,
};

/// Shared state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Aggregator serving the library queries.
    pub manager: Arc<MediaFileManager>,
    /// Converter used for chapter probing.
    pub converter: Arc<dyn MediaConverter>,
    /// Opaque playback state exchanged over `/current`.
    pub current: Arc<RwLock<serde_json::Value>>,
}

impl AppState {
    /// Creates the handler state around an already-running manager.
    pub fn new(manager: Arc<MediaFileManager>, converter: Arc<dyn MediaConverter>) -> Self {
        Self {
            manager,
            converter,
            current: Arc::new(RwLock::new(serde_json::Value::Null)),
        }
    }
}

/// Builds the BooServer protocol router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/nop", get(nop))
        .route("/capability", get(capability))
        .route("/check", get(check))
        .route("/list", get(list))
        .route("/item", get(item))
        .route("/video", get(video))
        .route("/audio", get(audio))
        .route("/photo", get(photo))
        .route("/chapter", get(chapter))
        .route("/current", get(current_get).put(current_put))
        .route("/categories", get(categories))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds and serves the BooServer protocol until the task is cancelled.
///
/// # Errors
///
/// - `std::io::Error` - The listen address could not be bound or serving
///   failed
pub async fn run_server(
    config: &HttpConfig,
    manager: Arc<MediaFileManager>,
    converter: Arc<dyn MediaConverter>,
) -> Result<(), std::io::Error> {
    let app = router(AppState::new(manager, converter));

    let address = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("BooServer listening on http://{address}");
    axum::serve(listener, app).await
}
