//! Application state and HTTP router construction.
//!
//! Used by the binary and by the integration tests to build the Axum app.

use std::sync::Arc;

use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::Config;
use crate::db::Database;
use crate::services::FileChangeSuppressor;
use crate::services::organize::{FolderScanner, OrganizerService};

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub organizer: Arc<OrganizerService>,
    pub scanner: FolderScanner,
    pub monitor: Arc<FileChangeSuppressor>,
    /// Cancelled on shutdown; organize calls run on child tokens
    pub shutdown: CancellationToken,
}

/// Build the full Axum router: /api, health checks and layers.
/// Returns Router<()> (state fully applied) for use with axum::serve.
pub fn build_app(state: AppState) -> Router<()> {
    Router::new()
        .nest("/api/organize", api::organize::router())
        .merge(api::health::router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
