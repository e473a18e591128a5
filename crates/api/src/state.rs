use std::sync::Arc;

use pixelsmith_fal::InferenceService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: pixelsmith_db::DbPool,
    /// Server configuration (accessed by middleware and handlers).
    pub config: Arc<ServerConfig>,
    /// Inference service client. Trait object so tests can inject a
    /// scripted double.
    pub fal: Arc<dyn InferenceService>,
}
