pub mod auth;
pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /auth/register      register (public)
/// /auth/login         login (public)
///
/// /jobs               list, create (requires auth)
/// /jobs/{id}          get
/// /jobs/{id}/status   on-demand status check
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/jobs", jobs::router())
}
