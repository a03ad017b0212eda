//! buildgate HTTP server - signed build admission for CI validators
//!
//! Every inbound request, on any path, is treated as a validator call: the
//! HTTP signature is verified, the build payload decoded and the author's
//! policy turned into a 204, 400 or 498 response.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod state;
pub mod tracing;

pub use config::{LogFormat, ServerConfig};
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the gate's router
pub fn router(state: AppState) -> Router {
    Router::new()
        .fallback(handlers::validate)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
