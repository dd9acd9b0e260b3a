//! Custom field API routes.

use crate::handlers::fields::{
    create, delete as delete_handler, list, option_stats, read, replace_all, stats, update, validate,
};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

/// Largest accepted request body; replace-all payloads carry whole definition sets.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub fn fields_routes(state: AppState) -> Router {
    Router::new()
        .route("/custom-fields", get(list).post(create).put(replace_all))
        .route("/custom-fields/validate", post(validate))
        .route(
            "/custom-fields/:id",
            get(read).put(update).delete(delete_handler),
        )
        .route("/custom-fields/:id/stats", get(stats))
        .route("/custom-fields/:id/options/:option_id/stats", get(option_stats))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
