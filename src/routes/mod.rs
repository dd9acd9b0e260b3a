//! Router builders.

pub mod common;
pub mod fields;
pub use common::common_routes;
pub use fields::fields_routes;

use crate::state::AppState;
use axum::Router;

/// Common routes merged with the custom field API.
pub fn app_routes(state: AppState) -> Router {
    common_routes(state.clone()).merge(fields_routes(state))
}
