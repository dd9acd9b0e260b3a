//! Shared application state for all routes.

use crate::service::CustomFields;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub fields: Arc<dyn CustomFields>,
}

impl AppState {
    pub fn new(fields: impl CustomFields + 'static) -> Self {
        AppState {
            fields: Arc::new(fields),
        }
    }
}
