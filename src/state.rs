//! Shared application state for all routes.

use crate::service::FootprintService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FootprintService>,
}

impl AppState {
    pub fn new(service: FootprintService) -> Self {
        AppState {
            service: Arc::new(service),
        }
    }
}
