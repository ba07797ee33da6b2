//! Application state shared by all handlers

use std::sync::Arc;

use voxgate_core::Gateway;

#[derive(Clone)]
pub struct AppState {
    /// Gateway reference - using Arc for cheap clones
    pub gateway: Arc<Gateway>,
}

impl AppState {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }
}
