//! Application state for the HTTP trigger

use crate::config::RuntimeSettings;
use std::sync::Arc;

/// Shared state handed to every handler
///
/// Cloned per request (cheap Arc clone). Each request loads its own
/// configuration, so nothing here changes after startup.
#[derive(Clone)]
pub struct AppState {
    /// Directories and execution mode resolved at startup
    pub settings: Arc<RuntimeSettings>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(settings: RuntimeSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }
}
