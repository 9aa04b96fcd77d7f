//! Shared application state

use std::sync::Arc;

use crate::config::Config;
use crate::store::SessionStore;
use crate::websocket::SessionLifecycle;

/// State shared by every route handler and WebSocket connection.
///
/// The lifecycle manager and store are injected so tests can run against an
/// in-memory store and an isolated registry per test case.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn SessionStore>,
    pub lifecycle: Arc<SessionLifecycle>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn SessionStore>) -> Self {
        let lifecycle = Arc::new(SessionLifecycle::new(Arc::clone(&store)));
        Self {
            config: Arc::new(config),
            store,
            lifecycle,
        }
    }
}
