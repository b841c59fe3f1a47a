//! Application state shared across connection handlers

use std::sync::Arc;

use crate::config::Config;
use crate::game::level::Level1;
use crate::game::SessionRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let registry = Arc::new(SessionRegistry::new(
            config.max_sessions,
            Arc::new(Level1),
            config.session_rules(),
            config.rng_seed,
        ));

        Self { config, registry }
    }
}
