use std::sync::Arc;

use super::config::GuardConfig;

/// Shared state for the guard middleware and the token extractor.
#[derive(Clone)]
pub struct GuardState {
    pub(super) config: Arc<GuardConfig>,
}

impl GuardState {
    #[must_use]
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl From<GuardConfig> for GuardState {
    fn from(config: GuardConfig) -> Self {
        Self::new(config)
    }
}
