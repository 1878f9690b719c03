// Handler configuration

use crate::application::constants::DEFAULT_HANDLER_LABEL;
use crate::domain::AcquisitionStrategy;
use serde::{Deserialize, Serialize};

/// Handler configuration
///
/// The retry delay is not configurable, see `RESOURCE_RETRY_DELAY`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Name used in every log line of this handler
    pub label: String,

    /// How Operation Jobs share acquisition
    pub strategy: AcquisitionStrategy,
}

impl HandlerConfig {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn with_strategy(mut self, strategy: AcquisitionStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_HANDLER_LABEL.to_string(),
            strategy: AcquisitionStrategy::Serialized,
        }
    }
}
