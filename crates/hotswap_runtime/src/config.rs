//! Session configuration.

use hotswap_engine::{DEFAULT_MAX_ACTIVATIONS, RetroactivePolicy};
use hotswap_foundation::Timestamp;
use serde::{Deserialize, Serialize};

/// Configuration for a [`Session`](crate::Session).
///
/// Deserializes from a kebab-case table, e.g. in a scenario file:
///
/// ```toml
/// [session]
/// initial-time = 0
/// retroactive = "new-facts-only"
/// max-activations = 500
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SessionConfig {
    /// Clock time when the session opens.
    pub initial_time: Timestamp,

    /// Which facts newly installed rules may fire against.
    pub retroactive: RetroactivePolicy,

    /// Kill switch: maximum activations fired per `fire_all_rules` call.
    pub max_activations: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_time: Timestamp::ZERO,
            retroactive: RetroactivePolicy::AllFacts,
            max_activations: DEFAULT_MAX_ACTIVATIONS,
        }
    }
}

impl SessionConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the initial clock time.
    #[must_use]
    pub fn with_initial_time(mut self, time: Timestamp) -> Self {
        self.initial_time = time;
        self
    }

    /// Builder method to set the retroactive policy.
    #[must_use]
    pub fn with_retroactive(mut self, policy: RetroactivePolicy) -> Self {
        self.retroactive = policy;
        self
    }

    /// Builder method to set the kill switch threshold.
    #[must_use]
    pub fn with_max_activations(mut self, max: usize) -> Self {
        self.max_activations = max;
        self
    }
}
