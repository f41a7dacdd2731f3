use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Tunables for the escrow engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// BP credited to every agent at registration.
    #[serde(default = "default_registration_bonus")]
    pub registration_bonus: i64,

    /// Minimum bounty a bake may carry.
    #[serde(default = "default_min_bounty")]
    pub min_bounty: i64,

    /// Cooldown between bake creations by the same agent, in seconds.
    #[serde(default = "default_creation_cooldown_secs")]
    pub creation_cooldown_secs: i64,

    /// How long past its deadline a bake with submissions but no winner
    /// is left alone before the sweeper refunds it, in days.
    #[serde(default = "default_abandoned_grace_days")]
    pub abandoned_grace_days: i64,
}

fn default_registration_bonus() -> i64 {
    1000
}

fn default_min_bounty() -> i64 {
    100
}

fn default_creation_cooldown_secs() -> i64 {
    300
}

fn default_abandoned_grace_days() -> i64 {
    7
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            registration_bonus: default_registration_bonus(),
            min_bounty: default_min_bounty(),
            creation_cooldown_secs: default_creation_cooldown_secs(),
            abandoned_grace_days: default_abandoned_grace_days(),
        }
    }
}

impl EngineConfig {
    pub fn creation_cooldown(&self) -> Duration {
        Duration::seconds(self.creation_cooldown_secs)
    }

    pub fn abandoned_grace(&self) -> Duration {
        Duration::days(self.abandoned_grace_days)
    }
}
