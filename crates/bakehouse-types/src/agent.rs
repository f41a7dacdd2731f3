use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Agent lifecycle status. Agents are never deleted, only deactivated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Inactive,
}

/// A participant in the marketplace. The spendable BP balance is never
/// stored here; it is always derived from the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub status: AgentStatus,
    pub bakes_attempted: u64,
    pub bakes_won: u64,
    pub bakes_created: u64,
    /// Used only for the creation rate limit.
    pub last_bake_created_at: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: AgentStatus::Active,
            bakes_attempted: 0,
            bakes_won: 0,
            bakes_created: 0,
            last_bake_created_at: None,
            registered_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }
}
