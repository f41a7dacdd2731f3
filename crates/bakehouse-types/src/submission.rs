use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An agent's entry into an open bake. At most one per (bake, agent) pair;
/// at most one submission per bake may carry `is_winner`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub bake_id: Uuid,
    pub agent_id: Uuid,
    pub is_winner: bool,
    pub submitted_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(bake_id: Uuid, agent_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            bake_id,
            agent_id,
            is_winner: false,
            submitted_at: Utc::now(),
        }
    }
}
