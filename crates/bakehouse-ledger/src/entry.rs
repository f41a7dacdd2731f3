use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Kinds of BP movements.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    RegistrationBonus,
    BakeCreated,
    BakeWon,
    BakeCancelled,
    BakeExpired,
}

impl EntryKind {
    /// Whether this kind returns an escrowed bounty to its creator.
    /// At most one refund entry may ever exist per bake.
    pub fn is_refund(self) -> bool {
        matches!(self, EntryKind::BakeCancelled | EntryKind::BakeExpired)
    }
}

/// An immutable, signed-amount ledger entry. Entries are never updated or
/// deleted; each one chains the hash of its predecessor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub bake_id: Option<Uuid>,
    pub kind: EntryKind,
    /// Signed BP amount: negative for debits, positive for credits.
    pub amount: i64,
    pub created_at: DateTime<Utc>,
    pub previous_hash: Option<String>,
    pub hash: String,
}

impl LedgerEntry {
    pub fn new(
        agent_id: Uuid,
        bake_id: Option<Uuid>,
        kind: EntryKind,
        amount: i64,
        previous_hash: Option<String>,
    ) -> Self {
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        let mut hasher = Sha256::new();
        hasher.update(id.as_bytes());
        hasher.update(agent_id.as_bytes());
        if let Some(bake_id) = bake_id {
            hasher.update(bake_id.as_bytes());
        }
        hasher.update(format!("{:?}", kind).as_bytes());
        hasher.update(amount.to_be_bytes());
        hasher.update(
            created_at
                .timestamp_nanos_opt()
                .unwrap_or(0)
                .to_be_bytes(),
        );
        hasher.update(previous_hash.as_deref().unwrap_or("genesis").as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        Self {
            id,
            agent_id,
            bake_id,
            kind,
            amount,
            created_at,
            previous_hash,
            hash,
        }
    }
}
