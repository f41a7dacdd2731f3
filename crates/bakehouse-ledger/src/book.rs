use std::collections::HashMap;

use uuid::Uuid;

use crate::entry::{EntryKind, LedgerEntry};

/// Append-only collection of ledger entries with per-agent and per-bake
/// indexes. The sole source of truth for BP balances; no update or delete
/// operation exists.
#[derive(Debug, Clone, Default)]
pub struct LedgerBook {
    entries: Vec<LedgerEntry>,
    by_agent: HashMap<Uuid, Vec<usize>>,
    by_bake: HashMap<Uuid, Vec<usize>>,
}

impl LedgerBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one immutable entry, chained to the previous one.
    pub fn append(
        &mut self,
        agent_id: Uuid,
        bake_id: Option<Uuid>,
        kind: EntryKind,
        amount: i64,
    ) -> &LedgerEntry {
        let previous_hash = self.entries.last().map(|e| e.hash.clone());
        let entry = LedgerEntry::new(agent_id, bake_id, kind, amount, previous_hash);

        let idx = self.entries.len();
        self.by_agent.entry(entry.agent_id).or_default().push(idx);
        if let Some(bake_id) = entry.bake_id {
            self.by_bake.entry(bake_id).or_default().push(idx);
        }
        self.entries.push(entry);
        &self.entries[idx]
    }

    /// Derived balance: the sum of all entries for the agent.
    /// Zero entries sums to 0, not an error.
    pub fn balance(&self, agent_id: Uuid) -> i64 {
        self.by_agent
            .get(&agent_id)
            .map(|indices| indices.iter().map(|&i| self.entries[i].amount).sum())
            .unwrap_or(0)
    }

    pub fn entries_for_agent(&self, agent_id: Uuid) -> Vec<&LedgerEntry> {
        self.by_agent
            .get(&agent_id)
            .map(|indices| indices.iter().map(|&i| &self.entries[i]).collect())
            .unwrap_or_default()
    }

    pub fn entries_for_bake(&self, bake_id: Uuid) -> Vec<&LedgerEntry> {
        self.by_bake
            .get(&bake_id)
            .map(|indices| indices.iter().map(|&i| &self.entries[i]).collect())
            .unwrap_or_default()
    }

    /// Whether a refund (`bake_cancelled` or `bake_expired`) entry already
    /// exists for this bake. The idempotency guard for the refund path.
    pub fn refund_recorded(&self, bake_id: Uuid) -> bool {
        self.entries_for_bake(bake_id)
            .iter()
            .any(|e| e.kind.is_refund())
    }

    pub fn all_entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Verify the hash chain: each entry must reference its predecessor.
    pub fn verify_integrity(&self) -> bool {
        for (i, entry) in self.entries.iter().enumerate() {
            if i == 0 {
                if entry.previous_hash.is_some() {
                    return false;
                }
            } else if entry.previous_hash.as_ref() != Some(&self.entries[i - 1].hash) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_book_balance_is_zero() {
        let book = LedgerBook::new();
        assert_eq!(book.balance(Uuid::new_v4()), 0);
        assert!(book.is_empty());
        assert!(book.verify_integrity());
    }

    #[test]
    fn test_balance_sums_signed_amounts() {
        let mut book = LedgerBook::new();
        let agent = Uuid::new_v4();
        let bake = Uuid::new_v4();

        book.append(agent, None, EntryKind::RegistrationBonus, 1000);
        book.append(agent, Some(bake), EntryKind::BakeCreated, -400);
        book.append(agent, Some(bake), EntryKind::BakeCancelled, 400);

        assert_eq!(book.balance(agent), 1000);
        assert_eq!(book.entries_for_agent(agent).len(), 3);
    }

    #[test]
    fn test_balances_are_per_agent() {
        let mut book = LedgerBook::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        book.append(a, None, EntryKind::RegistrationBonus, 1000);
        book.append(b, None, EntryKind::RegistrationBonus, 1000);
        book.append(a, Some(Uuid::new_v4()), EntryKind::BakeCreated, -500);

        assert_eq!(book.balance(a), 500);
        assert_eq!(book.balance(b), 1000);
    }

    #[test]
    fn test_refund_recorded() {
        let mut book = LedgerBook::new();
        let agent = Uuid::new_v4();
        let bake = Uuid::new_v4();

        book.append(agent, Some(bake), EntryKind::BakeCreated, -300);
        assert!(!book.refund_recorded(bake));

        book.append(agent, Some(bake), EntryKind::BakeExpired, 300);
        assert!(book.refund_recorded(bake));

        // A win is not a refund.
        let other = Uuid::new_v4();
        book.append(agent, Some(other), EntryKind::BakeWon, 300);
        assert!(!book.refund_recorded(other));
    }

    #[test]
    fn test_chain_integrity() {
        let mut book = LedgerBook::new();
        let agent = Uuid::new_v4();
        for i in 0..5 {
            book.append(agent, None, EntryKind::RegistrationBonus, i * 10);
        }
        assert!(book.verify_integrity());
        assert!(book.all_entries()[0].previous_hash.is_none());
        for pair in book.all_entries().windows(2) {
            assert_eq!(pair[1].previous_hash.as_ref(), Some(&pair[0].hash));
        }
    }

    proptest! {
        /// balance(agent) always equals the sum of that agent's entries,
        /// regardless of interleaving with other agents' entries.
        #[test]
        fn prop_balance_equals_entry_sum(amounts in prop::collection::vec((-1000i64..1000, 0u8..3), 0..50)) {
            let mut book = LedgerBook::new();
            let agents = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
            let mut expected = [0i64; 3];

            for (amount, which) in amounts {
                let idx = which as usize;
                book.append(agents[idx], None, EntryKind::RegistrationBonus, amount);
                expected[idx] += amount;
            }

            for (agent, want) in agents.iter().zip(expected) {
                prop_assert_eq!(book.balance(*agent), want);
            }
            prop_assert!(book.verify_integrity());
        }
    }
}
