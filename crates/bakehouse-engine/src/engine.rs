use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use bakehouse_ledger::{EntryKind, LedgerEntry};
use bakehouse_types::{Agent, Bake, BakehouseError, Result, Submission};

use crate::config::EngineConfig;
use crate::store::{StateStore, WorldState};

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 5000;
const MAX_CATEGORY_LEN: usize = 64;

/// Fields supplied by the creator of a new bake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBakeRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    pub bounty: i64,
    pub deadline: DateTime<Utc>,
}

/// How the shared refund unit resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundOutcome {
    /// A refund entry was written and the bake cancelled.
    Refunded,
    /// A refund entry already existed; nothing new was written.
    AlreadyRefunded,
    /// The bake no longer matched the expiry rules at transaction time.
    Skipped,
}

/// The BP ledger and bake-lifecycle escrow engine. Every money-moving
/// operation runs as one atomic snapshot/commit transaction; business
/// violations are rejected before the commit, so no partial debit, credit,
/// or status change is ever observable.
pub struct BakeEngine {
    store: Arc<dyn StateStore>,
    config: EngineConfig,
}

impl BakeEngine {
    pub fn new(store: Arc<dyn StateStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one atomic unit: snapshot, apply `op` to the clone, commit with
    /// compare-and-swap. One immediate retry on commit conflict, then the
    /// conflict is surfaced as `TransientStore`.
    pub(crate) async fn with_txn<T, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(&mut WorldState) -> Result<T>,
    {
        let mut retried = false;
        loop {
            let (version, mut state) = self.store.snapshot().await;
            let out = op(&mut state)?;
            match self.store.commit(version, state).await {
                Ok(()) => return Ok(out),
                Err(conflict) if !retried => {
                    debug!(%conflict, "commit conflict, retrying transaction once");
                    retried = true;
                }
                Err(conflict) => {
                    return Err(BakehouseError::TransientStore(conflict.to_string()));
                }
            }
        }
    }

    /// Register a new agent and credit the registration bonus in the same
    /// atomic unit.
    pub async fn register_agent(&self, name: &str) -> Result<Agent> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BakehouseError::Validation("agent name is empty".into()));
        }

        let bonus = self.config.registration_bonus;
        let agent = self
            .with_txn(|state| {
                let agent = Agent::new(name);
                if bonus > 0 {
                    state
                        .ledger
                        .append(agent.id, None, EntryKind::RegistrationBonus, bonus);
                }
                state.agents.insert(agent.id, agent.clone());
                Ok(agent)
            })
            .await?;

        info!(agent_id = %agent.id, name = %agent.name, bonus, "agent registered");
        Ok(agent)
    }

    /// Create a bake, escrowing the bounty from the creator.
    ///
    /// Field validation and the rate-limit check happen before the strict
    /// transaction; the balance check, the debit, the bake row, and the
    /// counter updates are one atomic unit.
    pub async fn create_bake(&self, creator_id: Uuid, req: CreateBakeRequest) -> Result<Bake> {
        let now = Utc::now();
        self.validate_request(&req, now)?;

        // Rate-limit read outside the transaction. Deliberately allows a
        // narrow race (two creations inside the window); not a money-safety
        // concern, so we avoid serializing all creations per agent.
        {
            let (_, state) = self.store.snapshot().await;
            let agent = state
                .agents
                .get(&creator_id)
                .ok_or(BakehouseError::AgentNotFound(creator_id))?;
            if !agent.is_active() {
                return Err(BakehouseError::Forbidden("agent is inactive".into()));
            }
            if let Some(last) = agent.last_bake_created_at {
                let cooldown = self.config.creation_cooldown();
                let elapsed = now - last;
                if elapsed < cooldown {
                    return Err(BakehouseError::RateLimited {
                        retry_after_secs: (cooldown - elapsed).num_seconds().max(1),
                    });
                }
            }
        }

        let bounty = req.bounty;
        let bake = self
            .with_txn(|state| {
                let balance = state.ledger.balance(creator_id);
                if balance < bounty {
                    return Err(BakehouseError::InsufficientFunds {
                        balance,
                        required: bounty,
                    });
                }

                let bake = Bake::new(
                    creator_id,
                    req.title.trim(),
                    req.description.trim(),
                    req.category.trim(),
                    bounty,
                    req.deadline,
                );
                state
                    .ledger
                    .append(creator_id, Some(bake.id), EntryKind::BakeCreated, -bounty);

                let agent = state
                    .agents
                    .get_mut(&creator_id)
                    .ok_or(BakehouseError::AgentNotFound(creator_id))?;
                agent.bakes_created += 1;
                agent.last_bake_created_at = Some(now);

                state.bakes.insert(bake.id, bake.clone());
                Ok(bake)
            })
            .await?;

        info!(
            bake_id = %bake.id,
            creator_id = %creator_id,
            bounty,
            "bake created, bounty escrowed"
        );
        Ok(bake)
    }

    fn validate_request(&self, req: &CreateBakeRequest, now: DateTime<Utc>) -> Result<()> {
        if req.bounty < self.config.min_bounty {
            return Err(BakehouseError::Validation(format!(
                "bounty {} is below the minimum of {} BP",
                req.bounty, self.config.min_bounty
            )));
        }
        if req.deadline <= now {
            return Err(BakehouseError::Validation(
                "deadline must be in the future".into(),
            ));
        }
        let title = req.title.trim();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(BakehouseError::Validation(format!(
                "title must be 1..={} characters",
                MAX_TITLE_LEN
            )));
        }
        let description = req.description.trim();
        if description.is_empty() || description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(BakehouseError::Validation(format!(
                "description must be 1..={} characters",
                MAX_DESCRIPTION_LEN
            )));
        }
        let category = req.category.trim();
        if category.is_empty() || category.chars().count() > MAX_CATEGORY_LEN {
            return Err(BakehouseError::Validation(format!(
                "category must be 1..={} characters",
                MAX_CATEGORY_LEN
            )));
        }
        Ok(())
    }

    /// Enter an open bake. No BP moves here; still one transaction so the
    /// open/deadline checks and the insert are consistent.
    pub async fn submit(&self, bake_id: Uuid, agent_id: Uuid) -> Result<Submission> {
        let now = Utc::now();
        self.with_txn(|state| {
            let bake = state
                .bakes
                .get(&bake_id)
                .ok_or(BakehouseError::BakeNotFound(bake_id))?;
            let agent = state
                .agents
                .get(&agent_id)
                .ok_or(BakehouseError::AgentNotFound(agent_id))?;

            if !agent.is_active() {
                return Err(BakehouseError::Forbidden("agent is inactive".into()));
            }
            if bake.creator_id == agent_id {
                return Err(BakehouseError::Forbidden(
                    "creator cannot submit to their own bake".into(),
                ));
            }
            if !bake.is_open() {
                return Err(BakehouseError::Conflict("bake is not open".into()));
            }
            if bake.deadline <= now {
                return Err(BakehouseError::Conflict("bake deadline has passed".into()));
            }
            if state.submission_by(bake_id, agent_id).is_some() {
                return Err(BakehouseError::Conflict(
                    "agent already submitted to this bake".into(),
                ));
            }

            let submission = Submission::new(bake_id, agent_id);
            state.submissions.insert(submission.id, submission.clone());
            Ok(submission)
        })
        .await
    }

    /// Mark a submission as the winner, credit the bounty to its agent,
    /// and close the bake, all in one atomic unit. Every precondition
    /// failure is rejected before any write.
    pub async fn select_winner(
        &self,
        bake_id: Uuid,
        submission_id: Uuid,
        requester_id: Uuid,
    ) -> Result<()> {
        let now = Utc::now();
        let (winner_id, bounty) = self
            .with_txn(|state| {
                let bake = state
                    .bakes
                    .get(&bake_id)
                    .ok_or(BakehouseError::BakeNotFound(bake_id))?;
                let submission = state
                    .submissions
                    .get(&submission_id)
                    .filter(|s| s.bake_id == bake_id)
                    .ok_or(BakehouseError::SubmissionNotFound(submission_id))?;

                if bake.creator_id != requester_id {
                    return Err(BakehouseError::Forbidden(
                        "only the bake creator may select a winner".into(),
                    ));
                }
                if !bake.is_open() {
                    return Err(BakehouseError::Conflict("bake is not open".into()));
                }
                if submission.is_winner {
                    return Err(BakehouseError::Conflict(
                        "submission is already the winner".into(),
                    ));
                }

                let winner_agent_id = submission.agent_id;
                let bounty = bake.bounty;
                let submitters: Vec<Uuid> = state
                    .submissions_for_bake(bake_id)
                    .iter()
                    .map(|s| s.agent_id)
                    .collect();

                state
                    .submissions
                    .get_mut(&submission_id)
                    .ok_or(BakehouseError::SubmissionNotFound(submission_id))?
                    .is_winner = true;
                state
                    .ledger
                    .append(winner_agent_id, Some(bake_id), EntryKind::BakeWon, bounty);
                state
                    .bakes
                    .get_mut(&bake_id)
                    .ok_or(BakehouseError::BakeNotFound(bake_id))?
                    .close(submission_id, now)?;

                if let Some(winner) = state.agents.get_mut(&winner_agent_id) {
                    winner.bakes_won += 1;
                }
                for agent_id in submitters {
                    if let Some(agent) = state.agents.get_mut(&agent_id) {
                        agent.bakes_attempted += 1;
                    }
                }
                Ok((winner_agent_id, bounty))
            })
            .await?;

        info!(
            bake_id = %bake_id,
            winner_id = %winner_id,
            bounty,
            "winner selected, bounty credited"
        );
        Ok(())
    }

    /// Creator-initiated cancellation. Only allowed while the bake is open
    /// and has no submissions.
    pub async fn cancel_bake(&self, bake_id: Uuid, requester_id: Uuid) -> Result<()> {
        let now = Utc::now();
        let outcome = self
            .with_txn(|state| {
                let bake = state
                    .bakes
                    .get(&bake_id)
                    .ok_or(BakehouseError::BakeNotFound(bake_id))?;
                if bake.creator_id != requester_id {
                    return Err(BakehouseError::Forbidden(
                        "only the bake creator may cancel".into(),
                    ));
                }
                if state.submission_count(bake_id) > 0 {
                    return Err(BakehouseError::Conflict(
                        "bake already has submissions".into(),
                    ));
                }
                Self::apply_refund(state, bake_id, EntryKind::BakeCancelled, now)
            })
            .await?;

        if outcome == RefundOutcome::Refunded {
            info!(bake_id = %bake_id, "bake cancelled, bounty refunded");
        }
        Ok(())
    }

    /// The shared refund unit used by manual cancellation and the expiry
    /// sweeper. The idempotency guard runs first, inside the transaction:
    /// if a refund entry already exists for this bake, the bake's status is
    /// healed to cancelled if needed and no second entry is written.
    pub(crate) fn apply_refund(
        state: &mut WorldState,
        bake_id: Uuid,
        kind: EntryKind,
        now: DateTime<Utc>,
    ) -> Result<RefundOutcome> {
        debug_assert!(kind.is_refund());

        if state.ledger.refund_recorded(bake_id) {
            let bake = state
                .bakes
                .get_mut(&bake_id)
                .ok_or(BakehouseError::BakeNotFound(bake_id))?;
            if bake.is_open() {
                // Heals a crash between the entry write and the status write.
                bake.cancel(now)?;
            }
            return Ok(RefundOutcome::AlreadyRefunded);
        }

        let bake = state
            .bakes
            .get(&bake_id)
            .ok_or(BakehouseError::BakeNotFound(bake_id))?;
        if !bake.is_open() {
            return Err(BakehouseError::Conflict("bake is not open".into()));
        }

        let creator_id = bake.creator_id;
        let bounty = bake.bounty;
        state.ledger.append(creator_id, Some(bake_id), kind, bounty);
        state
            .bakes
            .get_mut(&bake_id)
            .ok_or(BakehouseError::BakeNotFound(bake_id))?
            .cancel(now)?;
        Ok(RefundOutcome::Refunded)
    }


    pub async fn agent(&self, agent_id: Uuid) -> Result<Agent> {
        let (_, state) = self.store.snapshot().await;
        state
            .agents
            .get(&agent_id)
            .cloned()
            .ok_or(BakehouseError::AgentNotFound(agent_id))
    }

    pub async fn bake(&self, bake_id: Uuid) -> Result<Bake> {
        let (_, state) = self.store.snapshot().await;
        state
            .bakes
            .get(&bake_id)
            .cloned()
            .ok_or(BakehouseError::BakeNotFound(bake_id))
    }

    pub async fn list_bakes(&self) -> Vec<Bake> {
        let (_, state) = self.store.snapshot().await;
        state.bakes.values().cloned().collect()
    }

    pub async fn list_agents(&self) -> Vec<Agent> {
        let (_, state) = self.store.snapshot().await;
        state.agents.values().cloned().collect()
    }

    pub async fn submissions(&self, bake_id: Uuid) -> Result<Vec<Submission>> {
        let (_, state) = self.store.snapshot().await;
        if !state.bakes.contains_key(&bake_id) {
            return Err(BakehouseError::BakeNotFound(bake_id));
        }
        Ok(state
            .submissions_for_bake(bake_id)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Derived spendable balance for an agent.
    pub async fn balance(&self, agent_id: Uuid) -> Result<i64> {
        let (_, state) = self.store.snapshot().await;
        if !state.agents.contains_key(&agent_id) {
            return Err(BakehouseError::AgentNotFound(agent_id));
        }
        Ok(state.ledger.balance(agent_id))
    }

    /// All ledger entries attributed to an agent, oldest first.
    pub async fn statement(&self, agent_id: Uuid) -> Result<Vec<LedgerEntry>> {
        let (_, state) = self.store.snapshot().await;
        if !state.agents.contains_key(&agent_id) {
            return Err(BakehouseError::AgentNotFound(agent_id));
        }
        Ok(state
            .ledger
            .entries_for_agent(agent_id)
            .into_iter()
            .cloned()
            .collect())
    }

    pub(crate) async fn snapshot(&self) -> WorldState {
        self.store.snapshot().await.1
    }
}
