use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use bakehouse_ledger::EntryKind;
use bakehouse_types::Bake;

use crate::engine::{BakeEngine, RefundOutcome};

/// Result of one sweep pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepSummary {
    /// Open bakes that matched an expiry rule at scan time.
    pub candidates: usize,
    /// Refunds actually issued this pass.
    pub refunded: usize,
    /// Candidates that turned out to be already resolved or no longer
    /// eligible by the time their transaction ran.
    pub skipped: usize,
    /// Per-bake failures; the sweep continues past them.
    pub errors: Vec<SweepError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepError {
    pub bake_id: Uuid,
    pub message: String,
}

impl BakeEngine {
    /// Periodic, stateless expiry sweep. Two rules:
    ///
    /// - Rule A: open, past deadline, zero submissions.
    /// - Rule B: open, at least one submission, no winner, deadline more
    ///   than the abandoned-grace period in the past.
    ///
    /// Each bake is refunded in its own transaction, so one failure never
    /// blocks the rest. Safe to re-run at any time: the refund path's
    /// idempotency guard makes repeated passes no-ops.
    pub async fn run_expiry_sweep(&self, now: DateTime<Utc>) -> SweepSummary {
        let grace = self.config().abandoned_grace();

        let state = self.snapshot().await;
        let candidates: Vec<Uuid> = state
            .bakes
            .values()
            .filter(|b| b.is_open() && expiry_due(b, state.submission_count(b.id), now, grace))
            .map(|b| b.id)
            .collect();

        let mut summary = SweepSummary {
            candidates: candidates.len(),
            ..SweepSummary::default()
        };

        for bake_id in candidates {
            let result = self
                .with_txn(|state| {
                    let Some(bake) = state.bakes.get(&bake_id) else {
                        return Ok(RefundOutcome::Skipped);
                    };
                    // Re-evaluate inside the transaction: the bake may have
                    // been closed or cancelled since the scan.
                    if !bake.is_open()
                        || !expiry_due(bake, state.submission_count(bake_id), now, grace)
                    {
                        return Ok(RefundOutcome::Skipped);
                    }
                    BakeEngine::apply_refund(state, bake_id, EntryKind::BakeExpired, now)
                })
                .await;

            match result {
                Ok(RefundOutcome::Refunded) => {
                    info!(bake_id = %bake_id, "expired bake refunded");
                    summary.refunded += 1;
                }
                Ok(_) => summary.skipped += 1,
                Err(e) => {
                    warn!(bake_id = %bake_id, error = %e, "sweep failed for bake");
                    summary.errors.push(SweepError {
                        bake_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            candidates = summary.candidates,
            refunded = summary.refunded,
            skipped = summary.skipped,
            errors = summary.errors.len(),
            "expiry sweep finished"
        );
        summary
    }
}

/// Whether an open bake is due for an expiry refund at `now`.
fn expiry_due(bake: &Bake, submissions: usize, now: DateTime<Utc>, grace: chrono::Duration) -> bool {
    if bake.winner_id.is_some() {
        return false;
    }
    if submissions == 0 {
        bake.deadline < now
    } else {
        bake.deadline + grace < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::CreateBakeRequest;
    use crate::store::MemoryStore;
    use bakehouse_types::BakeStatus;
    use chrono::Duration;
    use std::sync::Arc;

    fn engine() -> BakeEngine {
        let config = EngineConfig {
            creation_cooldown_secs: 0,
            ..EngineConfig::default()
        };
        BakeEngine::new(Arc::new(MemoryStore::new()), config)
    }

    fn request(bounty: i64, deadline_in: Duration) -> CreateBakeRequest {
        CreateBakeRequest {
            title: "Bake a rye loaf".into(),
            description: "Document the crumb".into(),
            category: "bread".into(),
            bounty,
            deadline: Utc::now() + deadline_in,
        }
    }

    #[tokio::test]
    async fn test_rule_a_refunds_unclaimed_expired_bake() {
        let engine = engine();
        let creator = engine.register_agent("creator").await.unwrap();
        let bake = engine
            .create_bake(creator.id, request(300, Duration::hours(1)))
            .await
            .unwrap();
        assert_eq!(engine.balance(creator.id).await.unwrap(), 700);

        // Deadline passed, no submissions.
        let later = Utc::now() + Duration::hours(2);
        let summary = engine.run_expiry_sweep(later).await;
        assert_eq!(summary.refunded, 1);
        assert!(summary.errors.is_empty());

        assert_eq!(engine.balance(creator.id).await.unwrap(), 1000);
        assert_eq!(
            engine.bake(bake.id).await.unwrap().status,
            BakeStatus::Cancelled
        );

        // Re-running the sweep is a no-op.
        let again = engine.run_expiry_sweep(later).await;
        assert_eq!(again.candidates, 0);
        assert_eq!(again.refunded, 0);
        assert_eq!(engine.balance(creator.id).await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_rule_b_grace_period() {
        let engine = engine();
        let creator = engine.register_agent("creator").await.unwrap();
        let rival_a = engine.register_agent("rival-a").await.unwrap();
        let rival_b = engine.register_agent("rival-b").await.unwrap();

        // Two bakes with submissions, no winner selected.
        let abandoned = engine
            .create_bake(creator.id, request(200, Duration::hours(1)))
            .await
            .unwrap();
        let recent = engine
            .create_bake(creator.id, request(200, Duration::hours(1)))
            .await
            .unwrap();
        engine.submit(abandoned.id, rival_a.id).await.unwrap();
        engine.submit(abandoned.id, rival_b.id).await.unwrap();
        engine.submit(recent.id, rival_a.id).await.unwrap();

        let two_days_past = Utc::now() + Duration::hours(1) + Duration::days(2);
        let eight_days_past = Utc::now() + Duration::hours(1) + Duration::days(8);

        // 2 days past deadline: within the 7-day grace, nothing qualifies.
        let summary = engine.run_expiry_sweep(two_days_past).await;
        assert_eq!(summary.refunded, 0);
        assert!(engine.bake(abandoned.id).await.unwrap().is_open());
        assert!(engine.bake(recent.id).await.unwrap().is_open());

        // 8 days past deadline: Rule B refunds both.
        let summary = engine.run_expiry_sweep(eight_days_past).await;
        assert_eq!(summary.refunded, 2);
        assert_eq!(
            engine.bake(abandoned.id).await.unwrap().status,
            BakeStatus::Cancelled
        );
        assert_eq!(engine.balance(creator.id).await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_bake_with_submissions_within_grace_is_untouched() {
        let engine = engine();
        let creator = engine.register_agent("creator").await.unwrap();
        let rival = engine.register_agent("rival").await.unwrap();

        let bake = engine
            .create_bake(creator.id, request(200, Duration::hours(1)))
            .await
            .unwrap();
        engine.submit(bake.id, rival.id).await.unwrap();

        // 2 days past deadline with submissions: Rule A does not apply and
        // Rule B's grace has not elapsed.
        let now = Utc::now() + Duration::hours(1) + Duration::days(2);
        let summary = engine.run_expiry_sweep(now).await;
        assert_eq!(summary.candidates, 0);
        assert!(engine.bake(bake.id).await.unwrap().is_open());
        assert_eq!(engine.balance(creator.id).await.unwrap(), 800);
    }

    #[tokio::test]
    async fn test_open_bake_before_deadline_is_untouched() {
        let engine = engine();
        let creator = engine.register_agent("creator").await.unwrap();
        engine
            .create_bake(creator.id, request(150, Duration::days(3)))
            .await
            .unwrap();

        let summary = engine.run_expiry_sweep(Utc::now()).await;
        assert_eq!(summary.candidates, 0);
        assert_eq!(summary.refunded, 0);
    }

    #[tokio::test]
    async fn test_sweep_skips_bake_closed_after_scan() {
        let engine = engine();
        let creator = engine.register_agent("creator").await.unwrap();
        let rival = engine.register_agent("rival").await.unwrap();
        let bake = engine
            .create_bake(creator.id, request(200, Duration::hours(1)))
            .await
            .unwrap();
        let submission = engine.submit(bake.id, rival.id).await.unwrap();

        // Winner selected before the sweep reaches the bake: the in-txn
        // re-check must skip it rather than refund a closed bake.
        engine
            .select_winner(bake.id, submission.id, creator.id)
            .await
            .unwrap();

        let now = Utc::now() + Duration::days(9);
        let summary = engine.run_expiry_sweep(now).await;
        assert_eq!(summary.refunded, 0);
        assert!(summary.errors.is_empty());
        assert_eq!(
            engine.bake(bake.id).await.unwrap().status,
            BakeStatus::Closed
        );
        assert_eq!(engine.balance(rival.id).await.unwrap(), 1200);
    }
}
