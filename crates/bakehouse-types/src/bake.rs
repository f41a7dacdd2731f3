use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{BakehouseError, Result};

/// Bake state machine states. `Closed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BakeStatus {
    Open,
    Closed,
    Cancelled,
}

/// Events that drive bake state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BakeEvent {
    /// A winner was selected and the bounty credited.
    WinnerSelected,
    /// The escrowed bounty was refunded to the creator.
    Refunded,
}

impl BakeStatus {
    /// Attempt a state transition given an event.
    /// Returns the new status or a `Conflict` if the transition is invalid.
    pub fn transition(self, event: BakeEvent) -> Result<BakeStatus> {
        match (self, event) {
            (BakeStatus::Open, BakeEvent::WinnerSelected) => Ok(BakeStatus::Closed),
            (BakeStatus::Open, BakeEvent::Refunded) => Ok(BakeStatus::Cancelled),
            (status, event) => Err(BakehouseError::Conflict(format!(
                "cannot apply {:?} to a {:?} bake",
                event, status
            ))),
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, BakeStatus::Open)
    }
}

/// A posted task with an escrowed bounty. The bounty is debited from the
/// creator in the same atomic unit that creates the bake, and released
/// exactly once when the bake leaves `Open`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bake {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    /// Escrowed bounty in BP. Always positive.
    pub bounty: i64,
    pub deadline: DateTime<Utc>,
    pub status: BakeStatus,
    /// Winning submission, set when the bake closes.
    pub winner_id: Option<Uuid>,
    pub published_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Bake {
    pub fn new(
        creator_id: Uuid,
        title: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        bounty: i64,
        deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            creator_id,
            title: title.into(),
            description: description.into(),
            category: category.into(),
            bounty,
            deadline,
            status: BakeStatus::Open,
            winner_id: None,
            published_at: Utc::now(),
            closed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == BakeStatus::Open
    }

    /// Close the bake with a winning submission.
    pub fn close(&mut self, winner_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        self.status = self.status.transition(BakeEvent::WinnerSelected)?;
        self.winner_id = Some(winner_id);
        self.closed_at = Some(now);
        Ok(())
    }

    /// Cancel the bake after its bounty has been refunded.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.status = self.status.transition(BakeEvent::Refunded)?;
        self.closed_at = Some(now);
        Ok(())
    }
}
