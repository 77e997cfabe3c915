use anyhow::{Result, bail};
use chrono::Utc;
use uuid::Uuid;

use lostfound_db::Database;
use lostfound_db::queries::NotificationWithItems;
use lostfound_types::models::{ItemKind, ItemReport, ItemStatus, MatchNotification};

use crate::evaluator::MatchCandidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    Updated,
    /// The report was not in the expected prior state.
    Conflict,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Created(MatchNotification),
    /// The pair was already recorded; the stored record is returned unchanged.
    Existing(MatchNotification),
}

impl RecordOutcome {
    pub fn notification(&self) -> &MatchNotification {
        match self {
            Self::Created(n) | Self::Existing(n) => n,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Read/write access to persisted reports.
pub trait ItemStore: Send + Sync {
    /// Reports that have never matched anything.
    fn get_open(&self, kind: ItemKind, scope: &str) -> Result<Vec<ItemReport>>;

    /// Reports that can still be paired: open or already matched, never closed.
    fn get_eligible(&self, kind: ItemKind, scope: &str) -> Result<Vec<ItemReport>>;

    fn get(&self, id: &Uuid) -> Result<Option<ItemReport>>;

    /// Compare-and-set on the report status.
    fn set_status(&self, id: &Uuid, expected_prior: ItemStatus, new_status: ItemStatus) -> Result<StatusUpdate>;

    /// Scopes that currently hold at least one open report.
    fn open_scopes(&self) -> Result<Vec<String>>;
}

/// Durable, deduplicated record of notified pairs.
pub trait NotificationLedger: Send + Sync {
    /// Conditional insert keyed by `(lost_id, found_id)`. Atomic with respect
    /// to concurrent callers recording the same pair.
    fn record(&self, candidate: &MatchCandidate) -> Result<RecordOutcome>;

    /// Notifications whose lost side belongs to `user_id`, newest first.
    fn list_for_user(&self, user_id: &Uuid, unseen_only: bool) -> Result<Vec<NotificationWithItems>>;

    fn mark_delivered(&self, ids: &[Uuid]) -> Result<usize>;
}

impl ItemStore for Database {
    fn get_open(&self, kind: ItemKind, scope: &str) -> Result<Vec<ItemReport>> {
        self.open_items(kind, scope)
    }

    fn get_eligible(&self, kind: ItemKind, scope: &str) -> Result<Vec<ItemReport>> {
        self.eligible_items(kind, scope)
    }

    fn get(&self, id: &Uuid) -> Result<Option<ItemReport>> {
        self.get_item(id)
    }

    fn set_status(&self, id: &Uuid, expected_prior: ItemStatus, new_status: ItemStatus) -> Result<StatusUpdate> {
        if !expected_prior.can_transition_to(new_status) {
            bail!("illegal status transition {} -> {} for item {}", expected_prior, new_status, id);
        }
        if self.update_item_status(id, expected_prior, new_status)? {
            Ok(StatusUpdate::Updated)
        } else {
            Ok(StatusUpdate::Conflict)
        }
    }

    fn open_scopes(&self) -> Result<Vec<String>> {
        self.open_item_scopes()
    }
}

impl NotificationLedger for Database {
    fn record(&self, candidate: &MatchCandidate) -> Result<RecordOutcome> {
        let notification = MatchNotification {
            id: Uuid::new_v4(),
            lost_id: candidate.lost_id,
            found_id: candidate.found_id,
            score: candidate.score,
            created_at: Utc::now(),
            lost_owner_user_id: candidate.lost_owner_user_id,
            match_method: candidate.match_method,
            delivered: false,
        };

        let (created, stored) = self.insert_notification(&notification)?;
        if created {
            Ok(RecordOutcome::Created(stored))
        } else {
            Ok(RecordOutcome::Existing(stored))
        }
    }

    fn list_for_user(&self, user_id: &Uuid, unseen_only: bool) -> Result<Vec<NotificationWithItems>> {
        self.notifications_for_owner(user_id, unseen_only)
    }

    fn mark_delivered(&self, ids: &[Uuid]) -> Result<usize> {
        self.mark_notifications_delivered(ids)
    }
}
