use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::patient::UserId;

/// Identifier of one queue entry, stable for the entry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueEntryId(pub u64);

impl fmt::Display for QueueEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for QueueEntryId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Status of a queue entry.
///
/// `Waiting` is assigned when a patient joins. Staff move an entry through
/// `Called` and `NowServing` until it reaches `Completed`. `Cancelled` is
/// reached from outside the staff workflow. Both `Completed` and `Cancelled`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Waiting,
    Called,
    NowServing,
    Completed,
    Cancelled,
}

impl QueueStatus {
    pub const ALL: [QueueStatus; 5] = [
        QueueStatus::Waiting,
        QueueStatus::Called,
        QueueStatus::NowServing,
        QueueStatus::Completed,
        QueueStatus::Cancelled,
    ];

    /// Wire representation, as sent to and received from the queue API.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Waiting => "waiting",
            QueueStatus::Called => "called",
            QueueStatus::NowServing => "now_serving",
            QueueStatus::Completed => "completed",
            QueueStatus::Cancelled => "cancelled",
        }
    }

    /// Human-readable label for notifications and listings.
    pub fn label(&self) -> &'static str {
        match self {
            QueueStatus::Waiting => "Waiting",
            QueueStatus::Called => "Called",
            QueueStatus::NowServing => "Now Serving",
            QueueStatus::Completed => "Completed",
            QueueStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Completed | QueueStatus::Cancelled)
    }

    /// Whether an entry in this status belongs in the called-patients panel.
    pub fn is_called(&self) -> bool {
        matches!(self, QueueStatus::Called | QueueStatus::NowServing)
    }

    /// Statuses reachable from this one in a single step.
    pub fn next_statuses(&self) -> &'static [QueueStatus] {
        match self {
            QueueStatus::Waiting => &[QueueStatus::Called, QueueStatus::Cancelled],
            QueueStatus::Called => &[
                QueueStatus::NowServing,
                QueueStatus::Completed,
                QueueStatus::Cancelled,
            ],
            QueueStatus::NowServing => &[QueueStatus::Completed],
            QueueStatus::Completed | QueueStatus::Cancelled => &[],
        }
    }

    /// Re-asserting a non-terminal status is accepted so repeated updates stay idempotent.
    pub fn can_transition_to(&self, next: QueueStatus) -> bool {
        if *self == next {
            return !self.is_terminal();
        }
        self.next_statuses().contains(&next)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "unknown queue status '{0}', expected one of: \
     waiting, called, now_serving, completed, cancelled"
)]
pub struct ParseStatusError(String);

impl FromStr for QueueStatus {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim().to_lowercase();
        QueueStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or(ParseStatusError(value))
    }
}

/// One patient's slot in a clinic queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub queue_entry_id: QueueEntryId,
    pub user_id: UserId,
    pub queue_number: u32,
    pub queue_status: QueueStatus,
    #[serde(default)]
    pub reason: String,
}

impl QueueEntry {
    /// Copy of this entry carrying a different status.
    pub fn with_status(&self, queue_status: QueueStatus) -> Self {
        Self {
            queue_status,
            ..self.clone()
        }
    }
}
