//! Queue and patient data model shared by the client and the dashboard.

pub mod patient;
pub mod queue;

pub use patient::{user_map, Patient, UserId, UserMap};
pub use queue::{ParseStatusError, QueueEntry, QueueEntryId, QueueStatus};
