//! Staff-side queue workflow: local dashboard state and user notifications.

pub mod dashboard;
pub mod notify;
