use reqwest::StatusCode;
use thiserror::Error;

use crate::models::{QueueEntryId, QueueStatus};

pub const AUTH_REQUIRED_MESSAGE: &str = "Authentication required. Please log in again.";
pub const UPDATE_FAILED_MESSAGE: &str = "Failed to update patient status. Please try again.";

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("authentication required")]
    AuthRequired,

    #[error("illegal status transition from {from} to {to}")]
    IllegalTransition { from: QueueStatus, to: QueueStatus },

    #[error("an update for queue entry {0} is already in flight")]
    UpdateInFlight(QueueEntryId),

    #[error("request failed with status {status}")]
    RequestFailed { status: StatusCode, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("login response did not carry a token")]
    MissingToken,

    #[error("invalid API base URL '{0}'")]
    InvalidBaseUrl(String),
}

impl QueueError {
    /// Message safe to show to staff. Response bodies never leak through here.
    pub fn user_message(&self) -> String {
        match self {
            QueueError::AuthRequired | QueueError::MissingToken => {
                AUTH_REQUIRED_MESSAGE.to_string()
            }
            QueueError::IllegalTransition { from, to } => format!(
                "Cannot change a {} patient to {}.",
                from.label(),
                to.label()
            ),
            QueueError::UpdateInFlight(_) => {
                "An update for this patient is already in progress.".to_string()
            }
            QueueError::RequestFailed { .. }
            | QueueError::Transport(_)
            | QueueError::Decode(_)
            | QueueError::InvalidBaseUrl(_) => UPDATE_FAILED_MESSAGE.to_string(),
        }
    }
}

/// Errors from reading or writing the stored session credential.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
