//! API module for the remote queue service
//!
//! This module contains the HTTP client and the trait the dashboard talks to.

pub mod client;

use async_trait::async_trait;

use crate::error::QueueError;
use crate::models::{QueueEntryId, QueueStatus};
use crate::session::BearerToken;

pub use client::{QueueApiClient, QueueListing, TUNNEL_WARNING_HEADER};

/// Remote side of a status change.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueService: Send + Sync {
    async fn update_status(
        &self,
        token: &BearerToken,
        id: QueueEntryId,
        status: QueueStatus,
    ) -> Result<(), QueueError>;
}

#[async_trait]
impl<S: QueueService + ?Sized> QueueService for std::sync::Arc<S> {
    async fn update_status(
        &self,
        token: &BearerToken,
        id: QueueEntryId,
        status: QueueStatus,
    ) -> Result<(), QueueError> {
        (**self).update_status(token, id, status).await
    }
}
