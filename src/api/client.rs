use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use super::QueueService;
use crate::config::ApiConfig;
use crate::error::QueueError;
use crate::models::{user_map, Patient, QueueEntry, QueueEntryId, QueueStatus, UserMap};
use crate::session::BearerToken;
use crate::ui::forms::{LoginForm, RegistrationForm};

/// Header the tunnelling proxy in front of the API checks before serving its warning page.
pub const TUNNEL_WARNING_HEADER: &str = "ngrok-skip-browser-warning";

#[derive(Debug, Serialize)]
struct StatusUpdateBody {
    queue_status: QueueStatus,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Queue entries and their patients as returned by `GET /queues`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueueListing {
    pub queues: Vec<QueueEntry>,
    #[serde(default)]
    pub users: Vec<Patient>,
}

impl QueueListing {
    pub fn into_parts(self) -> (Vec<QueueEntry>, UserMap) {
        (self.queues, user_map(self.users))
    }
}

/// HTTP client for the remote queue service.
#[derive(Debug, Clone)]
pub struct QueueApiClient {
    http: Client,
    base_url: Url,
}

impl QueueApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, QueueError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|_| QueueError::InvalidBaseUrl(config.base_url.clone()))?;
        if base_url.cannot_be_a_base() {
            return Err(QueueError::InvalidBaseUrl(config.base_url.clone()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if config.skip_tunnel_warning {
            headers.insert(TUNNEL_WARNING_HEADER, HeaderValue::from_static("true"));
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, QueueError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| QueueError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Fetch every queue entry along with the patients they reference.
    #[instrument(skip(self, token))]
    pub async fn list_queues(&self, token: &BearerToken) -> Result<QueueListing, QueueError> {
        let url = self.endpoint(&["queues"])?;
        let response = self.http.get(url).bearer_auth(token.as_str()).send().await?;
        let body = ensure_success(response).await?.text().await?;
        let listing: QueueListing = serde_json::from_str(&body)?;
        debug!(entries = listing.queues.len(), users = listing.users.len(), "Fetched queues");
        Ok(listing)
    }

    /// Exchange patient credentials for a bearer token.
    #[instrument(skip(self, form), fields(phone_number = %form.phone_number))]
    pub async fn login(&self, form: &LoginForm) -> Result<BearerToken, QueueError> {
        let url = self.endpoint(&["auth", "login"])?;
        let response = self.http.post(url).json(form).send().await?;
        let body = ensure_success(response).await?.text().await?;
        let login: LoginResponse = serde_json::from_str(&body)?;
        login
            .token
            .and_then(BearerToken::new)
            .ok_or(QueueError::MissingToken)
    }

    #[instrument(skip(self, form), fields(phone_number = %form.phone_number))]
    pub async fn register(&self, form: &RegistrationForm) -> Result<(), QueueError> {
        let url = self.endpoint(&["auth", "register"])?;
        let response = self.http.post(url).json(form).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl QueueService for QueueApiClient {
    #[instrument(skip(self, token), fields(queue_entry_id = %id, queue_status = %status))]
    async fn update_status(
        &self,
        token: &BearerToken,
        id: QueueEntryId,
        status: QueueStatus,
    ) -> Result<(), QueueError> {
        let url = self.endpoint(&["queues", "status", &id.to_string()])?;
        let response = self
            .http
            .put(url)
            .bearer_auth(token.as_str())
            .json(&StatusUpdateBody {
                queue_status: status,
            })
            .send()
            .await?;
        ensure_success(response).await?;
        debug!("Queue status updated");
        Ok(())
    }
}

/// Map non-2xx responses to `RequestFailed`. The body is logged, never surfaced.
async fn ensure_success(response: Response) -> Result<Response, QueueError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(%status, body = %body, "Queue API request failed");
    Err(QueueError::RequestFailed { status, body })
}
