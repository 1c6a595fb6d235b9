//! Clinic queue client core library
//!
//! This module exports the queue status workflow, the HTTP client for the
//! remote queue service, and patient form validation.

pub mod api;
pub mod core;
pub mod error;
pub mod fixtures;
pub mod models;
pub mod session;
pub mod telemetry;
pub mod ui;

pub use crate::core::dashboard::{Dashboard, DashboardState};
pub use crate::core::notify::{Notification, Notifier, Severity};
pub use error::QueueError;
pub use models::{Patient, QueueEntry, QueueEntryId, QueueStatus, UserId, UserMap};
pub use session::BearerToken;

/// Application configuration
pub mod config {
    use std::path::Path;

    use serde::Deserialize;

    #[derive(Debug, Clone, Deserialize)]
    pub struct Config {
        pub api: ApiConfig,
        pub session: SessionConfig,
        pub logging: LoggingConfig,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ApiConfig {
        pub base_url: String,
        pub timeout_secs: u64,
        /// Send the header that suppresses the tunnel provider's interstitial page.
        pub skip_tunnel_warning: bool,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct SessionConfig {
        pub token_path: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct LoggingConfig {
        pub filter: String,
        pub json: bool,
    }

    /// Load configuration from the default locations
    pub fn load_config() -> Result<Config, config::ConfigError> {
        load_config_from(None)
    }

    /// Load configuration, layering an explicit file over the defaults
    pub fn load_config_from(path: Option<&Path>) -> Result<Config, config::ConfigError> {
        let env = std::env::var("CLINIC_QUEUE_ENV").unwrap_or_else(|_| "development".into());
        layered(&env, path, environment())
    }

    // Override with environment variables, e.g. CLINIC_QUEUE__API__BASE_URL
    fn environment() -> config::Environment {
        config::Environment::with_prefix("CLINIC_QUEUE")
            .prefix_separator("__")
            .separator("__")
    }

    fn layered(
        env: &str,
        path: Option<&Path>,
        vars: config::Environment,
    ) -> Result<Config, config::ConfigError> {
        let mut builder = config::Config::builder()
            // Start with built-in defaults
            .set_default("api.base_url", "http://localhost:8000/api")?
            .set_default("api.timeout_secs", 30_i64)?
            .set_default("api.skip_tunnel_warning", false)?
            .set_default("session.token_path", ".clinic-queue/token")?
            .set_default("logging.filter", "info")?
            .set_default("logging.json", false)?
            .add_source(config::File::with_name("config/default").required(false))
            // Override with environment-specific settings
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false));

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        builder.add_source(vars).build()?.try_deserialize()
    }

}
