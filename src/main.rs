//! Clinic queue client
//!
//! Command line front end for clinic staff and patients.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Error, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use clinic_queue::api::QueueApiClient;
use clinic_queue::config;
use clinic_queue::error::AUTH_REQUIRED_MESSAGE;
use clinic_queue::session::{FileSessionStore, SessionStore};
use clinic_queue::telemetry;
use clinic_queue::ui::{Form, FormError, LoginForm, RegistrationForm};
use clinic_queue::{
    BearerToken, Dashboard, DashboardState, Notification, Notifier, QueueEntryId, QueueStatus,
    Severity,
};

#[derive(Parser)]
#[command(name = "clinic-queue", about = "Clinic queue management client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Extra configuration file layered over config/default.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and keep the session token
    Login {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        password: String,
    },
    /// Register a new patient account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        password: String,
        /// Defaults to --password
        #[arg(long)]
        confirm_password: Option<String>,
    },
    /// Forget the stored session token
    Logout,
    /// Show the queue
    List {
        /// Only the called patients panel
        #[arg(long)]
        called: bool,
    },
    /// Call a waiting patient
    Call { id: u64 },
    /// Start serving a called patient
    Serve { id: u64 },
    /// Mark a patient as completed
    Complete { id: u64 },
}

/// Prints notifications for the person at the terminal.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Success => println!("{}", notification.message),
            Severity::Error => eprintln!("{}", notification.message),
        }
    }
}

fn invalid_form(e: FormError) -> Error {
    anyhow!("{}", e.messages().join("\n"))
}

async fn require_token(store: &FileSessionStore) -> Result<BearerToken> {
    store
        .load()
        .await?
        .ok_or_else(|| anyhow!(AUTH_REQUIRED_MESSAGE))
}

fn print_queue(state: &DashboardState, called_only: bool) {
    let entries = if called_only {
        state.called_patients()
    } else {
        state.queues()
    };
    if entries.is_empty() {
        println!("No patients in queue.");
        return;
    }

    println!("{:>4}  {:>6}  {:<12} {:<24} {:<12} REASON", "NO.", "ID", "STATUS", "NAME", "PHONE");
    for entry in entries {
        let (name, phone) = state
            .patient(entry.user_id)
            .map(|p| (p.name.as_str(), p.phone_number.as_str()))
            .unwrap_or(("-", "-"));
        println!(
            "{:>4}  {:>6}  {:<12} {:<24} {:<12} {}",
            entry.queue_number,
            entry.queue_entry_id,
            entry.queue_status.label(),
            name,
            phone,
            entry.reason
        );
    }
}

async fn update_patient(
    client: QueueApiClient,
    store: &FileSessionStore,
    id: QueueEntryId,
    status: QueueStatus,
) -> Result<()> {
    let token = store.load().await?;
    let dashboard = Dashboard::new(client.clone(), ConsoleNotifier);

    if let Some(token) = &token {
        let (queues, users) = client.list_queues(token).await?.into_parts();
        dashboard.load(queues, users).await;
    }

    let entry = match dashboard.queues().await.into_iter().find(|e| e.queue_entry_id == id) {
        Some(entry) => entry,
        None if token.is_none() => {
            ConsoleNotifier.notify(Notification::error(AUTH_REQUIRED_MESSAGE));
            bail!("not logged in");
        }
        None => bail!("queue entry {} not found", id),
    };

    // The dashboard has already told the user what went wrong
    dashboard.update_status(token.as_ref(), &entry, status).await?;

    print_queue(&dashboard.snapshot().await, true);
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Error> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = config::load_config_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    telemetry::init(&config.logging).map_err(|e| anyhow!(e))?;

    let client = QueueApiClient::new(&config.api)?;
    let store = FileSessionStore::new(&config.session.token_path);
    info!(api = %client.base_url(), "Using queue API");

    let result = match cli.command {
        Commands::Login { phone, password } => {
            let form = LoginForm {
                phone_number: phone,
                password,
            };
            match form.submit(|form| form) {
                Ok(form) => {
                    let token = client.login(&form).await?;
                    store.store(&token).await?;
                    println!("Logged in.");
                    Ok(())
                }
                Err(e) => Err(invalid_form(e)),
            }
        }
        Commands::Register {
            name,
            phone,
            password,
            confirm_password,
        } => {
            let form = RegistrationForm {
                name,
                phone_number: phone,
                confirm_password: confirm_password.unwrap_or_else(|| password.clone()),
                password,
            };
            match form.submit(|form| form) {
                Ok(form) => {
                    client.register(&form).await?;
                    println!("Registration complete. You can now log in.");
                    Ok(())
                }
                Err(e) => Err(invalid_form(e)),
            }
        }
        Commands::Logout => {
            store.clear().await?;
            println!("Logged out.");
            Ok(())
        }
        Commands::List { called } => {
            let token = require_token(&store).await?;
            let (queues, users) = client.list_queues(&token).await?.into_parts();
            print_queue(&DashboardState::new(queues, users), called);
            Ok(())
        }
        Commands::Call { id } => {
            update_patient(client, &store, QueueEntryId(id), QueueStatus::Called).await
        }
        Commands::Serve { id } => {
            update_patient(client, &store, QueueEntryId(id), QueueStatus::NowServing).await
        }
        Commands::Complete { id } => {
            update_patient(client, &store, QueueEntryId(id), QueueStatus::Completed).await
        }
    };

    if let Err(e) = &result {
        error!(error = %e, "Command failed");
    }
    result
}
