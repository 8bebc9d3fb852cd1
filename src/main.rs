use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use eyre::Result;
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;
use crate::notifier::ExpoNotifier;
use crate::service::ServiceState;
use crate::worker::{sweep_due_reminders, Worker};

mod auth_layer;
mod config;
mod error;
mod extractors;
mod feed;
mod fitness_models;
mod fitness_routes;
mod follow_repo;
#[cfg(test)]
mod memory_repo;
mod notifier;
mod pagination;
mod pbest_repo;
mod post_models;
mod post_repo;
mod reminder_models;
mod reminder_repo;
mod reminder_routes;
mod router;
mod schema;
mod service;
mod social_routes;
mod user_models;
mod user_repo;
mod user_routes;
mod validation;
mod workout_repo;
mod worker;

// identity of the caller, asserted by the gateway in front of this server
const USER_ID_HEADER: &str = "x-user-id";

#[derive(Parser, Debug)]
#[command(name = "kondition")]
#[command(about = "Kondition social server binary")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the server normally
    #[command(name = "run")]
    Run {},
    /// Deliver due reminders once and exit
    #[command(name = "sweep")]
    Sweep {},
}

async fn sweep_once(config: &Config) -> Result<()> {
    let state = ServiceState::new(config)?;
    let notifier = ExpoNotifier::new(config.expo_push_url.clone());
    let report = sweep_due_reminders(&state, &notifier, Utc::now()).await?;
    info!(
        "reminder sweep: {} due, {} sent, {} failed, {} skipped",
        report.due, report.sent, report.failed, report.skipped
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // axum logs rejections from built-in extractors with the `axum::rejection`
                // target, at `TRACE` level. `axum::rejection=trace` enables showing those events
                "kondition_server=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    if let Commands::Sweep {} = args.command {
        sweep_once(&config).await?;
        return Ok(());
    };

    debug!("Initializing resources");

    let service = Arc::new(ServiceState::new(&config)?);
    debug!("Initialized server resources [1/2]");

    let notifier = Arc::new(ExpoNotifier::new(config.expo_push_url.clone()));
    let mut worker = Worker::new(service.clone(), notifier, config.reminder_poll);
    debug!("Initialized worker resources [2/2]");

    let app = router::app(service);

    debug!("Running on {}", &config.bind_addr);
    let tcp_listener = TcpListener::bind(&config.bind_addr).await?;
    axum::serve(tcp_listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tokio::task::spawn_blocking(move || worker.cancel()).await?;

    Ok(())
}
