mod auth;
mod routes;
mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use taskx_core::config::TaskxConfig;
use taskx_core::reminder::ReminderDispatcher;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "taskx-server")]
#[command(about = "Task API with Google Calendar sync and deadline reminders")]
struct Cli {
    /// Config file (default: ~/.config/taskx/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (the default)
    Serve,
    /// Send due reminders once and print the summary
    Remind,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = TaskxConfig::load(cli.config.as_deref())?;
    let state = AppState::from_config(&config).await?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(state, &config).await,
        Commands::Remind => {
            let summary = state.dispatcher.run(Utc::now()).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}

async fn serve(state: AppState, config: &TaskxConfig) -> Result<()> {
    if let Some(secs) = config.reminders.interval_secs.filter(|s| *s > 0) {
        spawn_reminder_ticker(state.dispatcher.clone(), Duration::from_secs(secs));
    }

    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    tracing::info!("taskx-server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Run the dispatcher every `every` for as long as the server is up.
fn spawn_reminder_ticker(dispatcher: Arc<ReminderDispatcher>, every: Duration) {
    tracing::info!(interval_secs = every.as_secs(), "Starting reminder ticker");

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            match dispatcher.run(Utc::now()).await {
                Ok(summary) => tracing::info!(message = %summary.message, "Reminder pass finished"),
                Err(e) => tracing::error!(error = %e, "Reminder pass failed"),
            }
        }
    });
}
