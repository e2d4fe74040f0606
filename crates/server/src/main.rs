//! threadrelay
//!
//! Relays Linear issue progress into the Slack threads the issues were
//! created from, and creates issues from a Slack slash command.

mod cmd_status;
mod commands;
mod config;
mod directory;
mod error;
mod interactivity;
mod logging;
mod paths;
mod render;
mod state;
mod state_cache;
mod status;
#[cfg(test)]
mod test_support;
mod transition;
mod webhook;
mod workflow;

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use clap::{Args, Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use threadrelay_connectors::{LinearClient, SlackClient};

use crate::config::{RelayConfig, ServeArgs};
use crate::directory::IssueDirectory;
use crate::paths::DataPaths;
use crate::state::AppState;
use crate::state_cache::StateCache;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "threadrelay", version = VERSION, about = "Linear ↔ Slack thread relay")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the relay HTTP server
    Serve(ServeArgs),
    /// Check whether a relay is running
    Status(StatusArgs),
}

#[derive(Args)]
struct StatusArgs {
    /// Base URL of the relay
    #[arg(long, env = "THREADRELAY_URL", default_value = "http://127.0.0.1:3000")]
    url: String,

    #[arg(long, env = "THREADRELAY_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match Cli::parse().command {
        Command::Serve(args) => serve(args).await,
        Command::Status(args) => {
            let paths = DataPaths::resolve(args.data_dir.as_deref())?;
            cmd_status::run(&args.url, paths.root()).await
        }
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let paths = DataPaths::resolve(args.data_dir.as_deref())?;
    paths.ensure_dirs()?;
    let logging = logging::init_logging(&paths)?;

    let config = RelayConfig::from_args(&args)?;
    info!(
        component = "server",
        event = "server.starting",
        version = VERSION,
        run_id = %logging.run_id,
        config = ?config,
        "Starting threadrelay"
    );

    let chat = SlackClient::new(&config.slack_api_base, &config.slack_bot_token)?;
    let tracker = LinearClient::new(&config.linear_api_url, &config.linear_api_key)?;
    let bind = config.bind;
    let state = Arc::new(AppState::new(
        config,
        Arc::new(IssueDirectory::new()),
        Arc::new(StateCache::new()),
        Arc::new(chat),
        Arc::new(tracker),
    ));

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(
        component = "server",
        event = "server.listening",
        bind = %bind,
        "Listening"
    );
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(component = "server", event = "server.stopped", "Server stopped");
    drop(logging.guard);
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook/linear", post(webhook::linear_webhook))
        .route(
            "/slack/commands/create-task",
            post(commands::create_task_command),
        )
        .route("/slack/interactivity", post(interactivity::slack_interactivity))
        .route("/health", get(status::health_handler))
        .route("/debug/mappings", get(status::mappings_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(
            component = "server",
            event = "server.signal_failed",
            error = %err,
            "Could not listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
    info!(component = "server", event = "server.shutdown", "Shutdown requested");
}
