//! Tapforge operator CLI
//!
//! Runs one game operation against MongoDB and prints the result as JSON.

use clap::Parser;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tapforge::{
    accounts::TelegramIdentity,
    config::{Args, Command},
    db::schemas::LeaderboardWindow,
    progression::spawn_lock_prune_task,
    AppState, GameError,
};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
const LOCK_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("tapforge={},info", args.log_level).into());
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!(
        "Tapforge {} ({} built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_SHORT"),
        env!("BUILD_TIMESTAMP")
    );
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {} / {}", args.mongodb_uri, args.mongodb_db);

    let state = match AppState::from_args(&args).await {
        Ok(state) => state,
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };
    let _prune = spawn_lock_prune_task(state.locks.clone(), LOCK_PRUNE_INTERVAL);

    let outcome = run(&state, args.command).await;
    state.drain(DRAIN_TIMEOUT).await;

    match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            let (status, body) = e.into_status_code_and_body();
            println!("{}", serde_json::to_string_pretty(&body)?);
            error!(status = status, "Operation failed");
            std::process::exit(1);
        }
    }
}

async fn run(state: &AppState, command: Command) -> Result<serde_json::Value, GameError> {
    match command {
        Command::Register {
            telegram_id,
            username,
            referrer,
        } => {
            let identity = TelegramIdentity {
                telegram_id,
                username,
            };
            let user = state
                .accounts
                .register(&identity, referrer.as_deref())
                .await?;
            to_json(&user.snapshot())
        }
        Command::Tap { user_id } => to_json(&state.progression.tap(&user_id).await?),
        Command::Boost { user_id } => to_json(&state.progression.boost(&user_id).await?),
        Command::ClaimDaily { user_id } => {
            to_json(&state.progression.claim_daily_xp(&user_id).await?)
        }
        Command::ClaimQuest { user_id, quest_id } => {
            to_json(&state.quests.claim_quest(&user_id, &quest_id).await?)
        }
        Command::Quests { user_id } => to_json(
            &state
                .quests
                .available_quests(&user_id, chrono::Utc::now())
                .await?,
        ),
        Command::Leaderboard { window, limit } => {
            let window: LeaderboardWindow = window.parse().map_err(GameError::MissingData)?;
            to_json(
                &state
                    .leaderboard
                    .top(window, limit, chrono::Utc::now())
                    .await?,
            )
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, GameError> {
    serde_json::to_value(value).map_err(|e| GameError::Internal(e.to_string()))
}
