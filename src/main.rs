use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

mod config;
mod error;
mod format;
mod handlers;
mod llm;
mod persona;
mod routing;
mod session;
mod state;
mod utils;

use config::Config;
use handlers::dispatch::{DispatchSettings, Orchestrator};
use handlers::gateway::TelegramGateway;
use handlers::{handle_message, HandlerResult};
use llm::GeminiClient;
use persona::FilePersonaStore;
use routing::command::Command;
use routing::BotIdentity;
use session::{InMemorySessionStore, SessionStore};
use state::AppState;
use utils::logging::init_logging;

/// Telegram assistant that answers questions and draws images with Gemini.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Log at DEBUG regardless of LOG_LEVEL.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> HandlerResult {
    dotenv().ok();
    let cli = Cli::parse();
    let config = Config::load()?;

    let level = if cli.debug {
        "debug"
    } else {
        config.log_level.as_str()
    };
    let _guards = init_logging(level, Path::new("logs"));
    info!("Starting Gemini Telegram bot");
    config.log_summary();

    let bot = Bot::new(config.bot_token.clone());
    let me = bot.get_me().await?;
    let username = me
        .user
        .username
        .clone()
        .ok_or("Bot account has no username")?;
    let identity = BotIdentity::new(me.user.id.0, username);
    info!("Bot is running as @{}", identity.username);

    if let Err(err) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {err}");
    }
    if config.drop_pending_updates {
        bot.delete_webhook().drop_pending_updates(true).await?;
        info!("Dropped pending updates");
    }

    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(
        config.session_ttl(),
        config.session_max_entries,
    ));
    let orchestrator = Orchestrator::new(
        Arc::new(TelegramGateway::new(bot.clone(), config.bot_token.clone())),
        Arc::new(GeminiClient::from_config(&config)),
        sessions.clone(),
        Arc::new(FilePersonaStore::new(config.persona_file_path.clone())),
        DispatchSettings {
            max_chunk_length: config.max_chunk_length,
            generation_timeout: config.generation_timeout(),
            temp_dir: config.image_temp_dir.clone(),
        },
    );
    let state = AppState::new(identity, sessions, orchestrator);

    let handler = Update::filter_message().endpoint(handle_message);

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build();

    let shutdown = dispatcher.shutdown_token();
    tokio::spawn(async move {
        wait_for_terminate().await;
        info!("Received SIGTERM, stopping dispatcher");
        if let Ok(stopped) = shutdown.shutdown() {
            stopped.await;
        }
    });

    dispatcher.dispatch().await;
    info!("Bot stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            terminate.recv().await;
        }
        Err(err) => {
            warn!("Failed to listen for SIGTERM: {err}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_terminate() {
    std::future::pending::<()>().await;
}
