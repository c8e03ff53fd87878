mod bot;
mod config;
mod dialogue;
mod error;
mod game;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use teloxide::Bot;
use tracing::{error, info};

use crate::config::Config;

#[tokio::main]
async fn main() {
    // Load .env file (if present) before anything reads env vars
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    if args.iter().any(|a| a == "--default-config") {
        print!("{}", Config::default_config_contents());
        return;
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load config
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    let config = match Config::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to load config: {e}");
            return;
        }
    };

    info!(
        bot_name = %config.bot_name,
        start_scene = %config.start_scene,
        mode = %config.telegram.mode,
        "shapoklyak-bot starting"
    );

    let token = match Config::telegram_bot_token() {
        Ok(t) => t,
        Err(e) => {
            error!("{e}");
            return;
        }
    };
    let bot = Bot::new(token);

    // The dialogue engine degrades to diagnostic replies when no API key
    // is configured, so startup continues either way.
    let dialogue = match dialogue::DialogueEngine::new(&config) {
        Ok(d) => Arc::new(d),
        Err(e) => {
            error!("failed to initialize dialogue engine: {e}");
            return;
        }
    };

    let store = Arc::new(game::GameStore::new(&config.start_scene));

    let bot_state = bot::BotState {
        config: config.telegram.clone(),
        store,
        dialogue,
    };

    match config.telegram.mode.as_str() {
        "webhook" => run_webhook(bot, bot_state, &config).await,
        "polling" => run_polling(bot, bot_state).await,
        other => {
            error!("unknown telegram mode \"{other}\" (expected \"polling\" or \"webhook\")");
        }
    }
}

async fn run_polling(bot: Bot, bot_state: bot::BotState) {
    let _shutdown = match bot::start_polling(bot, bot_state).await {
        Ok(tx) => tx,
        Err(e) => {
            error!("failed to start telegram bot: {e}");
            return;
        }
    };

    info!("shapoklyak-bot is running — press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl+c");
    info!("shutdown signal received, stopping...");
}

async fn run_webhook(bot: Bot, bot_state: bot::BotState, config: &Config) {
    let Some(base) = config.server.resolved_webhook_base() else {
        error!(
            "webhook mode needs a public base URL: set WEBHOOK_BASE or \
             RENDER_EXTERNAL_URL, or [server] webhook_base in the config"
        );
        return;
    };
    let Some(secret) = config.server.resolved_webhook_secret() else {
        error!(
            "webhook mode needs a secret: set WEBHOOK_SECRET, or \
             [server] webhook_secret in the config"
        );
        return;
    };

    if let Err(e) = server::register_webhook(&bot, &base, &secret).await {
        error!("failed to set telegram webhook: {e}");
        return;
    }

    let state = server::AppState {
        bot,
        bot_state,
        bot_name: config.bot_name.clone(),
        webhook_secret: secret,
    };
    let bind = config.server.resolved_bind();

    info!("shapoklyak-bot is running — press Ctrl+C to stop");

    tokio::select! {
        res = server::serve(state, &bind) => {
            if let Err(e) = res {
                error!("webhook server error: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, stopping...");
        }
    }
}

fn print_usage() {
    println!(
        "shapoklyak-bot — Шапокляк's mischief adventures on Telegram

USAGE:
    shapoklyak-bot [OPTIONS]

OPTIONS:
    --config <PATH>     Path to config file (default: ~/.config/shapoklyak-bot/config.toml)
    --default-config    Print default config to stdout and exit
    -h, --help          Print this help message

ENVIRONMENT:
    TG_BOT_TOKEN          Required. Telegram bot token.
    OPENAI_API_KEY        API key for dialogue generation. When unset the
                          bot replies with a diagnostic instead of options.
    DIALOGUE_MODEL        Model id (default: o4-mini).
    OPENAI_BASE_URL       OpenAI-compatible API base URL.
    WEBHOOK_BASE          Public base URL (webhook mode). RENDER_EXTERNAL_URL
                          is honored as well.
    WEBHOOK_SECRET        Secret path segment for the webhook route.
    PORT                  Overrides the listen port (webhook mode).
    RUST_LOG              Optional. Tracing filter (default: info).
"
    );
}
