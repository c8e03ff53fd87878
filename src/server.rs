use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use teloxide::prelude::*;
use teloxide::types::Update;
use tracing::{info, warn};

use crate::bot::{self, BotState};
use crate::error::{BotError, Result};

/// Shared state accessible by webhook handlers.
#[derive(Clone)]
pub struct AppState {
    pub bot: Bot,
    pub bot_state: BotState,
    pub bot_name: String,
    pub webhook_secret: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/webhook/{secret}", post(webhook))
        .with_state(state)
}

/// Register `<base>/webhook/<secret>` with Telegram so updates are pushed
/// to us instead of long-polled.
pub async fn register_webhook(bot: &Bot, base: &str, secret: &str) -> Result<()> {
    let url = webhook_url(base, secret);
    info!(%url, "setting telegram webhook");

    let url: reqwest::Url = url
        .parse()
        .map_err(|e| BotError::Config(format!("invalid webhook url: {e}")))?;

    bot.set_webhook(url)
        .await
        .map_err(|e| BotError::Telegram(format!("set_webhook failed: {e}")))?;

    Ok(())
}

/// Serve the webhook listener until the process is stopped.
pub async fn serve(state: AppState, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| BotError::Config(format!("failed to bind {bind}: {e}")))?;

    info!(bind = %bind, "webhook server listening");

    axum::serve(listener, router(state))
        .await
        .map_err(|e| BotError::Config(format!("webhook server error: {e}")))?;

    Ok(())
}

// ---------------------------------------------------------------------------
// GET /
// ---------------------------------------------------------------------------

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "bot": state.bot_name }))
}

// ---------------------------------------------------------------------------
// POST /webhook/{secret}
// ---------------------------------------------------------------------------

async fn webhook(
    State(state): State<AppState>,
    Path(secret): Path<String>,
    Json(update): Json<Update>,
) -> (StatusCode, Json<Value>) {
    if !secret_ok(&state.webhook_secret, &secret) {
        warn!("webhook called with a bad secret");
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "ok": false, "error": "forbidden" })),
        );
    }

    // Answer Telegram immediately; the handler may spend seconds on
    // generation and Telegram redelivers updates that take too long.
    let bot = state.bot.clone();
    let bot_state = state.bot_state.clone();
    tokio::spawn(async move {
        bot::dispatch_update(bot, update, bot_state).await;
    });

    (StatusCode::OK, Json(json!({ "ok": true })))
}

/// An unset secret rejects everything; a configured one must match exactly.
fn secret_ok(expected: &str, got: &str) -> bool {
    !expected.is_empty() && expected == got
}

pub(crate) fn webhook_url(base: &str, secret: &str) -> String {
    format!("{}/webhook/{}", base.trim_end_matches('/'), secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_must_match() {
        assert!(secret_ok("hunter2", "hunter2"));
        assert!(!secret_ok("hunter2", "hunter3"));
        assert!(!secret_ok("hunter2", ""));
    }

    #[test]
    fn empty_expected_secret_rejects_all() {
        assert!(!secret_ok("", ""));
        assert!(!secret_ok("", "anything"));
    }

    #[test]
    fn webhook_url_strips_trailing_slash() {
        assert_eq!(
            webhook_url("https://bot.example.com/", "s3cret"),
            "https://bot.example.com/webhook/s3cret"
        );
        assert_eq!(
            webhook_url("https://bot.example.com", "s3cret"),
            "https://bot.example.com/webhook/s3cret"
        );
    }
}
