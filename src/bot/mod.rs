pub mod commands;

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::UpdateKind;
use tracing::{debug, error, info, warn};

use crate::config::TelegramConfig;
use crate::dialogue::DialogueEngine;
use crate::game::GameStore;

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct BotState {
    pub config: TelegramConfig,
    pub store: Arc<GameStore>,
    pub dialogue: Arc<DialogueEngine>,
}

/// Route one update to its handler. Shared by the polling dispatcher and
/// the webhook transport.
pub async fn dispatch_update(bot: Bot, update: Update, state: BotState) {
    match update.kind {
        UpdateKind::Message(msg) => {
            if let Err(e) = commands::handle_message(bot, msg, state).await {
                error!(err = %e, "message handler failed");
            }
        }
        UpdateKind::CallbackQuery(q) => {
            if let Err(e) = commands::handle_callback(bot, q, state).await {
                error!(err = %e, "callback handler failed");
            }
        }
        other => debug!(?other, "ignoring unhandled update kind"),
    }
}

/// Start the long-polling dispatcher in the background. Returns a
/// shutdown sender.
pub async fn start_polling(
    bot: Bot,
    state: BotState,
) -> crate::error::Result<tokio::sync::oneshot::Sender<()>> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        info!("telegram bot starting (long polling)");

        let mut shutdown_rx = shutdown_rx;
        loop {
            let handler = dptree::entry()
                .branch(Update::filter_message().endpoint(commands::handle_message))
                .branch(Update::filter_callback_query().endpoint(commands::handle_callback));

            let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
                .dependencies(dptree::deps![state.clone()])
                .default_handler(|upd| async move {
                    warn!("unhandled telegram update: {:?}", upd.kind);
                })
                .error_handler(LoggingErrorHandler::with_custom_text(
                    "telegram handler error",
                ))
                .build();

            tokio::select! {
                _ = dispatcher.dispatch() => {
                    error!("telegram dispatcher exited, restarting in 5 seconds...");
                }
                _ = &mut shutdown_rx => {
                    info!("telegram bot shutting down");
                    return;
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
            info!("restarting telegram dispatcher");
        }
    });

    Ok(shutdown_tx)
}
