use teloxide::prelude::*;
use teloxide::types::{ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use tracing::{info, warn};

use crate::dialogue::is_sentinel;
use crate::game;

use super::BotState;

const INTRO: &str = "🎭 *Шапокляк’s Mischief Adventures* 🐀\n\n\
You are Шапокляк — witty, sarcastic, and troublesome.\n\
Type /next to begin causing (or preventing) trouble!";

const HELP: &str = "🎭 Шапокляк’s Mischief Adventures\n\n\
/start - Begin a fresh story\n\
/next - Get new dialogue options\n\
/status - Show the tally and current scene\n\
/end - See how the story ends\n\
/help - This message";

// ---------------------------------------------------------------------------
// Message handler (commands)
// ---------------------------------------------------------------------------

pub async fn handle_message(bot: Bot, msg: Message, state: BotState) -> ResponseResult<()> {
    let chat_id = msg.chat.id.0;

    // Authorization check
    if !state.config.allowed_chat_ids.is_empty()
        && !state.config.allowed_chat_ids.contains(&chat_id)
    {
        bot.send_message(msg.chat.id, "⛔ This chat is not allowed to play.")
            .await?;
        return Ok(());
    }

    let text = msg.text().unwrap_or("");
    info!(chat_id, text, "telegram message received");

    // Normalize command (strip arguments and @botname)
    let cmd = text.split_whitespace().next().unwrap_or("");
    let cmd = cmd.split('@').next().unwrap_or(cmd);

    match cmd {
        "/start" => start(&bot, &msg, &state).await,
        "/next" => next_scene(&bot, &msg, &state).await,
        "/status" => status(&bot, &msg, &state).await,
        "/end" => end(&bot, &msg, &state).await,
        _ => {
            bot.send_message(msg.chat.id, HELP).await?;
            Ok(())
        }
    }
}

/// Start a fresh story.
async fn start(bot: &Bot, msg: &Message, state: &BotState) -> ResponseResult<()> {
    state.store.reset(msg.chat.id.0).await;
    bot.send_message(msg.chat.id, INTRO)
        .parse_mode(ParseMode::Markdown)
        .await?;
    Ok(())
}

/// Ask the dialogue engine for options and show them as inline buttons.
async fn next_scene(bot: &Bot, msg: &Message, state: &BotState) -> ResponseResult<()> {
    let chat_id = msg.chat.id.0;

    // Generation can take a few seconds; show a typing indicator meanwhile.
    let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;

    let snapshot = state.store.snapshot(chat_id).await;
    let options = state
        .dialogue
        .generate_options(&snapshot.scene, &snapshot.history)
        .await;

    if is_sentinel(&options) {
        bot.send_message(msg.chat.id, options[0].clone()).await?;
        return Ok(());
    }

    let keyboard = option_keyboard(&options);
    state.store.set_pending(chat_id, options).await;

    bot.send_message(
        msg.chat.id,
        format!("📍 Scene: {}\nWhat will Шапокляк do?", snapshot.scene),
    )
    .reply_markup(keyboard)
    .await?;

    Ok(())
}

/// Show current stats.
async fn status(bot: &Bot, msg: &Message, state: &BotState) -> ResponseResult<()> {
    let s = state.store.snapshot(msg.chat.id.0).await;
    bot.send_message(
        msg.chat.id,
        format!(
            "📊 Mischief: {} | Helpful: {}\n📍 Scene: {}\n⏱ Playing since {}",
            s.mischief,
            s.helpful,
            s.scene,
            s.started_at.format("%H:%M UTC"),
        ),
    )
    .await?;
    Ok(())
}

/// Compute and send an ending based on the tally.
async fn end(bot: &Bot, msg: &Message, state: &BotState) -> ResponseResult<()> {
    let s = state.store.snapshot(msg.chat.id.0).await;
    bot.send_message(msg.chat.id, game::ending(&s))
        .parse_mode(ParseMode::Markdown)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Callback handler (button presses)
// ---------------------------------------------------------------------------

pub async fn handle_callback(bot: Bot, q: CallbackQuery, state: BotState) -> ResponseResult<()> {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(message) = q.message else {
        return Ok(());
    };
    let chat_id = message.chat().id;

    let Some(index) = q.data.as_deref().and_then(parse_option_callback) else {
        warn!(data = ?q.data, "unrecognized callback data");
        return Ok(());
    };

    let Some((choice, updated)) = state.store.record_choice(chat_id.0, index).await else {
        bot.send_message(chat_id, "That choice has expired. Type /next for fresh options.")
            .await?;
        return Ok(());
    };

    info!(chat_id = chat_id.0, %choice, "choice recorded");

    // Editing the message also drops the keyboard.
    bot.edit_message_text(
        chat_id,
        message.id(),
        format!(
            "👉 You chose: {choice}\n(Mischief: {} | Helpful: {})\n\nType /next for more mischief.",
            updated.mischief, updated.helpful,
        ),
    )
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Button rendering
// ---------------------------------------------------------------------------

/// One button per option. Callback data carries the option index, not the
/// text: Telegram caps callback data at 64 bytes and options can be up to
/// 80 characters of UTF-8.
pub(crate) fn option_keyboard(options: &[String]) -> InlineKeyboardMarkup {
    let rows = options
        .iter()
        .enumerate()
        .map(|(i, opt)| vec![InlineKeyboardButton::callback(opt.clone(), format!("opt:{i}"))])
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

pub(crate) fn parse_option_callback(data: &str) -> Option<usize> {
    data.strip_prefix("opt:")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_has_one_button_per_option_with_indexed_data() {
        let options = vec![
            "Steal a pie".to_string(),
            "Help the baker".to_string(),
            "Подложить кнопку".to_string(),
        ];
        let keyboard = option_keyboard(&options);
        assert_eq!(keyboard.inline_keyboard.len(), 3);
        for (i, row) in keyboard.inline_keyboard.iter().enumerate() {
            assert_eq!(row.len(), 1);
            assert_eq!(row[0].text, options[i]);
        }
    }

    #[test]
    fn callback_data_round_trips() {
        let options = vec!["a".to_string(), "b".to_string()];
        let keyboard = option_keyboard(&options);
        for (i, row) in keyboard.inline_keyboard.iter().enumerate() {
            let teloxide::types::InlineKeyboardButtonKind::CallbackData(data) = &row[0].kind
            else {
                panic!("expected callback button");
            };
            assert_eq!(parse_option_callback(data), Some(i));
        }
    }

    #[test]
    fn junk_callback_data_is_rejected() {
        assert_eq!(parse_option_callback("opt:2"), Some(2));
        assert_eq!(parse_option_callback("opt:"), None);
        assert_eq!(parse_option_callback("opt:notanumber"), None);
        assert_eq!(parse_option_callback("something-else"), None);
        assert_eq!(parse_option_callback(""), None);
    }
}
