use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Telegram error: {0}")]
    Telegram(String),
}

pub type Result<T> = std::result::Result<T, BotError>;
