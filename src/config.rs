use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{BotError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Name reported by the webhook health endpoint.
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    /// Scene every fresh story starts in.
    #[serde(default = "default_start_scene")]
    pub start_scene: String,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

// -- LLM -----------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// API key for the OpenAI-compatible completion service.
    /// Usually left empty here and provided via the `OPENAI_API_KEY`
    /// env var. When neither is set, dialogue generation answers with a
    /// diagnostic message instead of options.
    #[serde(default)]
    pub api_key: String,

    /// Model id (e.g. "o4-mini", "gpt-4o-mini").
    /// Can be overridden with the `DIALOGUE_MODEL` env var.
    #[serde(default)]
    pub model: String,

    /// API base URL (default: "https://api.openai.com/v1").
    /// Can be overridden with the `OPENAI_BASE_URL` env var.
    #[serde(default)]
    pub base_url: String,

    /// Completion length cap, in tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Sampling temperature. Creative but controlled.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// -- Telegram ------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Update transport: "polling" (default) or "webhook".
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Chat ids allowed to play. Empty means everyone.
    #[serde(default)]
    pub allowed_chat_ids: Vec<i64>,
}

// -- Webhook server ------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Webhook listener bind address.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Public base URL for webhook mode, e.g. "https://bot.example.com".
    /// Can be overridden with `WEBHOOK_BASE` or `RENDER_EXTERNAL_URL`.
    #[serde(default)]
    pub webhook_base: String,

    /// Secret path segment for the webhook route.
    /// Can be overridden with `WEBHOOK_SECRET`.
    #[serde(default)]
    pub webhook_secret: String,
}

impl ServerConfig {
    /// Public base URL, env over config. Hosting platforms advertise the
    /// external URL as `RENDER_EXTERNAL_URL`, so it is checked first.
    pub fn resolved_webhook_base(&self) -> Option<String> {
        std::env::var("RENDER_EXTERNAL_URL")
            .ok()
            .or_else(|| std::env::var("WEBHOOK_BASE").ok())
            .or_else(|| {
                if self.webhook_base.is_empty() {
                    None
                } else {
                    Some(self.webhook_base.clone())
                }
            })
    }

    pub fn resolved_webhook_secret(&self) -> Option<String> {
        std::env::var("WEBHOOK_SECRET").ok().or_else(|| {
            if self.webhook_secret.is_empty() {
                None
            } else {
                Some(self.webhook_secret.clone())
            }
        })
    }

    /// Bind address with the `PORT` env var substituted into the port part.
    pub fn resolved_bind(&self) -> String {
        let port = std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok());
        bind_with_port(&self.bind, port)
    }
}

/// Replace the port part of `bind` when a platform-provided port is given.
fn bind_with_port(bind: &str, port: Option<u16>) -> String {
    match port {
        Some(port) => {
            let host = bind.rsplit_once(':').map(|(h, _)| h).unwrap_or("0.0.0.0");
            format!("{host}:{port}")
        }
        None => bind.to_string(),
    }
}

// -- Defaults ------------------------------------------------------------

fn default_bot_name() -> String {
    "Shapoklyak Mischief Adventures".to_string()
}
fn default_start_scene() -> String {
    "City Square".to_string()
}
fn default_max_tokens() -> usize {
    250
}
fn default_temperature() -> f32 {
    0.8
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_mode() -> String {
    "polling".to_string()
}
fn default_bind() -> String {
    "0.0.0.0:10000".to_string()
}

// -- Default impls -------------------------------------------------------

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: String::new(),
            base_url: String::new(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            allowed_chat_ids: Vec::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            webhook_base: String::new(),
            webhook_secret: String::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            start_scene: default_start_scene(),
            llm: LlmConfig::default(),
            telegram: TelegramConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

// -- Config impl ---------------------------------------------------------

impl Config {
    /// Load config from the given path, or the default XDG config location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path(),
        };

        let config = if config_path.exists() {
            info!("loading config from {}", config_path.display());
            let contents = std::fs::read_to_string(&config_path).map_err(BotError::Io)?;
            toml::from_str(&contents)
                .map_err(|e| BotError::Config(format!("parse error: {e}")))?
        } else {
            info!("no config file found, using defaults");
            Config::default()
        };

        Ok(config)
    }

    /// Returns the default config file path: `$XDG_CONFIG_HOME/shapoklyak-bot/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("shapoklyak-bot")
            .join("config.toml")
    }

    /// Get the Telegram bot token from the environment.
    pub fn telegram_bot_token() -> Result<String> {
        std::env::var("TG_BOT_TOKEN")
            .map_err(|_| BotError::Config("TG_BOT_TOKEN environment variable not set".into()))
    }

    /// Generate the default config file contents.
    pub fn default_config_contents() -> &'static str {
        include_str!("../config.example.toml")
    }
}
