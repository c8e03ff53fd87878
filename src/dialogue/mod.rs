pub mod client;
pub mod parse;
pub mod prompt;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;

pub use client::{CompletionBackend, GenerationError};
pub use parse::MAX_OPTIONS;

use client::OpenAiBackend;

// -- Sentinels ---------------------------------------------------------------

// Diagnostics are delivered through the same channel as real options: a
// single element wrapped in parentheses. Callers check `is_sentinel`
// instead of matching the text. The wrapping convention is a weak
// contract, kept for compatibility with the button-rendering layer.

const NO_CREDENTIAL_SENTINEL: &str =
    "(OPENAI_API_KEY is not set. Dialogue generation is disabled.)";
const AUTH_SENTINEL: &str = "(The AI service rejected our credentials.)";
const BUSY_SENTINEL: &str = "(AI is busy, try again in a moment.)";
const NO_OPTIONS_SENTINEL: &str = "(AI produced no options.)";

/// True when the result is a diagnostic message rather than a choice set.
pub fn is_sentinel(options: &[String]) -> bool {
    matches!(options, [only] if only.starts_with('(') && only.ends_with(')'))
}

fn sentinel_for(err: &GenerationError) -> String {
    match err {
        GenerationError::ConfigMissing => NO_CREDENTIAL_SENTINEL.to_string(),
        GenerationError::AuthFailed(_) => AUTH_SENTINEL.to_string(),
        GenerationError::Malformed(msg) => format!("({msg})"),
        retryable => {
            let msg = retryable.to_string();
            if msg.trim().is_empty() {
                BUSY_SENTINEL.to_string()
            } else {
                format!("({msg})")
            }
        }
    }
}

// -- Engine ------------------------------------------------------------------

/// The dialogue-option generation pipeline: prompt building, the retried
/// completion call, and option parsing behind one operation.
///
/// Credential and model configuration are read once at construction and
/// immutable afterwards; each call carries its own retry state, so one
/// engine is shared across all chats.
pub struct DialogueEngine {
    backend: Option<Arc<dyn CompletionBackend>>,
}

impl DialogueEngine {
    pub fn new(config: &Config) -> crate::error::Result<Self> {
        let backend = OpenAiBackend::from_config(config)?;
        if backend.is_none() {
            warn!("OPENAI_API_KEY not set, dialogue generation disabled");
        }
        Ok(Self {
            backend: backend.map(|b| Arc::new(b) as Arc<dyn CompletionBackend>),
        })
    }

    /// Engine wired to a specific backend. Used by tests.
    pub fn with_backend(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Engine with no credential configured.
    pub fn disabled() -> Self {
        Self { backend: None }
    }

    /// Generate up to three dialogue options for the current scene.
    ///
    /// Always returns 1..=3 strings. Every failure mode collapses into a
    /// single parenthesized diagnostic element (see [`is_sentinel`]);
    /// callers never see an error value.
    pub async fn generate_options(&self, scene: &str, history: &[String]) -> Vec<String> {
        let Some(backend) = &self.backend else {
            return vec![sentinel_for(&GenerationError::ConfigMissing)];
        };

        let prompt = prompt::build_prompt(scene, history);

        match client::complete_with_retry(backend.as_ref(), &prompt).await {
            Ok(text) => {
                let options = parse::parse_options(&text);
                if options.is_empty() {
                    warn!(%scene, "completion text had no usable lines");
                    return vec![NO_OPTIONS_SENTINEL.to_string()];
                }
                info!(%scene, count = options.len(), "dialogue options generated");
                options
            }
            Err(err) => {
                warn!(%scene, error = %err, "dialogue generation failed");
                vec![sentinel_for(&err)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::dialogue::prompt::Prompt;

    struct FixedBackend {
        calls: AtomicUsize,
        result: Result<String, GenerationError>,
    }

    impl FixedBackend {
        fn new(result: Result<String, GenerationError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                result,
            })
        }
    }

    #[async_trait]
    impl CompletionBackend for FixedBackend {
        async fn complete(&self, _prompt: &Prompt) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    #[tokio::test]
    async fn missing_credential_yields_sentinel_without_any_call() {
        let engine = DialogueEngine::disabled();
        let options = engine.generate_options("City Square", &[]).await;
        assert_eq!(options.len(), 1);
        assert!(is_sentinel(&options));
        assert!(options[0].contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn parsed_options_pass_through() {
        let backend = FixedBackend::new(Ok("1. A\n2. B\n3. C".to_string()));
        let engine = DialogueEngine::with_backend(backend.clone());
        let options = engine.generate_options("City Square", &[]).await;
        assert_eq!(options, vec!["A", "B", "C"]);
        assert!(!is_sentinel(&options));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn auth_failure_sentinel_is_distinct_from_busy() {
        let backend = FixedBackend::new(Err(GenerationError::AuthFailed("nope".into())));
        let engine = DialogueEngine::with_backend(backend.clone());
        let options = engine.generate_options("City Square", &[]).await;
        assert!(is_sentinel(&options));
        assert_eq!(options[0], AUTH_SENTINEL);
        assert_ne!(options[0], BUSY_SENTINEL);
        // non-retryable: one attempt only
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_completion_reports_empty_text() {
        let backend = FixedBackend::new(Ok(String::new()));
        let engine = DialogueEngine::with_backend(backend);
        let options = engine.generate_options("City Square", &[]).await;
        assert_eq!(options, vec!["(AI returned empty text.)"]);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_the_last_error() {
        let backend = FixedBackend::new(Err(GenerationError::RateLimited("quota".into())));
        let engine = DialogueEngine::with_backend(backend.clone());
        let options = engine.generate_options("City Square", &[]).await;
        assert!(is_sentinel(&options));
        assert_eq!(options[0], "(rate limited: quota)");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_error_message_falls_back_to_busy() {
        let backend = FixedBackend::new(Err(GenerationError::Transient(String::new())));
        let engine = DialogueEngine::with_backend(backend);
        let options = engine.generate_options("City Square", &[]).await;
        assert_eq!(options[0], BUSY_SENTINEL);
    }

    #[test]
    fn sentinel_detection() {
        assert!(is_sentinel(&["(anything)".to_string()]));
        assert!(!is_sentinel(&["plain option".to_string()]));
        assert!(!is_sentinel(&["(a)".to_string(), "(b)".to_string()]));
        assert!(!is_sentinel(&[]));
    }
}
