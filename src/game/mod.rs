pub mod score;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

pub use score::{Alignment, Classifier, keyword_classifier};

// -- Per-chat state ----------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ChatState {
    /// Current story location, embedded verbatim into prompts.
    pub scene: String,
    pub mischief: u32,
    pub helpful: u32,
    /// All recorded choices, oldest first. Prompting only reads the tail.
    pub history: Vec<String>,
    /// Option texts behind the currently displayed buttons. Callback data
    /// carries an index into this list.
    pub pending: Vec<String>,
    pub started_at: DateTime<Utc>,
}

impl ChatState {
    fn new(scene: &str) -> Self {
        Self {
            scene: scene.to_string(),
            mischief: 0,
            helpful: 0,
            history: Vec::new(),
            pending: Vec::new(),
            started_at: Utc::now(),
        }
    }

    fn apply(&mut self, alignment: Alignment) {
        match alignment {
            Alignment::Helpful => self.helpful += 1,
            // Neutral choices count as mischief to fit the theme.
            Alignment::Mischief | Alignment::Neutral => self.mischief += 1,
        }
    }
}

/// Ending line for the tally. Mischief and helpfulness are compared, ties
/// land on the anti-hero.
pub fn ending(state: &ChatState) -> &'static str {
    if state.mischief > state.helpful {
        "😈 Шапокляк becomes a *legendary villain*!"
    } else if state.helpful > state.mischief {
        "🌟 Against all odds, she becomes a *reluctant hero*."
    } else {
        "🌀 A perfect *trickster anti-hero* — feared and admired."
    }
}

// -- Store -------------------------------------------------------------------

/// Per-chat game state, keyed by Telegram chat id. State is created on
/// first access, replaced on restart, and lives for the process lifetime.
/// Handlers receive the store explicitly; there is no ambient state.
pub struct GameStore {
    start_scene: String,
    classifier: Classifier,
    chats: Mutex<HashMap<i64, ChatState>>,
}

impl GameStore {
    pub fn new(start_scene: &str) -> Self {
        Self::with_classifier(start_scene, keyword_classifier)
    }

    pub fn with_classifier(start_scene: &str, classifier: Classifier) -> Self {
        Self {
            start_scene: start_scene.to_string(),
            classifier,
            chats: Mutex::new(HashMap::new()),
        }
    }

    /// Current state for this chat (default-initialized if missing).
    pub async fn snapshot(&self, chat_id: i64) -> ChatState {
        let mut chats = self.chats.lock().await;
        chats
            .entry(chat_id)
            .or_insert_with(|| ChatState::new(&self.start_scene))
            .clone()
    }

    /// Begin a fresh story for this chat.
    pub async fn reset(&self, chat_id: i64) {
        debug!(chat_id, "resetting chat state");
        self.chats
            .lock()
            .await
            .insert(chat_id, ChatState::new(&self.start_scene));
    }

    /// Remember the options currently shown as buttons.
    pub async fn set_pending(&self, chat_id: i64, options: Vec<String>) {
        let mut chats = self.chats.lock().await;
        chats
            .entry(chat_id)
            .or_insert_with(|| ChatState::new(&self.start_scene))
            .pending = options;
    }

    /// Resolve a button index against the pending options and record the
    /// choice: append it to history and bump the tally. Returns the chosen
    /// text and the updated state, or `None` for a stale index.
    pub async fn record_choice(&self, chat_id: i64, index: usize) -> Option<(String, ChatState)> {
        let mut chats = self.chats.lock().await;
        let state = chats
            .entry(chat_id)
            .or_insert_with(|| ChatState::new(&self.start_scene));

        let choice = state.pending.get(index)?.clone();
        state.history.push(choice.clone());
        state.apply((self.classifier)(&choice));

        Some((choice, state.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> GameStore {
        GameStore::new("City Square")
    }

    #[tokio::test]
    async fn snapshot_creates_default_state() {
        let store = store();
        let s = store.snapshot(1).await;
        assert_eq!(s.scene, "City Square");
        assert_eq!(s.mischief, 0);
        assert_eq!(s.helpful, 0);
        assert!(s.history.is_empty());
        assert!(s.pending.is_empty());
    }

    #[tokio::test]
    async fn chats_are_independent() {
        let store = store();
        store.set_pending(1, vec!["Steal a pie".into()]).await;
        store.record_choice(1, 0).await.unwrap();
        let other = store.snapshot(2).await;
        assert_eq!(other.mischief, 0);
        assert!(other.history.is_empty());
    }

    #[tokio::test]
    async fn record_choice_updates_history_and_tally() {
        let store = store();
        store
            .set_pending(1, vec!["Steal a pie".into(), "Help the baker".into()])
            .await;

        let (choice, s) = store.record_choice(1, 0).await.unwrap();
        assert_eq!(choice, "Steal a pie");
        assert_eq!(s.mischief, 1);
        assert_eq!(s.helpful, 0);
        assert_eq!(s.history, vec!["Steal a pie"]);

        let (choice, s) = store.record_choice(1, 1).await.unwrap();
        assert_eq!(choice, "Help the baker");
        assert_eq!(s.helpful, 1);
        assert_eq!(s.history.len(), 2);
    }

    #[tokio::test]
    async fn neutral_choices_count_as_mischief() {
        let store = store();
        store.set_pending(1, vec!["Shrug and walk away".into()]).await;
        let (_, s) = store.record_choice(1, 0).await.unwrap();
        assert_eq!(s.mischief, 1);
        assert_eq!(s.helpful, 0);
    }

    #[tokio::test]
    async fn stale_index_is_rejected() {
        let store = store();
        store.set_pending(1, vec!["only one".into()]).await;
        assert!(store.record_choice(1, 5).await.is_none());
        // nothing was recorded
        assert!(store.snapshot(1).await.history.is_empty());
    }

    #[tokio::test]
    async fn reset_starts_over() {
        let store = store();
        store.set_pending(1, vec!["Steal a pie".into()]).await;
        store.record_choice(1, 0).await.unwrap();

        store.reset(1).await;
        let s = store.snapshot(1).await;
        assert_eq!(s.mischief, 0);
        assert!(s.history.is_empty());
        assert!(s.pending.is_empty());
    }

    #[tokio::test]
    async fn swapped_classifier_is_honored() {
        fn always_helpful(_: &str) -> Alignment {
            Alignment::Helpful
        }
        let store = GameStore::with_classifier("City Square", always_helpful);
        store.set_pending(1, vec!["Steal a pie".into()]).await;
        let (_, s) = store.record_choice(1, 0).await.unwrap();
        assert_eq!(s.helpful, 1);
        assert_eq!(s.mischief, 0);
    }

    #[test]
    fn ending_lines() {
        let mut s = ChatState::new("City Square");
        s.mischief = 3;
        s.helpful = 1;
        assert!(ending(&s).contains("legendary villain"));

        s.mischief = 1;
        s.helpful = 3;
        assert!(ending(&s).contains("reluctant hero"));

        s.mischief = 2;
        s.helpful = 2;
        assert!(ending(&s).contains("trickster anti-hero"));
    }
}
