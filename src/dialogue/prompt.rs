/// How many recent choices are included in the prompt. Older history is
/// still kept by the game store, just not sent to the model.
pub const HISTORY_WINDOW: usize = 4;

const SYSTEM_PROMPT: &str = "\
You are writing dialogue options for Шапокляк, a mischievous old lady
from the Cheburashka universe. She is witty, sarcastic, and causes trouble.
Output exactly 3 short choices (max 80 chars each), numbered or bulleted.
Always include at least one very naughty option and one slightly helpful option.
Write nothing outside the list.";

/// A system/user instruction pair for the completion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Render the current scene and the recent choice history into a prompt.
/// Pure function of its inputs.
pub fn build_prompt(scene: &str, history: &[String]) -> Prompt {
    let mut user = format!("Scene: {scene}\nRecent history:\n");

    let start = history.len().saturating_sub(HISTORY_WINDOW);
    for entry in &history[start..] {
        user.push_str("- ");
        user.push_str(entry);
        user.push('\n');
    }

    user.push_str("\nWrite 3 new options for what Шапокляк might say or do next.");

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn scene_embedded_verbatim() {
        let p = build_prompt("City Square", &[]);
        assert!(p.user.starts_with("Scene: City Square\n"));
    }

    #[test]
    fn history_entries_are_bulleted() {
        let p = build_prompt("Park", &history(&["Steal a balloon", "Wave at Gena"]));
        assert!(p.user.contains("- Steal a balloon\n"));
        assert!(p.user.contains("- Wave at Gena\n"));
    }

    #[test]
    fn only_last_four_history_entries_used() {
        let p = build_prompt(
            "Park",
            &history(&["one", "two", "three", "four", "five", "six"]),
        );
        assert!(!p.user.contains("- one\n"));
        assert!(!p.user.contains("- two\n"));
        assert!(p.user.contains("- three\n"));
        assert!(p.user.contains("- four\n"));
        assert!(p.user.contains("- five\n"));
        assert!(p.user.contains("- six\n"));
    }

    #[test]
    fn empty_history_still_has_instruction() {
        let p = build_prompt("Park", &[]);
        assert!(p.user.contains("Write 3 new options"));
        assert!(p.user.contains("Recent history:"));
    }

    #[test]
    fn system_prompt_states_the_policy() {
        let p = build_prompt("Park", &[]);
        assert!(p.system.contains("exactly 3"));
        assert!(p.system.contains("80 chars"));
        assert!(p.system.contains("Шапокляк"));
    }

    #[test]
    fn deterministic_for_same_input() {
        let h = history(&["a", "b"]);
        assert_eq!(build_prompt("Park", &h), build_prompt("Park", &h));
    }
}
