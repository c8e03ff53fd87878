/// How a chosen option leans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Mischief,
    Helpful,
    Neutral,
}

/// Classification function the store applies to every recorded choice.
/// A plain fn pointer so tests and future scoring schemes can swap it.
pub type Classifier = fn(&str) -> Alignment;

const MISCHIEF_WORDS: &[&str] = &["steal", "trick", "scare", "trash", "rat", "bite", "prank"];
const HELPFUL_WORDS: &[&str] = &["help", "save", "protect", "kind", "clean", "fix"];

/// Substring heuristic over a fixed English word list. Options are often
/// not English, so this is best-effort only; anything unmatched comes
/// back [`Alignment::Neutral`].
pub fn keyword_classifier(choice: &str) -> Alignment {
    let lc = choice.to_lowercase();
    if MISCHIEF_WORDS.iter().any(|w| lc.contains(w)) {
        Alignment::Mischief
    } else if HELPFUL_WORDS.iter().any(|w| lc.contains(w)) {
        Alignment::Helpful
    } else {
        Alignment::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mischief_keywords() {
        assert_eq!(keyword_classifier("Steal the conductor's whistle"), Alignment::Mischief);
        assert_eq!(keyword_classifier("Release the rat Lariska"), Alignment::Mischief);
        assert_eq!(keyword_classifier("prank the postman"), Alignment::Mischief);
    }

    #[test]
    fn helpful_keywords() {
        assert_eq!(keyword_classifier("Help Gena carry the bricks"), Alignment::Helpful);
        assert_eq!(keyword_classifier("Clean up the square"), Alignment::Helpful);
    }

    #[test]
    fn mischief_wins_over_helpful() {
        // Both lists match; the mischief list is checked first.
        assert_eq!(keyword_classifier("Trick them into helping"), Alignment::Mischief);
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(keyword_classifier("SCARE the pigeons"), Alignment::Mischief);
        assert_eq!(keyword_classifier("Be KIND for once"), Alignment::Helpful);
    }

    #[test]
    fn unmatched_text_is_neutral() {
        assert_eq!(keyword_classifier("Shrug and walk away"), Alignment::Neutral);
        assert_eq!(keyword_classifier("Подложить кнопку на стул"), Alignment::Neutral);
    }
}
