use crate::segment::{PosTag, SyntaxModel};
use std::sync::Arc;

// Fixed gate thresholds; behavioral parity depends on these exact values.
pub const MIN_TOKEN_COUNT: usize = 5;
pub const MIN_ALPHA_RATIO: f64 = 0.7;

pub trait MeaningfulnessStrategy: Send + Sync {
    fn is_meaningful(&self, text: &str) -> bool;
}

/// Model-backed gate: requires a noun, a verb, more than five tokens, and a
/// mostly-alphabetic character makeup.
pub struct SyntacticFilter {
    model: Arc<dyn SyntaxModel>,
}

impl SyntacticFilter {
    pub fn new(model: Arc<dyn SyntaxModel>) -> Self {
        Self { model }
    }
}

impl MeaningfulnessStrategy for SyntacticFilter {
    fn is_meaningful(&self, text: &str) -> bool {
        let tokens = self.model.tokens(text);
        if tokens.len() <= MIN_TOKEN_COUNT {
            return false;
        }
        if !tokens.iter().any(|token| token.tag == PosTag::Noun) {
            return false;
        }
        if !tokens.iter().any(|token| token.tag == PosTag::Verb) {
            return false;
        }

        let total = text.chars().count();
        if total == 0 {
            return false;
        }
        let alphabetic = text.chars().filter(|c| c.is_alphabetic()).count();
        alphabetic as f64 / total as f64 > MIN_ALPHA_RATIO
    }
}

/// Degraded gate used when no syntax model is available: more than five
/// whitespace-separated words and at least one purely alphabetic token.
pub struct WordCountFilter;

impl MeaningfulnessStrategy for WordCountFilter {
    fn is_meaningful(&self, text: &str) -> bool {
        let words: Vec<&str> = text.split_whitespace().collect();
        words.len() > MIN_TOKEN_COUNT
            && words
                .iter()
                .any(|word| word.chars().all(char::is_alphabetic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::TaggedToken;

    struct TaggingModel;

    impl SyntaxModel for TaggingModel {
        fn sentences(&self, text: &str) -> Vec<String> {
            vec![text.to_string()]
        }

        // Tags "pump" as a noun and "jumps" as a verb, everything else Other.
        fn tokens(&self, text: &str) -> Vec<TaggedToken> {
            text.split_whitespace()
                .map(|word| TaggedToken {
                    text: word.to_string(),
                    tag: match word {
                        "pump" => PosTag::Noun,
                        "jumps" => PosTag::Verb,
                        _ => PosTag::Other,
                    },
                })
                .collect()
        }
    }

    #[test]
    fn fallback_accepts_six_plain_words() {
        assert!(WordCountFilter.is_meaningful("The quick brown fox jumps over"));
    }

    #[test]
    fn fallback_rejects_short_text() {
        assert!(!WordCountFilter.is_meaningful("a b"));
        assert!(!WordCountFilter.is_meaningful(""));
    }

    #[test]
    fn fallback_requires_an_alphabetic_token() {
        assert!(!WordCountFilter.is_meaningful("1 2 3 4 5 6 7"));
        assert!(WordCountFilter.is_meaningful("1 2 3 4 5 6 seven"));
    }

    #[test]
    fn syntactic_requires_noun_verb_and_length() {
        let filter = SyntacticFilter::new(Arc::new(TaggingModel));

        assert!(filter.is_meaningful("the pump jumps over the fence today"));
        // No verb.
        assert!(!filter.is_meaningful("the pump sits near the fence today"));
        // Too few tokens.
        assert!(!filter.is_meaningful("pump jumps"));
    }

    #[test]
    fn syntactic_rejects_low_alphabetic_ratio() {
        let filter = SyntacticFilter::new(Arc::new(TaggingModel));
        assert!(!filter.is_meaningful("pump jumps 11 22 33 44 55 66 77 88"));
    }
}
