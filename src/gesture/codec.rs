//! Gesture table for the glove.
//!
//! Flags are ordered thumb, index, middle, ring, pinky. The table is closed: any
//! vector not listed here resolves to [`Token::Unknown`] instead of failing, so a
//! single noisy frame never aborts a sentence.

use super::reading::Reading;

const F: bool = false;
const T: bool = true;

/// No fingers flexed. Separates words and never reaches the rendered sentence.
pub const SPACE_READING: Reading = Reading::new([F, F, F, F, F]);

/// Thumb open, four fingers flexed. Closes the sentence in progress.
pub const BOUNDARY_READING: Reading = Reading::new([F, T, T, T, T]);

/// Closed fist. Reserved for the emergency word.
pub const HELP_READING: Reading = Reading::new([T, T, T, T, T]);

pub const SPACE_LABEL: &str = "space";
pub const BOUNDARY_LABEL: &str = "end-of-sentence";
pub const UNKNOWN_LABEL: &str = "unknown";
pub const HELP_WORD: &str = "help";

const WORDS: &[([bool; 5], &str)] = &[
    ([T, F, F, F, F], "what"),
    ([F, T, F, F, F], "you"),
    ([F, F, T, F, F], "go"),
    ([F, F, F, T, F], "now"),
    ([F, F, F, F, T], "I"),
    ([T, T, F, F, F], "where"),
    ([F, T, T, F, F], "want"),
    ([F, F, T, T, F], "eat"),
    ([F, F, F, T, T], "drink"),
    ([T, F, F, F, T], "yes"),
    ([T, F, F, T, F], "no"),
    ([T, F, T, F, F], "need"),
    ([T, T, T, F, F], "home"),
    ([F, T, T, T, F], "water"),
    ([F, F, T, T, T], "please"),
    ([T, T, T, T, F], "thanks"),
    ([T, F, F, T, T], "bathroom"),
    ([F, T, F, T, F], "friend"),
    ([T, F, T, T, F], "when"),
    ([T, T, F, F, T], "love"),
    ([F, T, F, F, T], "sorry"),
    ([F, F, T, F, T], "stop"),
    ([T, T, T, T, T], HELP_WORD),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Word(&'static str),
    Space,
    EndOfSentence,
    Unknown,
}

impl Token {
    pub fn label(&self) -> &'static str {
        match self {
            Token::Word(word) => *word,
            Token::Space => SPACE_LABEL,
            Token::EndOfSentence => BOUNDARY_LABEL,
            Token::Unknown => UNKNOWN_LABEL,
        }
    }

    /// Tokens that carry structure rather than meaning.
    pub fn is_inert(&self) -> bool {
        matches!(self, Token::Space | Token::EndOfSentence)
    }

    pub fn is_boundary(&self) -> bool {
        matches!(self, Token::EndOfSentence)
    }

    pub fn is_emergency(&self) -> bool {
        matches!(self, Token::Word(HELP_WORD))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GestureCodec;

impl GestureCodec {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, reading: &Reading) -> Token {
        if *reading == SPACE_READING {
            return Token::Space;
        }
        if *reading == BOUNDARY_READING {
            return Token::EndOfSentence;
        }

        let flags = reading.flags();
        WORDS
            .iter()
            .find(|(key, _)| *key == flags)
            .map(|(_, word)| Token::Word(*word))
            .unwrap_or(Token::Unknown)
    }

    /// Reverse lookup. Control labels map back to their reserved vectors.
    pub fn encode(&self, label: &str) -> Option<Reading> {
        match label {
            SPACE_LABEL => Some(SPACE_READING),
            BOUNDARY_LABEL => Some(BOUNDARY_READING),
            _ => WORDS
                .iter()
                .find(|(_, word)| *word == label)
                .map(|(key, _)| Reading::new(*key)),
        }
    }

    pub fn vocabulary(&self) -> impl Iterator<Item = (Reading, &'static str)> {
        WORDS.iter().map(|(key, word)| (Reading::new(*key), *word))
    }
}
