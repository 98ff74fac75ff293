use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gesture::{GestureCodec, Reading, Token};

use super::generator::TextGenerator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interpretation {
    pub rendered_sentence: String,
    pub raw_tokens: Vec<String>,
}

impl Interpretation {
    pub fn empty() -> Self {
        Self {
            rendered_sentence: String::new(),
            raw_tokens: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.raw_tokens.is_empty()
    }

    /// `Gestures: what → go → now`
    pub fn display_tokens(&self) -> String {
        format!("Gestures: {}", self.raw_tokens.join(" → "))
    }
}

#[derive(Debug, Error)]
pub enum InterpretError {
    #[error("text generation unavailable: {reason}")]
    UpstreamUnavailable {
        reason: String,
        raw_tokens: Vec<String>,
    },
}

impl InterpretError {
    pub fn raw_tokens(&self) -> &[String] {
        match self {
            InterpretError::UpstreamUnavailable { raw_tokens, .. } => raw_tokens,
        }
    }
}

pub struct Interpreter {
    codec: GestureCodec,
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl Interpreter {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self {
            codec: GestureCodec::new(),
            generator,
            timeout,
        }
    }

    /// Post-filter token labels; never calls the generator.
    pub fn preview(&self, sequence: &[Reading]) -> Vec<String> {
        sequence
            .iter()
            .map(|reading| {
                let token = self.codec.resolve(reading);
                if token == Token::Unknown {
                    debug!("unmapped gesture {}", reading.bits());
                }
                token
            })
            .filter(|token| !token.is_inert())
            .map(|token| token.label().to_string())
            .collect()
    }

    pub async fn interpret(&self, sequence: &[Reading]) -> Result<Interpretation, InterpretError> {
        let raw_tokens = self.preview(sequence);
        if raw_tokens.is_empty() {
            return Ok(Interpretation::empty());
        }

        let prompt = build_prompt(&raw_tokens);

        let reply = match tokio::time::timeout(self.timeout, self.generator.complete(&prompt)).await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => {
                warn!("text generation failed for [{}]: {err:#}", raw_tokens.join(" "));
                return Err(InterpretError::UpstreamUnavailable {
                    reason: format!("{err:#}"),
                    raw_tokens,
                });
            }
            Err(_) => {
                warn!(
                    "text generation timeout (> {}ms) for [{}]",
                    self.timeout.as_millis(),
                    raw_tokens.join(" ")
                );
                return Err(InterpretError::UpstreamUnavailable {
                    reason: format!("timed out after {}ms", self.timeout.as_millis()),
                    raw_tokens,
                });
            }
        };

        Ok(Interpretation {
            rendered_sentence: clean_reply(&reply),
            raw_tokens,
        })
    }
}

pub fn build_prompt(tokens: &[String]) -> String {
    format!(
        "Convert this sequence of words into one natural, grammatically correct sentence. \
Add articles, prepositions, and verb conjugations as needed. \
Reply with exactly one sentence and no extra commentary.\n\nWords: {}",
        tokens.join(" ")
    )
}

fn clean_reply(reply: &str) -> String {
    let trimmed = reply.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}
