//! One row per flushed sequence, kept so failed sentences can be replayed by hand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gesture::Reading;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum InterpretationStatus {
    Rendered,
    /// Nothing but pauses; the generator was never called.
    Empty,
    Failed,
}

impl InterpretationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterpretationStatus::Rendered => "Rendered",
            InterpretationStatus::Empty => "Empty",
            InterpretationStatus::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretationRecord {
    pub id: String,
    pub status: InterpretationStatus,
    pub rendered_sentence: Option<String>,
    pub raw_tokens: Vec<String>,
    pub readings: Vec<Reading>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}
