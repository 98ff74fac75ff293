use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::{
    broadcast::BroadcastHub,
    db::{Database, InterpretationRecord, InterpretationStatus},
    gesture::{GestureCodec, Reading, ShapeError},
    interpret::{InterpretError, Interpretation, Interpreter},
};

use super::state::{BufferOutcome, BufferPolicy, BufferStatus, SequenceBuffer};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum IngestOutcome {
    Accepted {
        reading: Reading,
        sequence: Vec<Reading>,
        tokens: Vec<String>,
        duplicate: bool,
    },
    Boundary {
        reading: Reading,
        interpretation: Interpretation,
    },
    BoundaryIgnored {
        reading: Reading,
    },
}

impl IngestOutcome {
    /// The frame that should be forwarded to broadcast subscribers.
    pub fn reading(&self) -> Reading {
        match self {
            IngestOutcome::Accepted { reading, .. }
            | IngestOutcome::Boundary { reading, .. }
            | IngestOutcome::BoundaryIgnored { reading } => *reading,
        }
    }

    pub fn is_boundary(&self) -> bool {
        matches!(self, IngestOutcome::Boundary { .. })
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid reading: {0}")]
    InvalidShape(#[from] ShapeError),
    #[error("sequence already holds {max} readings; end the sentence first")]
    SequenceTooLong { max: usize, reading: Reading },
    #[error("text generation unavailable: {reason}")]
    UpstreamUnavailable {
        reason: String,
        raw_tokens: Vec<String>,
        sequence: Vec<Reading>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub sensor_data: Reading,
    pub status: BufferStatus,
    pub sequence: Vec<Reading>,
    pub preview: Vec<String>,
}

/// Result of the locked phase of an ingest.
pub enum Admission {
    Ready(IngestOutcome),
    /// A boundary closed a sentence; the buffer is already idle.
    Sentence(PendingSentence),
}

impl Admission {
    /// Renders a pending sentence in place.
    pub async fn complete(self) -> Result<IngestOutcome, IngestError> {
        match self {
            Admission::Ready(outcome) => Ok(outcome),
            Admission::Sentence(pending) => pending.finish().await,
        }
    }
}

/// A flushed sequence waiting for the text generator. Owns everything it needs,
/// so it can be rendered on a spawned task.
pub struct PendingSentence {
    controller: PipelineController,
    reading: Reading,
    sequence: Vec<Reading>,
}

impl PendingSentence {
    pub fn sequence(&self) -> &[Reading] {
        &self.sequence
    }

    pub async fn finish(self) -> Result<IngestOutcome, IngestError> {
        self.controller
            .finish_sentence(self.reading, self.sequence)
            .await
    }
}

/// Owns the single sequence buffer. Clones share the same buffer.
#[derive(Clone)]
pub struct PipelineController {
    buffer: Arc<Mutex<SequenceBuffer>>,
    interpreter: Arc<Interpreter>,
    db: Database,
    hub: BroadcastHub,
}

impl PipelineController {
    pub fn new(policy: BufferPolicy, interpreter: Interpreter, db: Database, hub: BroadcastHub) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(SequenceBuffer::new(policy))),
            interpreter: Arc::new(interpreter),
            db,
            hub,
        }
    }

    /// Seeds `latest` from the store so pollers see the last frame across restarts.
    pub async fn restore_latest(&self) -> Result<()> {
        let stored = self
            .db
            .load_latest_reading()
            .await
            .context("failed to restore latest reading")?;

        if let Some(reading) = stored {
            log_info!("Restored latest reading {}", reading.bits());
            self.buffer.lock().await.restore_latest(reading);
        }
        Ok(())
    }

    pub async fn ingest_value(&self, value: &Value) -> Result<IngestOutcome, IngestError> {
        self.admit_value(value).await?.complete().await
    }

    pub async fn ingest(&self, reading: Reading) -> Result<IngestOutcome, IngestError> {
        self.admit(reading).await?.complete().await
    }

    pub async fn admit_value(&self, value: &Value) -> Result<Admission, IngestError> {
        let reading = Reading::from_value(value).map_err(|err| {
            log_warn!("Rejected reading {value}: {err}");
            err
        })?;
        self.admit(reading).await
    }

    /// The ordered half of `ingest`: updates the buffer and publishes, but leaves
    /// any closed sentence for the caller to render.
    pub async fn admit(&self, reading: Reading) -> Result<Admission, IngestError> {
        let outcome = {
            let mut buffer = self.buffer.lock().await;
            let outcome = buffer.ingest(reading);
            // Published under the lock so the store and subscribers see buffer order.
            self.hub.publish(reading).await;
            outcome
        };

        let token = GestureCodec::new().resolve(&reading);
        if token.is_emergency() {
            log_warn!("Emergency gesture received");
        }

        match outcome {
            BufferOutcome::Accepted {
                sequence_so_far,
                duplicate,
            } => {
                log_debug!(
                    "Accepted {} ({}), {} readings buffered",
                    reading.bits(),
                    token.label(),
                    sequence_so_far.len()
                );
                Ok(Admission::Ready(IngestOutcome::Accepted {
                    reading,
                    tokens: self.interpreter.preview(&sequence_so_far),
                    sequence: sequence_so_far,
                    duplicate,
                }))
            }
            BufferOutcome::BoundaryIgnored => {
                log_debug!("Boundary with nothing to interpret");
                Ok(Admission::Ready(IngestOutcome::BoundaryIgnored { reading }))
            }
            BufferOutcome::TooLong { max } => {
                log_warn!("Sequence limit of {max} reached, dropped {}", reading.bits());
                Err(IngestError::SequenceTooLong { max, reading })
            }
            BufferOutcome::Flush { sequence } => Ok(Admission::Sentence(PendingSentence {
                controller: self.clone(),
                reading,
                sequence,
            })),
        }
    }

    async fn finish_sentence(
        &self,
        reading: Reading,
        sequence: Vec<Reading>,
    ) -> Result<IngestOutcome, IngestError> {
        log_info!("Sentence closed with {} readings", sequence.len());

        match self.interpreter.interpret(&sequence).await {
            Ok(interpretation) => {
                let status = if interpretation.is_empty() {
                    InterpretationStatus::Empty
                } else {
                    InterpretationStatus::Rendered
                };
                self.record(
                    status,
                    Some(interpretation.rendered_sentence.clone()),
                    interpretation.raw_tokens.clone(),
                    sequence,
                    None,
                )
                .await;

                log_info!(
                    "{} => \"{}\"",
                    interpretation.display_tokens(),
                    interpretation.rendered_sentence
                );
                Ok(IngestOutcome::Boundary {
                    reading,
                    interpretation,
                })
            }
            Err(InterpretError::UpstreamUnavailable { reason, raw_tokens }) => {
                self.record(
                    InterpretationStatus::Failed,
                    None,
                    raw_tokens.clone(),
                    sequence.clone(),
                    Some(reason.clone()),
                )
                .await;

                Err(IngestError::UpstreamUnavailable {
                    reason,
                    raw_tokens,
                    sequence,
                })
            }
        }
    }

    async fn record(
        &self,
        status: InterpretationStatus,
        rendered_sentence: Option<String>,
        raw_tokens: Vec<String>,
        readings: Vec<Reading>,
        error: Option<String>,
    ) {
        let record = InterpretationRecord {
            id: Uuid::new_v4().to_string(),
            status,
            rendered_sentence,
            raw_tokens,
            readings,
            error,
            created_at: Utc::now(),
        };

        if let Err(err) = self.db.insert_interpretation(&record).await {
            log_error!("Failed to record interpretation {}: {err:#}", record.id);
        }
    }

    /// Read-only view for pollers; never mutates the buffer.
    pub async fn status(&self) -> StatusSnapshot {
        let snapshot = self.buffer.lock().await.snapshot();
        StatusSnapshot {
            sensor_data: snapshot.latest,
            status: snapshot.status,
            preview: self.interpreter.preview(&snapshot.current),
            sequence: snapshot.current,
        }
    }

    pub async fn latest(&self) -> Reading {
        self.buffer.lock().await.latest()
    }

    pub async fn subscribe(&self) -> (Reading, broadcast::Receiver<Reading>) {
        self.hub.subscribe().await
    }

    pub async fn history(&self, limit: usize) -> Result<Vec<InterpretationRecord>> {
        self.db.recent_interpretations(limit).await
    }

    pub async fn failed_sentences(&self) -> Result<Vec<InterpretationRecord>> {
        self.db.failed_interpretations().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::{BOUNDARY_READING, SPACE_READING};
    use crate::interpret::TextGenerator;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    const WHAT: Reading = Reading::new([true, false, false, false, false]);

    struct Echo;

    #[async_trait]
    impl TextGenerator for Echo {
        async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
            let words = prompt.rsplit("Words: ").next().unwrap_or_default();
            Ok(format!("{words}?"))
        }
    }

    struct Down;

    #[async_trait]
    impl TextGenerator for Down {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            Err(anyhow!("503 from upstream"))
        }
    }

    fn controller(generator: Arc<dyn TextGenerator>, policy: BufferPolicy) -> PipelineController {
        let db = Database::in_memory().unwrap();
        let hub = BroadcastHub::new(db.clone(), 16);
        let interpreter = Interpreter::new(generator, Duration::from_secs(1));
        PipelineController::new(policy, interpreter, db, hub)
    }

    #[tokio::test]
    async fn invalid_shape_leaves_latest_alone() {
        let controller = controller(Arc::new(Echo), BufferPolicy::default());
        controller.ingest(WHAT).await.unwrap();

        let err = controller
            .ingest_value(&json!([true, false, false, false]))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidShape(ShapeError::WrongLength(4))));

        let status = controller.status().await;
        assert_eq!(status.sensor_data, WHAT);
        assert_eq!(status.sequence, vec![WHAT]);
    }

    #[tokio::test]
    async fn admitted_sentence_renders_after_later_frames() {
        let controller = controller(Arc::new(Echo), BufferPolicy::default());
        controller.ingest(WHAT).await.unwrap();

        let Admission::Sentence(pending) = controller.admit(BOUNDARY_READING).await.unwrap() else {
            panic!("boundary should close the sentence");
        };
        assert_eq!(pending.sequence(), &[WHAT]);

        let go = Reading::new([false, false, true, false, false]);
        controller.ingest(go).await.unwrap();
        assert_eq!(controller.status().await.sequence, vec![go]);

        match pending.finish().await.unwrap() {
            IngestOutcome::Boundary { interpretation, .. } => {
                assert_eq!(interpretation.raw_tokens, vec!["what"]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(controller.status().await.sequence, vec![go]);
    }

    #[tokio::test]
    async fn status_is_a_pure_peek() {
        let controller = controller(Arc::new(Echo), BufferPolicy::default());
        controller.ingest(WHAT).await.unwrap();
        controller.ingest(SPACE_READING).await.unwrap();

        let first = controller.status().await;
        let second = controller.status().await;
        assert_eq!(first.sequence, second.sequence);
        assert_eq!(first.preview, vec!["what"]);
        assert_eq!(first.status, BufferStatus::Accumulating);
    }

    #[tokio::test]
    async fn upstream_failure_is_recorded_and_buffer_is_idle() {
        let controller = controller(Arc::new(Down), BufferPolicy::default());
        controller.ingest(WHAT).await.unwrap();

        let err = controller.ingest(BOUNDARY_READING).await.unwrap_err();
        match err {
            IngestError::UpstreamUnavailable {
                raw_tokens,
                sequence,
                ..
            } => {
                assert_eq!(raw_tokens, vec!["what"]);
                assert_eq!(sequence, vec![WHAT]);
            }
            other => panic!("unexpected error {other:?}"),
        }

        assert_eq!(controller.status().await.status, BufferStatus::Idle);
        let failed = controller.failed_sentences().await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].readings, vec![WHAT]);
    }

    #[tokio::test]
    async fn restores_latest_from_store() {
        let db = Database::in_memory().unwrap();
        db.save_latest_reading(&WHAT).await.unwrap();

        let hub = BroadcastHub::new(db.clone(), 4);
        let interpreter = Interpreter::new(Arc::new(Echo), Duration::from_secs(1));
        let controller = PipelineController::new(BufferPolicy::default(), interpreter, db, hub);

        assert_eq!(controller.latest().await, Reading::default());
        controller.restore_latest().await.unwrap();
        assert_eq!(controller.latest().await, WHAT);
        assert_eq!(controller.status().await.status, BufferStatus::Idle);
    }

    #[tokio::test]
    async fn too_long_is_an_error_but_still_broadcast() {
        let controller = controller(
            Arc::new(Echo),
            BufferPolicy {
                max_sequence_len: 1,
                ..BufferPolicy::default()
            },
        );
        let (_, mut feed) = controller.subscribe().await;

        controller.ingest(WHAT).await.unwrap();
        let go = Reading::new([false, false, true, false, false]);
        let err = controller.ingest(go).await.unwrap_err();
        assert!(matches!(err, IngestError::SequenceTooLong { max: 1, .. }));

        assert_eq!(feed.recv().await.unwrap(), WHAT);
        assert_eq!(feed.recv().await.unwrap(), go);
        assert_eq!(controller.latest().await, go);
    }
}
