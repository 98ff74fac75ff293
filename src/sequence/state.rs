use serde::{Deserialize, Serialize};

use crate::gesture::{GestureCodec, Reading, BOUNDARY_READING, SPACE_READING};

pub const DEFAULT_MAX_SEQUENCE_LEN: usize = 64;

/// What a boundary does when everything since the last boundary was silence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SpaceOnlyPolicy {
    /// Drop the pauses and report `BoundaryIgnored`.
    Ignore,
    /// Flush them; the interpreter renders an empty sentence.
    Interpret,
}

impl Default for SpaceOnlyPolicy {
    fn default() -> Self {
        SpaceOnlyPolicy::Ignore
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BufferPolicy {
    pub max_sequence_len: usize,
    /// Append the boundary reading to the flushed sequence.
    pub include_boundary: bool,
    pub space_only: SpaceOnlyPolicy,
    /// Skip a reading identical to the last one appended.
    pub collapse_repeats: bool,
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self {
            max_sequence_len: DEFAULT_MAX_SEQUENCE_LEN,
            include_boundary: false,
            space_only: SpaceOnlyPolicy::Ignore,
            collapse_repeats: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BufferStatus {
    Idle,
    Accumulating,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferOutcome {
    Accepted {
        sequence_so_far: Vec<Reading>,
        duplicate: bool,
    },
    Flush {
        sequence: Vec<Reading>,
    },
    BoundaryIgnored,
    TooLong {
        max: usize,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferSnapshot {
    pub status: BufferStatus,
    pub latest: Reading,
    pub current: Vec<Reading>,
}

#[derive(Debug, Clone)]
pub struct SequenceBuffer {
    current: Vec<Reading>,
    latest: Reading,
    policy: BufferPolicy,
    codec: GestureCodec,
}

impl Default for SequenceBuffer {
    fn default() -> Self {
        Self::new(BufferPolicy::default())
    }
}

impl SequenceBuffer {
    pub fn new(policy: BufferPolicy) -> Self {
        Self {
            current: Vec::new(),
            latest: SPACE_READING,
            policy,
            codec: GestureCodec::new(),
        }
    }

    /// Seeds `latest` from a previously stored value without touching the sequence.
    pub fn restore_latest(&mut self, reading: Reading) {
        self.latest = reading;
    }

    pub fn status(&self) -> BufferStatus {
        if self.current.is_empty() {
            BufferStatus::Idle
        } else {
            BufferStatus::Accumulating
        }
    }

    pub fn latest(&self) -> Reading {
        self.latest
    }

    pub fn current(&self) -> &[Reading] {
        &self.current
    }

    pub fn policy(&self) -> &BufferPolicy {
        &self.policy
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        BufferSnapshot {
            status: self.status(),
            latest: self.latest,
            current: self.current.clone(),
        }
    }

    pub fn ingest(&mut self, reading: Reading) -> BufferOutcome {
        self.latest = reading;

        if self.codec.resolve(&reading).is_boundary() {
            self.close_sentence(reading)
        } else {
            self.append(reading)
        }
    }

    fn close_sentence(&mut self, boundary: Reading) -> BufferOutcome {
        if self.current.is_empty() {
            return BufferOutcome::BoundaryIgnored;
        }

        let mut sequence = std::mem::take(&mut self.current);

        let only_pauses = sequence.iter().all(|r| *r == SPACE_READING);
        if only_pauses && self.policy.space_only == SpaceOnlyPolicy::Ignore {
            return BufferOutcome::BoundaryIgnored;
        }

        if self.policy.include_boundary {
            debug_assert_eq!(boundary, BOUNDARY_READING);
            sequence.push(boundary);
        }

        BufferOutcome::Flush { sequence }
    }

    fn append(&mut self, reading: Reading) -> BufferOutcome {
        if self.policy.collapse_repeats && self.current.last() == Some(&reading) {
            return BufferOutcome::Accepted {
                sequence_so_far: self.current.clone(),
                duplicate: true,
            };
        }

        if self.current.len() >= self.policy.max_sequence_len {
            return BufferOutcome::TooLong {
                max: self.policy.max_sequence_len,
            };
        }

        self.current.push(reading);
        BufferOutcome::Accepted {
            sequence_so_far: self.current.clone(),
            duplicate: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::HELP_READING;

    const WHAT: Reading = Reading::new([true, false, false, false, false]);
    const GO: Reading = Reading::new([false, false, true, false, false]);

    #[test]
    fn starts_idle_with_all_false_latest() {
        let buffer = SequenceBuffer::default();
        assert_eq!(buffer.status(), BufferStatus::Idle);
        assert_eq!(buffer.latest(), SPACE_READING);
        assert!(buffer.current().is_empty());
    }

    #[test]
    fn word_then_boundary_flushes_without_marker() {
        let mut buffer = SequenceBuffer::default();
        assert_eq!(
            buffer.ingest(WHAT),
            BufferOutcome::Accepted {
                sequence_so_far: vec![WHAT],
                duplicate: false
            }
        );
        assert_eq!(buffer.status(), BufferStatus::Accumulating);

        assert_eq!(
            buffer.ingest(BOUNDARY_READING),
            BufferOutcome::Flush {
                sequence: vec![WHAT]
            }
        );
        assert_eq!(buffer.status(), BufferStatus::Idle);
        assert_eq!(buffer.latest(), BOUNDARY_READING);
    }

    #[test]
    fn boundary_on_empty_buffer_is_ignored() {
        let mut buffer = SequenceBuffer::default();
        assert_eq!(buffer.ingest(BOUNDARY_READING), BufferOutcome::BoundaryIgnored);
        assert_eq!(buffer.status(), BufferStatus::Idle);
    }

    #[test]
    fn consecutive_spaces_never_flush() {
        let mut buffer = SequenceBuffer::default();
        for n in 1..=10 {
            match buffer.ingest(SPACE_READING) {
                BufferOutcome::Accepted { sequence_so_far, .. } => {
                    assert_eq!(sequence_so_far.len(), n)
                }
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert_eq!(buffer.status(), BufferStatus::Accumulating);
    }

    #[test]
    fn boundary_always_returns_to_idle() {
        for len in 1..20 {
            let mut buffer = SequenceBuffer::default();
            for i in 0..len {
                buffer.ingest(if i % 3 == 0 { SPACE_READING } else { GO });
            }
            buffer.ingest(BOUNDARY_READING);
            assert_eq!(buffer.status(), BufferStatus::Idle, "len {len}");
            assert!(buffer.current().is_empty());
        }
    }

    #[test]
    fn space_only_sequence_follows_policy() {
        let mut ignoring = SequenceBuffer::default();
        ignoring.ingest(SPACE_READING);
        assert_eq!(ignoring.ingest(BOUNDARY_READING), BufferOutcome::BoundaryIgnored);
        assert_eq!(ignoring.status(), BufferStatus::Idle);

        let mut interpreting = SequenceBuffer::new(BufferPolicy {
            space_only: SpaceOnlyPolicy::Interpret,
            ..BufferPolicy::default()
        });
        interpreting.ingest(SPACE_READING);
        assert_eq!(
            interpreting.ingest(BOUNDARY_READING),
            BufferOutcome::Flush {
                sequence: vec![SPACE_READING]
            }
        );
    }

    #[test]
    fn include_boundary_appends_marker_to_flush_only() {
        let mut buffer = SequenceBuffer::new(BufferPolicy {
            include_boundary: true,
            ..BufferPolicy::default()
        });
        buffer.ingest(WHAT);
        assert_eq!(
            buffer.ingest(BOUNDARY_READING),
            BufferOutcome::Flush {
                sequence: vec![WHAT, BOUNDARY_READING]
            }
        );
        assert!(buffer.current().is_empty());
    }

    #[test]
    fn overflow_keeps_sequence_and_updates_latest() {
        let mut buffer = SequenceBuffer::new(BufferPolicy {
            max_sequence_len: 2,
            ..BufferPolicy::default()
        });
        buffer.ingest(WHAT);
        buffer.ingest(GO);
        assert_eq!(buffer.ingest(HELP_READING), BufferOutcome::TooLong { max: 2 });
        assert_eq!(buffer.current(), &[WHAT, GO]);
        assert_eq!(buffer.latest(), HELP_READING);

        assert_eq!(
            buffer.ingest(BOUNDARY_READING),
            BufferOutcome::Flush {
                sequence: vec![WHAT, GO]
            }
        );
    }

    #[test]
    fn repeats_are_kept_unless_collapsed() {
        let mut keeping = SequenceBuffer::default();
        keeping.ingest(WHAT);
        keeping.ingest(WHAT);
        assert_eq!(keeping.current().len(), 2);

        let mut collapsing = SequenceBuffer::new(BufferPolicy {
            collapse_repeats: true,
            ..BufferPolicy::default()
        });
        collapsing.ingest(WHAT);
        assert_eq!(
            collapsing.ingest(WHAT),
            BufferOutcome::Accepted {
                sequence_so_far: vec![WHAT],
                duplicate: true
            }
        );
        collapsing.ingest(GO);
        collapsing.ingest(WHAT);
        assert_eq!(collapsing.current(), &[WHAT, GO, WHAT]);
    }
}
