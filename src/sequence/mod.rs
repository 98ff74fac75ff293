pub mod commands;
pub mod controller;
pub mod state;

pub use controller::{
    Admission, IngestError, IngestOutcome, PendingSentence, PipelineController, StatusSnapshot,
};
pub use state::{BufferOutcome, BufferPolicy, BufferStatus, SequenceBuffer, SpaceOnlyPolicy};
