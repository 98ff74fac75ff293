pub mod interpretation;

pub use interpretation::{InterpretationRecord, InterpretationStatus};
