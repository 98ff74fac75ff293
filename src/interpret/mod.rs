pub mod generator;
pub mod interpreter;

pub use generator::{AnthropicGenerator, TextGenerator};
pub use interpreter::{Interpretation, InterpretError, Interpreter};
