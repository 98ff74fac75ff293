pub mod codec;
pub mod reading;

pub use codec::{GestureCodec, Token, BOUNDARY_READING, HELP_READING, SPACE_READING};
pub use reading::{Reading, ShapeError, SENSOR_COUNT};
