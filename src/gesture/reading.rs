use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

/// Number of flex sensors on the glove (thumb, index, middle, ring, pinky).
pub const SENSOR_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("reading must be an array of booleans")]
    NotAnArray,
    #[error("reading must have exactly 5 elements, got {0}")]
    WrongLength(usize),
    #[error("reading element {index} is not a boolean")]
    NotBoolean { index: usize },
}

/// One frame of finger-flex states as sent by the glove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Reading([bool; SENSOR_COUNT]);

impl Reading {
    pub const fn new(flags: [bool; SENSOR_COUNT]) -> Self {
        Self(flags)
    }

    pub fn flags(&self) -> [bool; SENSOR_COUNT] {
        self.0
    }

    /// Validates an untyped payload coming off the wire.
    pub fn from_value(value: &Value) -> Result<Self, ShapeError> {
        let items = value.as_array().ok_or(ShapeError::NotAnArray)?;
        if items.len() != SENSOR_COUNT {
            return Err(ShapeError::WrongLength(items.len()));
        }

        let mut flags = [false; SENSOR_COUNT];
        for (index, item) in items.iter().enumerate() {
            flags[index] = item.as_bool().ok_or(ShapeError::NotBoolean { index })?;
        }
        Ok(Self(flags))
    }

    /// Compact `10000` style rendering used in logs.
    pub fn bits(&self) -> String {
        self.0.iter().map(|flag| if *flag { '1' } else { '0' }).collect()
    }
}

impl TryFrom<&[bool]> for Reading {
    type Error = ShapeError;

    fn try_from(flags: &[bool]) -> Result<Self, Self::Error> {
        let flags: [bool; SENSOR_COUNT] = flags
            .try_into()
            .map_err(|_| ShapeError::WrongLength(flags.len()))?;
        Ok(Self(flags))
    }
}

impl From<[bool; SENSOR_COUNT]> for Reading {
    fn from(flags: [bool; SENSOR_COUNT]) -> Self {
        Self(flags)
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Reading {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let flags = Vec::<bool>::deserialize(deserializer)?;
        Reading::try_from(flags.as_slice()).map_err(serde::de::Error::custom)
    }
}
