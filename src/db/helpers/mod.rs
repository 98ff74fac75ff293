use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::db::models::InterpretationStatus;

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_status(value: &str) -> Result<InterpretationStatus> {
    match value {
        "Rendered" => Ok(InterpretationStatus::Rendered),
        "Empty" => Ok(InterpretationStatus::Empty),
        "Failed" => Ok(InterpretationStatus::Failed),
        other => Err(anyhow!("unknown interpretation status {other}")),
    }
}

pub fn to_limit(value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("limit {value} exceeds SQLite INTEGER range"))
}
