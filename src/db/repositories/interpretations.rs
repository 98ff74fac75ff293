use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_status, to_limit},
    models::{InterpretationRecord, InterpretationStatus},
};

const SELECT_COLUMNS: &str = "SELECT id, status, rendered_sentence, raw_tokens_json, readings_json, error, created_at
     FROM interpretations";

fn row_to_record(row: &Row) -> Result<InterpretationRecord> {
    let status: String = row.get("status")?;
    let raw_tokens_json: String = row.get("raw_tokens_json")?;
    let readings_json: String = row.get("readings_json")?;
    let created_at: String = row.get("created_at")?;

    Ok(InterpretationRecord {
        id: row.get("id")?,
        status: parse_status(&status)?,
        rendered_sentence: row.get("rendered_sentence")?,
        raw_tokens: serde_json::from_str(&raw_tokens_json).context("bad raw_tokens_json")?,
        readings: serde_json::from_str(&readings_json).context("bad readings_json")?,
        error: row.get("error")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    pub async fn insert_interpretation(&self, record: &InterpretationRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO interpretations (id, status, rendered_sentence, raw_tokens_json, readings_json, error, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.status.as_str(),
                    record.rendered_sentence,
                    serde_json::to_string(&record.raw_tokens)?,
                    serde_json::to_string(&record.readings)?,
                    record.error,
                    record.created_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert interpretation")?;
            Ok(())
        })
        .await
    }

    /// Newest first.
    pub async fn recent_interpretations(&self, limit: usize) -> Result<Vec<InterpretationRecord>> {
        let limit = to_limit(limit)?;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLUMNS} ORDER BY created_at DESC, rowid DESC LIMIT ?1"
            ))?;
            let mut rows = stmt.query(params![limit])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }
            Ok(records)
        })
        .await
    }

    /// Oldest first, so a manual replay keeps sentence order.
    pub async fn failed_interpretations(&self) -> Result<Vec<InterpretationRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLUMNS} WHERE status = ?1 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let mut rows = stmt.query(params![InterpretationStatus::Failed.as_str()])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }
            Ok(records)
        })
        .await
    }
}
