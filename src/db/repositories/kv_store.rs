use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::connection::Database;
use crate::gesture::Reading;

/// Key the current glove frame is mirrored under.
pub const LATEST_READING_KEY: &str = "sensorData";

impl Database {
    pub async fn kv_set(&self, key: &str, value: String) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to store key {key}"))?;
            Ok(())
        })
        .await
    }

    pub async fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to load key {key}"))
        })
        .await
    }

    pub async fn save_latest_reading(&self, reading: &Reading) -> Result<()> {
        let encoded =
            serde_json::to_string(reading).context("failed to serialize latest reading")?;
        self.kv_set(LATEST_READING_KEY, encoded).await
    }

    pub async fn load_latest_reading(&self) -> Result<Option<Reading>> {
        match self.kv_get(LATEST_READING_KEY).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .context("stored latest reading is malformed"),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn latest_reading_last_write_wins() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.load_latest_reading().await.unwrap(), None);

        let first = Reading::new([true, false, false, false, false]);
        let second = Reading::new([false, true, true, true, true]);
        db.save_latest_reading(&first).await.unwrap();
        db.save_latest_reading(&second).await.unwrap();

        assert_eq!(db.load_latest_reading().await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn malformed_value_is_reported() {
        let db = Database::in_memory().unwrap();
        db.kv_set(LATEST_READING_KEY, "[true]".into()).await.unwrap();
        assert!(db.load_latest_reading().await.is_err());
    }
}
