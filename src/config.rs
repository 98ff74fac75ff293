use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::sequence::BufferPolicy;

const DEFAULT_CONFIG_FILE: &str = "glove.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    /// Deadline for one sentence, in milliseconds.
    pub timeout_ms: u64,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1/messages".into(),
            model: "claude-3-5-haiku-latest".into(),
            max_tokens: 128,
            timeout_ms: 10_000,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("glove.sqlite3"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BroadcastConfig {
    pub capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub buffer: BufferPolicy,
    pub generator: GeneratorConfig,
    pub storage: StorageConfig,
    pub broadcast: BroadcastConfig,
}

impl AppConfig {
    /// `GLOVE_CONFIG` if set, else `glove.json` when present, else defaults.
    /// Environment overrides are applied last.
    pub fn load() -> Result<Self> {
        let mut config = match env::var_os("GLOVE_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("GLOVE_DB_PATH") {
            self.storage.db_path = PathBuf::from(path);
        }
        if let Some(max) = lookup("GLOVE_MAX_SEQUENCE") {
            self.buffer.max_sequence_len = max
                .parse()
                .with_context(|| format!("GLOVE_MAX_SEQUENCE is not a number: {max}"))?;
        }
        if let Some(model) = lookup("GLOVE_MODEL") {
            self.generator.model = model;
        }
        if let Some(key) = lookup("ANTHROPIC_API_KEY").filter(|key| !key.is_empty()) {
            self.generator.api_key = Some(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::SpaceOnlyPolicy;
    use std::collections::HashMap;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "buffer": { "maxSequenceLen": 8, "spaceOnly": "interpret" } }"#,
        )
        .unwrap();
        assert_eq!(config.buffer.max_sequence_len, 8);
        assert_eq!(config.buffer.space_only, SpaceOnlyPolicy::Interpret);
        assert!(!config.buffer.include_boundary);
        assert_eq!(config.generator.timeout_ms, 10_000);
        assert_eq!(config.broadcast.capacity, 64);
    }

    #[test]
    fn env_overrides_win() {
        let vars: HashMap<&str, &str> = [
            ("GLOVE_DB_PATH", "/tmp/glove-test.sqlite3"),
            ("GLOVE_MAX_SEQUENCE", "12"),
            ("ANTHROPIC_API_KEY", "sk-test"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.storage.db_path, PathBuf::from("/tmp/glove-test.sqlite3"));
        assert_eq!(config.buffer.max_sequence_len, 12);
        assert_eq!(config.generator.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn bad_numeric_override_is_an_error() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(|key| (key == "GLOVE_MAX_SEQUENCE").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("GLOVE_MAX_SEQUENCE"));
    }

    #[test]
    fn api_key_is_never_written_out() {
        let mut config = AppConfig::default();
        config.generator.api_key = Some("sk-secret".into());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
