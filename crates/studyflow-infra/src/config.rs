//! Configuration loader for StudyFlow.
//!
//! Reads `config.toml` from the data directory (`~/.studyflow/` by default)
//! and deserializes it into [`StudyFlowConfig`]. Falls back to defaults when
//! the file is missing or malformed. `ANTHROPIC_API_KEY` takes precedence
//! over any key in the file.

use std::path::{Path, PathBuf};

use studyflow_types::config::StudyFlowConfig;

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const DATA_DIR_ENV: &str = "STUDYFLOW_DATA_DIR";

/// Resolve the data directory.
///
/// Priority:
/// 1. `STUDYFLOW_DATA_DIR` environment variable
/// 2. `~/.studyflow`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".studyflow");
    }

    PathBuf::from(".studyflow")
}

/// Load configuration from `{data_dir}/config.toml` and apply environment
/// overrides.
pub async fn load_config(data_dir: &Path) -> StudyFlowConfig {
    let mut config = read_config_file(data_dir).await;
    apply_api_key(&mut config, std::env::var(API_KEY_ENV).ok());
    config
}

async fn read_config_file(data_dir: &Path) -> StudyFlowConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return StudyFlowConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return StudyFlowConfig::default();
        }
    };

    match toml::from_str::<StudyFlowConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            StudyFlowConfig::default()
        }
    }
}

/// Replace the configured key with a non-empty environment value.
fn apply_api_key(config: &mut StudyFlowConfig, env_value: Option<String>) {
    if let Some(key) = env_value.filter(|k| !k.trim().is_empty()) {
        config.model.api_key = Some(key);
    }
}

/// Corpus directory for retrieval, defaulting to `{data_dir}/corpus`.
pub fn corpus_dir(config: &StudyFlowConfig, data_dir: &Path) -> PathBuf {
    config
        .retrieval
        .corpus_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("corpus"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = read_config_file(tmp.path()).await;
        assert_eq!(config.retrieval.top_k, 5);
        assert!(config.model.api_key.is_none());
    }

    #[tokio::test]
    async fn valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[model]
api_key = "sk-from-file"
max_tokens = 2048

[engine]
step_timeout_secs = 45
"#,
        )
        .await
        .unwrap();

        let config = read_config_file(tmp.path()).await;
        assert_eq!(config.model.api_key.as_deref(), Some("sk-from-file"));
        assert_eq!(config.model.max_tokens, 2048);
        assert_eq!(config.engine.step_timeout_secs, Some(45));
    }

    #[tokio::test]
    async fn invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = read_config_file(tmp.path()).await;
        assert_eq!(config.model.max_tokens, 4096);
    }

    #[test]
    fn env_key_overrides_file_key() {
        let mut config = StudyFlowConfig::default();
        config.model.api_key = Some("sk-from-file".to_string());

        apply_api_key(&mut config, Some(String::new()));
        assert_eq!(config.model.api_key.as_deref(), Some("sk-from-file"));

        apply_api_key(&mut config, Some("sk-from-env".to_string()));
        assert_eq!(config.model.api_key.as_deref(), Some("sk-from-env"));
    }

    #[test]
    fn corpus_dir_defaults_under_data_dir() {
        let data_dir = PathBuf::from("/home/user/.studyflow");
        let mut config = StudyFlowConfig::default();
        assert_eq!(
            corpus_dir(&config, &data_dir),
            PathBuf::from("/home/user/.studyflow/corpus")
        );

        config.retrieval.corpus_dir = Some(PathBuf::from("/srv/notes"));
        assert_eq!(corpus_dir(&config, &data_dir), PathBuf::from("/srv/notes"));
    }

    #[test]
    fn resolve_data_dir_from_env() {
        // SAFETY: No other test in this crate reads STUDYFLOW_DATA_DIR.
        unsafe {
            std::env::set_var(DATA_DIR_ENV, "/tmp/test-studyflow");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-studyflow"));
        unsafe {
            std::env::remove_var(DATA_DIR_ENV);
        }
    }
}
