use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const BASE_URL_ENV: &str = "SLIDE_API_BASE_URL";
pub const OUTPUT_DIR_ENV: &str = "SLIDE_OUTPUT_DIR";

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideConfig {
    pub base_url: String,
    /// Server-side directory generation output is written to.
    pub output_dir: String,
    pub list_limit: usize,
    pub search_limit: usize,
    pub retrieval_limit: usize,
}

impl Default for SlideConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            output_dir: "output".to_string(),
            list_limit: 50,
            search_limit: 20,
            retrieval_limit: 20,
        }
    }
}

impl SlideConfig {
    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find config directory"))?
            .join("slide-agent");
        Ok(config_dir.join("config.json"))
    }

    /// Defaults, then the config file, then the environment.
    pub async fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Ok(path) => Self::load_from(&path).await?,
            Err(e) => {
                tracing::debug!("no config directory: {e}");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults when it is missing.
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path).await?;
        let mut config: SlideConfig = serde_json::from_str(&content)?;
        config.base_url = normalize_base_url(&config.base_url);
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Overlay environment values. `lookup` is injectable so tests never touch
    /// the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.base_url = normalize_base_url(&url);
        }
        if let Some(dir) = lookup(OUTPUT_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.output_dir = dir;
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_defaults_and_strips_trailing_slash() {
        let mut config = SlideConfig::default();
        config.apply_env(|key| match key {
            BASE_URL_ENV => Some("http://slides.internal:9000/".to_string()),
            _ => None,
        });
        assert_eq!(config.base_url, "http://slides.internal:9000");
        assert_eq!(config.output_dir, "output");
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = SlideConfig::default();
        config.apply_env(|_| Some("  ".to_string()));
        assert_eq!(config, SlideConfig::default());
    }

    #[tokio::test]
    async fn file_round_trip_and_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.json");

        assert_eq!(SlideConfig::load_from(&path).await.unwrap(), SlideConfig::default());

        let config = SlideConfig {
            list_limit: 10,
            ..SlideConfig::default().with_base_url("http://127.0.0.1:8123/")
        };
        config.save_to(&path).await.unwrap();
        let loaded = SlideConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded.base_url, "http://127.0.0.1:8123");
        assert_eq!(loaded.list_limit, 10);
    }

    #[tokio::test]
    async fn partial_file_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        tokio::fs::write(&path, r#"{"output_dir":"decks"}"#).await.unwrap();
        let loaded = SlideConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded.output_dir, "decks");
        assert_eq!(loaded.base_url, DEFAULT_BASE_URL);
    }
}
