use crate::error::{Result, SplitError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the oracle endpoint and the segmentation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Maximum number of concurrent oracle requests.
    pub thread_count: usize,
    /// Number of tokens submitted to the oracle per request.
    pub batch_size: usize,
    pub max_word_count_cjk: usize,
    pub max_word_count_other: usize,
    pub request_timeout_secs: u64,
    /// Retries per batch after the first failed attempt.
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: None,
            thread_count: 5,
            batch_size: 10,
            max_word_count_cjk: 20,
            max_word_count_other: 12,
            request_timeout_secs: 60,
            max_retries: 2,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                config = toml::from_str::<Config>(&contents).map_err(|e| {
                    SplitError::Config(format!("{}: {}", config_path.display(), e))
                })?;
            }
        }

        // Override with environment variables
        config.apply_overrides(|key| std::env::var(key).ok());

        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in `load`).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.base_url = Some(url);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.model = Some(model);
        }
        if let Some(n) = lookup("THREAD_NUM").and_then(|v| v.parse().ok()) {
            self.thread_count = n;
        }
        if let Some(n) = lookup("BATCH_SIZE").and_then(|v| v.parse().ok()) {
            self.batch_size = n;
        }
        if let Some(n) = lookup("MAX_WORD_COUNT_CJK").and_then(|v| v.parse().ok()) {
            self.max_word_count_cjk = n;
        }
        if let Some(n) = lookup("MAX_WORD_COUNT_ENGLISH").and_then(|v| v.parse().ok()) {
            self.max_word_count_other = n;
        }
        if let Some(n) = lookup("SUBSPLIT_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = n;
        }
        if let Some(n) = lookup("SUBSPLIT_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            self.max_retries = n;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("OPENAI_BASE_URL", &self.base_url),
            ("OPENAI_API_KEY", &self.api_key),
            ("LLM_MODEL", &self.model),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(SplitError::Config(format!(
                "{} not set. Export them or add them to {}",
                missing.join(", "),
                Self::config_file_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "the config file".to_string())
            )));
        }

        let counts = [
            ("thread_count", self.thread_count),
            ("batch_size", self.batch_size),
            ("max_word_count_cjk", self.max_word_count_cjk),
            ("max_word_count_other", self.max_word_count_other),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(SplitError::Config(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if self.request_timeout_secs == 0 {
            return Err(SplitError::Config(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("subsplit").join("config.toml"))
    }
}
