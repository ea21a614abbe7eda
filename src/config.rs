//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.codesage.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".codesage.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Segmentation settings.
    #[serde(default)]
    pub segmenter: SegmenterSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Number of chunks analyzed concurrently within one job.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Number of jobs whose pipelines may run at the same time.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Interval between status polls while waiting for a job.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            concurrency: default_concurrency(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_output() -> String {
    "codesage_report.md".to_string()
}

fn default_concurrency() -> usize {
    4
}

fn default_max_concurrent_jobs() -> usize {
    2
}

fn default_poll_interval() -> u64 {
    500
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Messages of history kept per session.
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,

    /// Retries after the first failed attempt of a call.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Wait before the first retry, in milliseconds. Doubles on each retry.
    #[serde(default = "default_initial_retry_delay")]
    pub initial_retry_delay_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            max_context_messages: default_max_context_messages(),
            retries: default_retries(),
            initial_retry_delay_ms: default_initial_retry_delay(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout() -> u64 {
    300
}

fn default_max_context_messages() -> usize {
    10
}

fn default_retries() -> u32 {
    3
}

fn default_initial_retry_delay() -> u64 {
    1000
}

/// Segmenter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterSettings {
    /// Maximum chunk length in characters.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
}

impl Default for SegmenterSettings {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
        }
    }
}

fn default_max_chunk_size() -> usize {
    8000
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the current directory.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.codesage.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(retries) = args.retries {
            self.model.retries = retries;
        }

        if let Some(size) = args.max_chunk_size {
            self.segmenter.max_chunk_size = size;
        }

        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(jobs) = args.max_jobs {
            self.general.max_concurrent_jobs = jobs;
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::make_args;
    use std::path::PathBuf;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "llama3.2:latest");
        assert_eq!(config.model.retries, 3);
        assert_eq!(config.model.initial_retry_delay_ms, 1000);
        assert_eq!(config.segmenter.max_chunk_size, 8000);
        assert_eq!(config.general.max_concurrent_jobs, 2);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.md"
concurrency = 8

[model]
name = "codellama:34b"
temperature = 0.2
retries = 5

[segmenter]
max_chunk_size = 2000
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.md");
        assert_eq!(config.general.concurrency, 8);
        assert_eq!(config.general.poll_interval_ms, 500);
        assert_eq!(config.model.name, "codellama:34b");
        assert_eq!(config.model.temperature, 0.2);
        assert_eq!(config.model.retries, 5);
        assert_eq!(config.model.ollama_url, "http://localhost:11434");
        assert_eq!(config.segmenter.max_chunk_size, 2000);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[segmenter]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.segmenter.max_chunk_size, 8000);
    }

    #[test]
    fn test_verbosity_is_not_a_config_setting() {
        // Log level comes from --verbose / --quiet only.
        assert!(!Config::default_toml().contains("verbose"));

        let config: Config = toml::from_str("[general]\nverbose = true\nconcurrency = 3\n").unwrap();
        assert_eq!(config.general.concurrency, 3);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[model]\nname = \"qwen2.5-coder:7b\"\n",
        )
        .unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.model.name, "qwen2.5-coder:7b");
    }

    #[test]
    fn test_load_invalid_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[model\nname = ").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_merge_only_explicit_args() {
        let mut config: Config = toml::from_str("[model]\nname = \"from-file\"\nretries = 7\n").unwrap();
        let mut args = make_args();
        args.retries = Some(1);
        args.output = Some(PathBuf::from("out.json"));

        config.merge_with_args(&args);

        assert_eq!(config.model.name, "from-file");
        assert_eq!(config.model.retries, 1);
        assert_eq!(config.general.output, "out.json");
        assert_eq!(config.segmenter.max_chunk_size, 8000);
    }
}
