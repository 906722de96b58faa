//! Configuração do revloop carregada a partir de `revloop.toml`.
//!
//! Todo campo tem default, então arquivo ausente ou parcial é aceito.
//! A variável de ambiente `ANTHROPIC_API_KEY` tem precedência sobre o arquivo.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::RevloopError;
use crate::retry::RetryPolicy;
use crate::workflow::LoopOptions;

pub const CONFIG_FILE: &str = "revloop.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct RevloopConfig {
    /// Chave da API Anthropic.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Tentativas por chamada de agente, incluindo a primeira.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Orçamento do loop de refinamento.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,

    /// Orçamento do loop de teste e depuração (`revloop debug`).
    #[serde(default = "default_max_debug_iterations")]
    pub max_debug_iterations: usize,

    #[serde(default = "default_trace_dir")]
    pub trace_dir: PathBuf,

    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,
}

fn default_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_max_iterations() -> usize {
    3
}

fn default_quality_threshold() -> f64 {
    0.8
}

fn default_max_debug_iterations() -> usize {
    5
}

fn default_trace_dir() -> PathBuf {
    PathBuf::from(".traces")
}

fn default_session_dir() -> PathBuf {
    PathBuf::from(".sessions")
}

impl Default for RevloopConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_iterations: default_max_iterations(),
            quality_threshold: default_quality_threshold(),
            max_debug_iterations: default_max_debug_iterations(),
            trace_dir: default_trace_dir(),
            session_dir: default_session_dir(),
        }
    }
}

impl RevloopConfig {
    /// Carrega `revloop.toml` do diretório atual, usando os defaults
    /// quando o arquivo não existe.
    pub fn load() -> Result<Self> {
        let config = Self::load_from(Path::new(CONFIG_FILE))?;
        Ok(config.with_api_key_override(std::env::var("ANTHROPIC_API_KEY").ok()))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str::<RevloopConfig>(&contents)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Substitui a chave do arquivo por `key`, exceto se ausente ou vazia.
    pub fn with_api_key_override(mut self, key: Option<String>) -> Self {
        if let Some(key) = key {
            if !key.is_empty() {
                self.api_key = key;
            }
        }
        self
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if !(0.0..=1.0).contains(&self.quality_threshold) {
            return Err(RevloopError::Config(format!(
                "quality_threshold must be within [0, 1], got {}",
                self.quality_threshold
            )));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(RevloopError::Config(format!(
                "max_delay_ms ({}) is below base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.base_delay_ms, self.max_delay_ms)
    }

    pub fn loop_options(&self) -> LoopOptions {
        LoopOptions {
            max_iterations: self.max_iterations,
            quality_threshold: self.quality_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = RevloopConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 2000);
        assert_eq!(config.max_delay_ms, 10_000);
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.quality_threshold, 0.8);
        assert_eq!(config.max_debug_iterations, 5);
        assert_eq!(config.trace_dir, PathBuf::from(".traces"));
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            api_key = "sk-test-123"
            max_iterations = 5
            quality_threshold = 0.9
        "#;
        let config: RevloopConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_key, "sk-test-123");
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.loop_options().quality_threshold, 0.9);
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = RevloopConfig::load_from(&tmp.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.max_debug_iterations, 5);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        std::fs::write(&path, "quality_threshold = 1.5\n").unwrap();
        let err = RevloopConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("quality_threshold"));
    }

    #[test]
    fn env_key_overrides_unless_empty() {
        let config = RevloopConfig {
            api_key: "from-file".into(),
            ..RevloopConfig::default()
        };
        let config = config.with_api_key_override(Some(String::new()));
        assert_eq!(config.api_key, "from-file");
        let config = config.with_api_key_override(Some("from-env".into()));
        assert_eq!(config.api_key, "from-env");
    }

    #[test]
    fn retry_policy_follows_config() {
        let config = RevloopConfig {
            max_attempts: 5,
            ..RevloopConfig::default()
        };
        assert_eq!(config.retry_policy().max_attempts, 5);
    }
}
