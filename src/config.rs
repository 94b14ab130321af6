//! BookLens configuration, persisted as TOML in `$XDG_CONFIG_HOME/booklens/`.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::library::chunker::ChunkConfig;
use crate::library::parser::ExtractOptions;

/// Errors from configuration loading and saving.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(booklens::config::read),
        help("Ensure the config file exists and is valid TOML, or run `booklens config init`.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(booklens::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(booklens::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Settings for the OpenAI-compatible tagging and embedding services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Bearer token. Never serialized when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model used for tag extraction.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Model used for embeddings.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Per-request timeout. No timeout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Pause between successive service calls, in milliseconds.
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_chat_model() -> String {
    "gpt-5-nano".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-large".into()
}
fn default_pause_ms() -> u64 {
    500
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            timeout_secs: None,
            pause_ms: default_pause_ms(),
        }
    }
}

impl ServiceConfig {
    /// Same settings with `api_key` replaced when `key` is non-empty.
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        self
    }
}

/// Chunking and sampling parameters for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Token budget for tagging chunks.
    #[serde(default = "default_tag_chunk_size")]
    pub tag_chunk_size: usize,
    /// Token budget for embedding chunks.
    #[serde(default = "default_vector_chunk_size")]
    pub vector_chunk_size: usize,
    /// Paragraphs carried over between consecutive chunks.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    /// Chunks sampled per pass.
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
    /// Parent directory of per-run scratch areas. System temp when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
}

fn default_tag_chunk_size() -> usize {
    2000
}
fn default_vector_chunk_size() -> usize {
    500
}
fn default_overlap() -> usize {
    100
}
fn default_sample_count() -> usize {
    crate::analysis::sampler::DEFAULT_SAMPLE_COUNT
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            tag_chunk_size: default_tag_chunk_size(),
            vector_chunk_size: default_vector_chunk_size(),
            overlap: default_overlap(),
            sample_count: default_sample_count(),
            work_dir: None,
        }
    }
}

impl AnalysisConfig {
    pub fn tag_chunks(&self) -> ChunkConfig {
        ChunkConfig {
            chunk_size: self.tag_chunk_size,
            overlap: self.overlap,
        }
    }

    pub fn vector_chunks(&self) -> ChunkConfig {
        ChunkConfig {
            chunk_size: self.vector_chunk_size,
            overlap: self.overlap,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookLensConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub extract: ExtractOptions,
}

impl BookLensConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load from `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            Ok(Self::default())
        }
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_constants() {
        let config = BookLensConfig::default();
        assert_eq!(config.service.base_url, "https://api.openai.com/v1");
        assert_eq!(config.service.chat_model, "gpt-5-nano");
        assert_eq!(config.service.embedding_model, "text-embedding-3-large");
        assert_eq!(config.service.timeout_secs, None);
        assert_eq!(config.analysis.tag_chunk_size, 2000);
        assert_eq!(config.analysis.vector_chunk_size, 500);
        assert_eq!(config.analysis.overlap, 100);
        assert_eq!(config.analysis.sample_count, 5);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: BookLensConfig = toml::from_str(
            r#"
            [service]
            chat_model = "local-model"

            [analysis]
            sample_count = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.service.chat_model, "local-model");
        assert_eq!(config.service.pause_ms, 500);
        assert_eq!(config.analysis.sample_count, 3);
        assert_eq!(config.analysis.overlap, 100);
        assert_eq!(config.extract.min_paragraph_len, 8);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = BookLensConfig::default();
        config.analysis.vector_chunk_size = 250;
        config.extract.keep_links = true;
        config.save(&path).unwrap();

        let loaded = BookLensConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn absent_api_key_is_not_written() {
        let text = toml::to_string_pretty(&BookLensConfig::default()).unwrap();
        assert!(!text.contains("api_key"));
    }

    #[test]
    fn api_key_override() {
        let service = ServiceConfig::default().with_api_key(Some("sk-test".into()));
        assert_eq!(service.api_key.as_deref(), Some("sk-test"));
        let kept = service.clone().with_api_key(Some("  ".into()));
        assert_eq!(kept.api_key.as_deref(), Some("sk-test"));
        assert_eq!(kept.with_api_key(None).api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn missing_file_defaults_and_bad_file_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("absent.toml");
        assert_eq!(BookLensConfig::load_or_default(&missing).unwrap(), BookLensConfig::default());

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[service\nbase_url = ").unwrap();
        assert!(matches!(BookLensConfig::load(&bad), Err(ConfigError::Parse { .. })));
    }
}
