//! Config schema types (storage, classifier, agent behavior).

use std::path::PathBuf;

use {secrecy::Secret, serde::Deserialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VoltaicConfig {
    pub storage: StorageConfig,
    pub classifier: ClassifierConfig,
    pub agent: AgentConfig,
}

/// Where durable state lives.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path. Defaults to `voltaic.db` in the data dir.
    pub db_path: Option<PathBuf>,
    /// Directory for attachment blobs.
    pub blob_dir: Option<PathBuf>,
    /// Directory for per-session transcripts.
    pub transcript_dir: Option<PathBuf>,
}

/// Classifier service connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<Secret<String>>,
    /// Classifier call timeout. Timeouts fall back to the unknown-intent
    /// response rather than failing the turn.
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: 10,
        }
    }
}

/// Agent turn behavior.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum age of an unresolved pending action before it is
    /// auto-cancelled on the next turn.
    pub pending_max_age_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            pending_max_age_secs: 86_400,
        }
    }
}
