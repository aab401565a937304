//! Configuration loading for the voltaic agent.
//!
//! Supports TOML, YAML, and JSON files with `${ENV_VAR}` substitution,
//! discovered from the working directory or the user config directory.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{discover_and_load, load_config},
    schema::{AgentConfig, ClassifierConfig, StorageConfig, VoltaicConfig},
};
