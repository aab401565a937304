//! Shared types and error definitions used across all voltaic crates.

pub mod error;
pub mod types;

pub use error::{Error, FromMessage, Result, VoltaicError};
