//! Identity directory and quarantine log.
//!
//! Maps channel contact strings to verified users. Matching is exact:
//! no normalization or fuzzy matching across channels, so a lookalike
//! identifier on another channel can never inherit someone's access.

pub mod directory;
pub mod error;

pub use {
    directory::{Identity, IdentityDirectory, QuarantinedInbound, SqliteIdentityDirectory},
    error::{Error, Result},
};
