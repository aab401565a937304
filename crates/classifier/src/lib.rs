//! Intent classification boundary.
//!
//! The classifier itself is an external service; this crate owns the typed
//! intent model, the boundary validation of whatever the service returns,
//! and the timeout adapter that fails safe into the unknown-intent fallback.

pub mod client;
pub mod intent;
pub mod keyword;

pub use {
    client::{ClassifierHandle, IntentClassifier},
    intent::{Classification, EntityHints, Intent},
    keyword::KeywordClassifier,
};
