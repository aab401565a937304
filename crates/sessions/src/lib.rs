//! Durable conversation sessions.
//!
//! One session per (user, channel, thread) tuple holds the workspace
//! binding, id-only context pointers for pronoun resolution, and at most one
//! pending action awaiting confirmation. All of it lives in a SQLite row, so
//! a process restart loses nothing.

pub mod context;
pub mod error;
pub mod key;
pub mod locks;
pub mod pending;
pub mod store;
pub mod transcript;

pub use {
    context::{ContextPatch, ContextPointers},
    error::{Error, Result},
    key::SessionKey,
    locks::SessionLocks,
    pending::{EntityKind, EntityRef, PendingAction, StoredPendingAction},
    store::{ConversationSession, SqliteSessionStore},
    transcript::TranscriptLog,
};
