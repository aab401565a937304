//! Attachment storage.
//!
//! Inbound binaries are persisted before any linking decision is made: the
//! blob lands first, then an `unlinked` record, and the `linked` state is
//! only reachable through a confirmed link action.

pub mod attachments;
pub mod blob;
pub mod error;

pub use {
    attachments::{IngestedAttachment, LinkState, SqliteAttachmentStore},
    blob::{BlobStore, FsBlobStore, MediaFetcher, storage_key_for},
    error::{Error, Result},
};
