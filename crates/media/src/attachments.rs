use std::time::{SystemTime, UNIX_EPOCH};

use {
    serde::{Deserialize, Serialize},
    tracing::debug,
    voltaic_common::types::ChannelType,
};

use crate::error::{Error, Result};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Link state of an ingested attachment.
///
/// `Linked` is reachable only from `LinkPending`; an attachment can never
/// jump from `Unlinked` to `Linked` without going through a confirmed link
/// action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Unlinked,
    LinkPending,
    Linked,
}

impl LinkState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unlinked => "unlinked",
            Self::LinkPending => "link_pending",
            Self::Linked => "linked",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unlinked" => Some(Self::Unlinked),
            "link_pending" => Some(Self::LinkPending),
            "linked" => Some(Self::Linked),
            _ => None,
        }
    }
}

/// One persisted inbound binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedAttachment {
    pub id: String,
    pub storage_key: String,
    pub mime: Option<String>,
    pub filename: Option<String>,
    pub channel: ChannelType,
    pub link_state: LinkState,
    pub linked_kind: Option<String>,
    pub linked_id: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

#[derive(sqlx::FromRow)]
struct AttachmentRow {
    id: String,
    storage_key: String,
    mime: Option<String>,
    filename: Option<String>,
    channel: String,
    link_state: String,
    linked_kind: Option<String>,
    linked_id: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl AttachmentRow {
    fn into_attachment(self) -> Result<IngestedAttachment> {
        let channel = ChannelType::parse(&self.channel).ok_or_else(|| {
            Error::message(format!("unknown channel in attachment row: {}", self.channel))
        })?;
        let link_state = LinkState::parse(&self.link_state).ok_or_else(|| {
            Error::message(format!("unknown link state in row: {}", self.link_state))
        })?;
        Ok(IngestedAttachment {
            id: self.id,
            storage_key: self.storage_key,
            mime: self.mime,
            filename: self.filename,
            channel,
            link_state,
            linked_kind: self.linked_kind,
            linked_id: self.linked_id,
            created_at: self.created_at as u64,
            updated_at: self.updated_at as u64,
        })
    }
}

/// SQLite-backed record store for ingested attachments.
pub struct SqliteAttachmentStore {
    pool: sqlx::SqlitePool,
}

impl SqliteAttachmentStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the attachments table. Safe to call repeatedly; used directly
    /// by tests against in-memory databases.
    pub async fn init_schema(pool: &sqlx::SqlitePool) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS ingested_attachments (
                id          TEXT    PRIMARY KEY,
                storage_key TEXT    NOT NULL,
                mime        TEXT,
                filename    TEXT,
                channel     TEXT    NOT NULL,
                link_state  TEXT    NOT NULL DEFAULT 'unlinked',
                linked_kind TEXT,
                linked_id   TEXT,
                created_at  INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Persist a new attachment record in the `unlinked` state.
    pub async fn insert_unlinked(
        &self,
        storage_key: &str,
        mime: Option<&str>,
        filename: Option<&str>,
        channel: ChannelType,
    ) -> Result<IngestedAttachment> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_ms();
        sqlx::query(
            r#"INSERT INTO ingested_attachments (id, storage_key, mime, filename, channel, link_state, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, 'unlinked', ?, ?)"#,
        )
        .bind(&id)
        .bind(storage_key)
        .bind(mime)
        .bind(filename)
        .bind(channel.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(attachment_id = %id, storage_key, "persisted unlinked attachment");

        self.get(&id)
            .await?
            .ok_or_else(|| Error::message("attachment vanished after insert"))
    }

    pub async fn get(&self, id: &str) -> Result<Option<IngestedAttachment>> {
        let row = sqlx::query_as::<_, AttachmentRow>(
            "SELECT * FROM ingested_attachments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(AttachmentRow::into_attachment).transpose()
    }

    /// `unlinked → link_pending`, when a link action is armed for
    /// confirmation. Returns false if the attachment was not `unlinked`.
    pub async fn mark_link_pending(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE ingested_attachments SET link_state = 'link_pending', updated_at = ? \
             WHERE id = ? AND link_state = 'unlinked'",
        )
        .bind(now_ms())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `link_pending → unlinked`, when the user cancels or the pending
    /// action expires.
    pub async fn release_link(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE ingested_attachments SET link_state = 'unlinked', updated_at = ? \
             WHERE id = ? AND link_state = 'link_pending'",
        )
        .bind(now_ms())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `link_pending → linked`, only after the link operation executed.
    ///
    /// The `WHERE` clause is the invariant: a row still in `unlinked` (or
    /// already `linked`) is not touched, and the caller gets an error.
    pub async fn complete_link(&self, id: &str, kind: &str, entity_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE ingested_attachments SET link_state = 'linked', linked_kind = ?, linked_id = ?, updated_at = ? \
             WHERE id = ? AND link_state = 'link_pending'",
        )
        .bind(kind)
        .bind(entity_id)
        .bind(now_ms())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::invalid_transition(format!(
                "attachment {id} is not awaiting a link"
            )));
        }
        Ok(())
    }

    /// All unlinked attachments, oldest first.
    pub async fn list_unlinked(&self) -> Result<Vec<IngestedAttachment>> {
        let rows = sqlx::query_as::<_, AttachmentRow>(
            "SELECT * FROM ingested_attachments WHERE link_state = 'unlinked' ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(AttachmentRow::into_attachment)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteAttachmentStore {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteAttachmentStore::init_schema(&pool).await.unwrap();
        SqliteAttachmentStore::new(pool)
    }

    async fn insert(store: &SqliteAttachmentStore) -> IngestedAttachment {
        store
            .insert_unlinked(
                "k1/survey.pdf",
                Some("application/pdf"),
                Some("survey.pdf"),
                ChannelType::Whatsapp,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn insert_starts_unlinked() {
        let store = test_store().await;
        let att = insert(&store).await;
        assert_eq!(att.link_state, LinkState::Unlinked);
        assert!(att.linked_id.is_none());
    }

    #[tokio::test]
    async fn full_transition_chain() {
        let store = test_store().await;
        let att = insert(&store).await;

        assert!(store.mark_link_pending(&att.id).await.unwrap());
        store.complete_link(&att.id, "project", "p1").await.unwrap();

        let att = store.get(&att.id).await.unwrap().unwrap();
        assert_eq!(att.link_state, LinkState::Linked);
        assert_eq!(att.linked_kind.as_deref(), Some("project"));
        assert_eq!(att.linked_id.as_deref(), Some("p1"));
    }

    #[tokio::test]
    async fn linked_unreachable_from_unlinked() {
        let store = test_store().await;
        let att = insert(&store).await;

        let err = store.complete_link(&att.id, "project", "p1").await;
        assert!(err.is_err());

        let att = store.get(&att.id).await.unwrap().unwrap();
        assert_eq!(att.link_state, LinkState::Unlinked);
    }

    #[tokio::test]
    async fn release_returns_to_unlinked() {
        let store = test_store().await;
        let att = insert(&store).await;

        assert!(store.mark_link_pending(&att.id).await.unwrap());
        assert!(store.release_link(&att.id).await.unwrap());

        let att = store.get(&att.id).await.unwrap().unwrap();
        assert_eq!(att.link_state, LinkState::Unlinked);

        // And it can be re-armed later.
        assert!(store.mark_link_pending(&att.id).await.unwrap());
    }

    #[tokio::test]
    async fn double_pending_is_rejected() {
        let store = test_store().await;
        let att = insert(&store).await;

        assert!(store.mark_link_pending(&att.id).await.unwrap());
        assert!(!store.mark_link_pending(&att.id).await.unwrap());
    }

    #[tokio::test]
    async fn list_unlinked_excludes_pending_and_linked() {
        let store = test_store().await;
        let a = insert(&store).await;
        let b = insert(&store).await;
        let _c = insert(&store).await;

        store.mark_link_pending(&a.id).await.unwrap();
        store.mark_link_pending(&b.id).await.unwrap();
        store.complete_link(&b.id, "dataroom", "dr1").await.unwrap();

        let unlinked = store.list_unlinked().await.unwrap();
        assert_eq!(unlinked.len(), 1);
    }
}
