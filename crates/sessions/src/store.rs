use std::time::{SystemTime, UNIX_EPOCH};

use {tracing::debug, voltaic_common::types::ChannelType};

use crate::{
    context::{ContextPatch, ContextPointers},
    error::{Error, Result},
    key::SessionKey,
    pending::{PendingAction, StoredPendingAction},
};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// One durable conversation thread.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSession {
    pub id: String,
    pub user_id: String,
    pub org_id: String,
    pub channel: ChannelType,
    pub identifier: String,
    pub thread_id: String,
    pub context: ContextPointers,
    pub pending: Option<StoredPendingAction>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl ConversationSession {
    #[must_use]
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.channel, self.identifier.clone(), self.thread_id.clone())
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    org_id: String,
    channel: String,
    identifier: String,
    thread_id: String,
    last_project_id: Option<String>,
    last_site_id: Option<String>,
    last_asset_id: Option<String>,
    last_document_id: Option<String>,
    active_dataroom_id: Option<String>,
    active_view_scope_id: Option<String>,
    last_attachment_id: Option<String>,
    pending_action: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl SessionRow {
    fn into_session(self) -> Result<ConversationSession> {
        let channel = ChannelType::parse(&self.channel).ok_or_else(|| {
            Error::message(format!("unknown channel in session row: {}", self.channel))
        })?;
        let pending = self
            .pending_action
            .as_deref()
            .map(serde_json::from_str::<StoredPendingAction>)
            .transpose()?;
        Ok(ConversationSession {
            id: self.id,
            user_id: self.user_id,
            org_id: self.org_id,
            channel,
            identifier: self.identifier,
            thread_id: self.thread_id,
            context: ContextPointers {
                last_project_id: self.last_project_id,
                last_site_id: self.last_site_id,
                last_asset_id: self.last_asset_id,
                last_document_id: self.last_document_id,
                active_dataroom_id: self.active_dataroom_id,
                active_view_scope_id: self.active_view_scope_id,
                last_attachment_id: self.last_attachment_id,
            },
            pending,
            created_at: self.created_at as u64,
            updated_at: self.updated_at as u64,
        })
    }
}

/// SQLite-backed store for conversation sessions.
///
/// The session row is the serialization point for a thread: callers hold the
/// per-session lock (see [`crate::locks::SessionLocks`]) across any
/// read-modify-write, in particular the pending-action transitions.
pub struct SqliteSessionStore {
    pool: sqlx::SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the session table. Safe to call repeatedly; used directly by
    /// tests against in-memory databases.
    pub async fn init_schema(pool: &sqlx::SqlitePool) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS conversation_sessions (
                id                   TEXT    PRIMARY KEY,
                user_id              TEXT    NOT NULL,
                org_id               TEXT    NOT NULL,
                channel              TEXT    NOT NULL,
                identifier           TEXT    NOT NULL,
                thread_id            TEXT    NOT NULL,
                last_project_id      TEXT,
                last_site_id         TEXT,
                last_asset_id        TEXT,
                last_document_id     TEXT,
                active_dataroom_id   TEXT,
                active_view_scope_id TEXT,
                last_attachment_id   TEXT,
                pending_action       TEXT,
                created_at           INTEGER NOT NULL,
                updated_at           INTEGER NOT NULL,
                UNIQUE (user_id, channel, thread_id)
            )"#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sessions_updated_at ON conversation_sessions(updated_at)",
        )
        .execute(pool)
        .await
        .ok();

        Ok(())
    }

    /// Read-only lookup on the thread tuple. Creates nothing; the workspace
    /// binder uses this before any row may exist.
    pub async fn peek(
        &self,
        user_id: &str,
        channel: ChannelType,
        thread_id: &str,
    ) -> Result<Option<ConversationSession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM conversation_sessions WHERE user_id = ? AND channel = ? AND thread_id = ?",
        )
        .bind(user_id)
        .bind(channel.as_str())
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(SessionRow::into_session).transpose()
    }

    /// Idempotent get-or-create on the thread tuple.
    pub async fn ensure(
        &self,
        user_id: &str,
        org_id: &str,
        channel: ChannelType,
        identifier: &str,
        thread_id: &str,
    ) -> Result<ConversationSession> {
        if let Some(session) = self.peek(user_id, channel, thread_id).await? {
            return Ok(session);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = now_ms();
        sqlx::query(
            r#"INSERT INTO conversation_sessions (id, user_id, org_id, channel, identifier, thread_id, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(user_id, channel, thread_id) DO NOTHING"#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(org_id)
        .bind(channel.as_str())
        .bind(identifier)
        .bind(thread_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(user_id, %channel, thread_id, "created conversation session");

        // Re-read: a concurrent insert may have won the conflict.
        self.peek(user_id, channel, thread_id)
            .await?
            .ok_or_else(|| Error::message("session vanished after insert"))
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<ConversationSession>> {
        let row =
            sqlx::query_as::<_, SessionRow>("SELECT * FROM conversation_sessions WHERE id = ?")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(SessionRow::into_session).transpose()
    }

    /// Rebind the session to a different organization (workspace switch).
    pub async fn rebind_org(&self, session_id: &str, org_id: &str) -> Result<()> {
        sqlx::query("UPDATE conversation_sessions SET org_id = ?, updated_at = ? WHERE id = ?")
            .bind(org_id)
            .bind(now_ms())
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Last-write-wins partial merge of context pointers. Unset patch fields
    /// keep their stored value.
    pub async fn update_context(&self, session_id: &str, patch: &ContextPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"UPDATE conversation_sessions SET
                 last_project_id      = COALESCE(?, last_project_id),
                 last_site_id         = COALESCE(?, last_site_id),
                 last_asset_id        = COALESCE(?, last_asset_id),
                 last_document_id     = COALESCE(?, last_document_id),
                 active_dataroom_id   = COALESCE(?, active_dataroom_id),
                 active_view_scope_id = COALESCE(?, active_view_scope_id),
                 last_attachment_id   = COALESCE(?, last_attachment_id),
                 updated_at           = ?
               WHERE id = ?"#,
        )
        .bind(&patch.project_id)
        .bind(&patch.site_id)
        .bind(&patch.asset_id)
        .bind(&patch.document_id)
        .bind(&patch.dataroom_id)
        .bind(&patch.view_scope_id)
        .bind(&patch.attachment_id)
        .bind(now_ms())
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Arm a pending action. Silently replaces any unresolved prior one;
    /// there is no queue of pending actions.
    pub async fn set_pending_action(&self, session_id: &str, action: &PendingAction) -> Result<()> {
        let stored = StoredPendingAction {
            action: action.clone(),
            created_at_ms: now_ms() as u64,
        };
        let payload = serde_json::to_string(&stored)?;
        sqlx::query(
            "UPDATE conversation_sessions SET pending_action = ?, updated_at = ? WHERE id = ?",
        )
        .bind(payload)
        .bind(now_ms())
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn clear_pending_action(&self, session_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE conversation_sessions SET pending_action = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(now_ms())
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Read and clear the pending action in one transaction.
    ///
    /// The action is gone from the row before the caller dispatches it, so a
    /// crash mid-execution can never leave a stale action waiting to be
    /// re-confirmed.
    pub async fn take_pending_action(
        &self,
        session_id: &str,
    ) -> Result<Option<StoredPendingAction>> {
        let mut tx = self.pool.begin().await?;

        let payload = sqlx::query_scalar::<_, Option<String>>(
            "SELECT pending_action FROM conversation_sessions WHERE id = ?",
        )
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?
        .flatten();

        let Some(payload) = payload else {
            tx.commit().await?;
            return Ok(None);
        };

        sqlx::query(
            "UPDATE conversation_sessions SET pending_action = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(now_ms())
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(serde_json::from_str(&payload)?))
    }
}
