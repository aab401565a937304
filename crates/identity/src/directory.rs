use std::time::{SystemTime, UNIX_EPOCH};

use {
    async_trait::async_trait, serde::Serialize, tracing::debug,
    voltaic_common::types::ChannelType,
};

use crate::error::{Context, Error, Result};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// A channel contact and its (optional) link to a user account.
///
/// Rows are created unverified on first contact. Only administrative calls
/// promote them; the agent never verifies anyone on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub channel: ChannelType,
    pub identifier: String,
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub verified: bool,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Identity {
    /// Whether this identity may act on behalf of a user.
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        self.verified && self.user_id.is_some()
    }
}

/// Audit-only record of a message from an unrecognized sender.
#[derive(Debug, Clone, Serialize)]
pub struct QuarantinedInbound {
    pub id: i64,
    pub channel: ChannelType,
    pub identifier: String,
    pub body: String,
    pub received_at: u64,
}

/// Exact-match lookup of channel contacts, plus the quarantine log.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Resolve a contact. Exact string match only.
    async fn resolve(&self, channel: ChannelType, identifier: &str) -> Result<Option<Identity>>;

    /// Record the first contact from an unknown sender as an unverified row,
    /// so an administrator can later link and verify it. Idempotent.
    async fn record_first_contact(
        &self,
        channel: ChannelType,
        identifier: &str,
        display_name: Option<&str>,
    ) -> Result<()>;

    /// Append a quarantine record. Quarantined messages are never read back
    /// into processing.
    async fn quarantine(&self, channel: ChannelType, identifier: &str, body: &str) -> Result<()>;

    /// Administrative: link a contact to a user account.
    async fn link_user(
        &self,
        channel: ChannelType,
        identifier: &str,
        user_id: &str,
    ) -> Result<bool>;

    /// Administrative: mark a contact verified.
    async fn mark_verified(&self, channel: ChannelType, identifier: &str) -> Result<bool>;

    /// Administrative: most recent quarantine records.
    async fn recent_quarantine(&self, limit: u32) -> Result<Vec<QuarantinedInbound>>;
}

#[derive(sqlx::FromRow)]
struct IdentityRow {
    channel: String,
    identifier: String,
    user_id: Option<String>,
    display_name: Option<String>,
    verified: i64,
    created_at: i64,
    updated_at: i64,
}

impl IdentityRow {
    fn into_identity(self) -> Result<Identity> {
        let channel = ChannelType::parse(&self.channel)
            .with_context(|| format!("unknown channel in identity row: {}", self.channel))?;
        Ok(Identity {
            channel,
            identifier: self.identifier,
            user_id: self.user_id,
            display_name: self.display_name,
            verified: self.verified != 0,
            created_at: self.created_at as u64,
            updated_at: self.updated_at as u64,
        })
    }
}

#[derive(sqlx::FromRow)]
struct QuarantineRow {
    id: i64,
    channel: String,
    identifier: String,
    body: String,
    received_at: i64,
}

/// SQLite-backed identity directory.
pub struct SqliteIdentityDirectory {
    pool: sqlx::SqlitePool,
}

impl SqliteIdentityDirectory {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the identity tables. Safe to call repeatedly; used directly by
    /// tests against in-memory databases.
    pub async fn init_schema(pool: &sqlx::SqlitePool) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS identities (
                channel      TEXT    NOT NULL,
                identifier   TEXT    NOT NULL,
                user_id      TEXT,
                display_name TEXT,
                verified     INTEGER NOT NULL DEFAULT 0,
                created_at   INTEGER NOT NULL,
                updated_at   INTEGER NOT NULL,
                PRIMARY KEY (channel, identifier)
            )"#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS quarantined_inbound (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                channel     TEXT    NOT NULL,
                identifier  TEXT    NOT NULL,
                body        TEXT    NOT NULL,
                received_at INTEGER NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl IdentityDirectory for SqliteIdentityDirectory {
    async fn resolve(&self, channel: ChannelType, identifier: &str) -> Result<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT * FROM identities WHERE channel = ? AND identifier = ?",
        )
        .bind(channel.as_str())
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;
        row.map(IdentityRow::into_identity).transpose()
    }

    async fn record_first_contact(
        &self,
        channel: ChannelType,
        identifier: &str,
        display_name: Option<&str>,
    ) -> Result<()> {
        let now = now_ms();
        sqlx::query(
            r#"INSERT INTO identities (channel, identifier, user_id, display_name, verified, created_at, updated_at)
               VALUES (?, ?, NULL, ?, 0, ?, ?)
               ON CONFLICT(channel, identifier) DO NOTHING"#,
        )
        .bind(channel.as_str())
        .bind(identifier)
        .bind(display_name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn quarantine(&self, channel: ChannelType, identifier: &str, body: &str) -> Result<()> {
        debug!(%channel, identifier, "quarantining message from unrecognized sender");
        sqlx::query(
            "INSERT INTO quarantined_inbound (channel, identifier, body, received_at) VALUES (?, ?, ?, ?)",
        )
        .bind(channel.as_str())
        .bind(identifier)
        .bind(body)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn link_user(
        &self,
        channel: ChannelType,
        identifier: &str,
        user_id: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE identities SET user_id = ?, updated_at = ? WHERE channel = ? AND identifier = ?",
        )
        .bind(user_id)
        .bind(now_ms())
        .bind(channel.as_str())
        .bind(identifier)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_verified(&self, channel: ChannelType, identifier: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE identities SET verified = 1, updated_at = ? WHERE channel = ? AND identifier = ?",
        )
        .bind(now_ms())
        .bind(channel.as_str())
        .bind(identifier)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn recent_quarantine(&self, limit: u32) -> Result<Vec<QuarantinedInbound>> {
        let rows = sqlx::query_as::<_, QuarantineRow>(
            "SELECT * FROM quarantined_inbound ORDER BY received_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| {
                let channel = ChannelType::parse(&r.channel).ok_or_else(|| {
                    Error::message(format!("unknown channel in quarantine row: {}", r.channel))
                })?;
                Ok(QuarantinedInbound {
                    id: r.id,
                    channel,
                    identifier: r.identifier,
                    body: r.body,
                    received_at: r.received_at as u64,
                })
            })
            .collect()
    }
}
