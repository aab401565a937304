//! End-to-end turn tests: scripted classifier, in-memory stores, and a
//! closure-backed operation registry standing in for the business surface.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    async_trait::async_trait,
    serde_json::json,
    voltaic_agent::{Agent, AgentDeps},
    voltaic_classifier::{Classification, ClassifierHandle, EntityHints, Intent, IntentClassifier},
    voltaic_common::types::{ChannelType, InboundMessage, MediaRef, MessageKind},
    voltaic_config::AgentConfig,
    voltaic_identity::{IdentityDirectory, SqliteIdentityDirectory},
    voltaic_media::{FsBlobStore, LinkState, MediaFetcher, SqliteAttachmentStore},
    voltaic_registry::{
        OperationError, OperationRegistry, OrgMembership, Role, StaticUserDirectory, UserRecord,
    },
    voltaic_sessions::{SessionLocks, SqliteSessionStore, TranscriptLog},
};

const WHATSAPP: ChannelType = ChannelType::Whatsapp;

// ── Test doubles ────────────────────────────────────────────────────────────

/// Classifier that answers from a fixed text → classification table.
struct ScriptedClassifier {
    rules: HashMap<String, Classification>,
}

#[async_trait]
impl IntentClassifier for ScriptedClassifier {
    async fn classify(&self, text: &str, _context: &str) -> anyhow::Result<Classification> {
        Ok(self
            .rules
            .get(&text.to_lowercase())
            .cloned()
            .unwrap_or_else(Classification::unknown))
    }
}

struct StubFetcher;

#[async_trait]
impl MediaFetcher for StubFetcher {
    async fn fetch(&self, _media: &MediaRef) -> anyhow::Result<Vec<u8>> {
        Ok(b"binary content".to_vec())
    }
}

fn classification(intent: Intent, entities: EntityHints) -> Classification {
    Classification {
        intent,
        entities,
        confidence: 0.9,
    }
}

fn scripted_rules() -> HashMap<String, Classification> {
    let mut rules = HashMap::new();
    rules.insert(
        "create a work order for inverter repair".to_string(),
        classification(
            Intent::CreateWorkOrder,
            EntityHints {
                description: Some("inverter repair".into()),
                ..Default::default()
            },
        ),
    );
    rules.insert(
        "status of p1".to_string(),
        classification(
            Intent::ProjectStatus,
            EntityHints {
                project_id: Some("p1".into()),
                ..Default::default()
            },
        ),
    );
    rules.insert(
        "generate a dataroom".to_string(),
        classification(Intent::GenerateDataroom, EntityHints::default()),
    );
    rules.insert(
        "link it to project p1".to_string(),
        classification(
            Intent::LinkAttachment,
            EntityHints {
                project_id: Some("p1".into()),
                ..Default::default()
            },
        ),
    );
    rules
}

// ── Harness ─────────────────────────────────────────────────────────────────

struct Harness {
    pool: sqlx::SqlitePool,
    identities: Arc<SqliteIdentityDirectory>,
    registry: Arc<OperationRegistry>,
    users: Arc<StaticUserDirectory>,
    work_orders: Arc<Mutex<Vec<serde_json::Value>>>,
    tmp: tempfile::TempDir,
}

impl Harness {
    async fn new() -> Self {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteIdentityDirectory::init_schema(&pool).await.unwrap();
        SqliteSessionStore::init_schema(&pool).await.unwrap();
        SqliteAttachmentStore::init_schema(&pool).await.unwrap();

        let identities = Arc::new(SqliteIdentityDirectory::new(pool.clone()));
        seed_identities(identities.as_ref()).await;

        let mut users = StaticUserDirectory::new();
        users.insert(user("u-single", vec![("org1", Some("Acme Solar"), Role::Member)]));
        users.insert(user(
            "u-multi",
            vec![
                ("org1", Some("Acme Solar"), Role::Member),
                ("org2", Some("Globex Wind"), Role::Member),
            ],
        ));
        users.insert(user("u-viewer", vec![("org1", Some("Acme Solar"), Role::Viewer)]));
        let users = Arc::new(users);

        let work_orders = Arc::new(Mutex::new(Vec::new()));
        let registry = Arc::new(build_registry(users.clone(), work_orders.clone()));

        Self {
            pool,
            identities,
            registry,
            users,
            work_orders,
            tmp: tempfile::tempdir().unwrap(),
        }
    }

    /// Build an agent over the shared durable state. Called twice in the
    /// restart tests: a "new process" sees exactly what the row holds.
    fn agent(&self) -> Agent {
        self.agent_with_config(&AgentConfig::default())
    }

    fn agent_with_config(&self, config: &AgentConfig) -> Agent {
        let deps = AgentDeps {
            identities: self.identities.clone(),
            users: self.users.clone(),
            registry: self.registry.clone(),
            classifier: ClassifierHandle::new(
                Arc::new(ScriptedClassifier {
                    rules: scripted_rules(),
                }),
                Duration::from_secs(5),
            ),
            sessions: SqliteSessionStore::new(self.pool.clone()),
            locks: SessionLocks::new(),
            transcript: TranscriptLog::new(self.tmp.path().join("transcripts")),
            attachments: SqliteAttachmentStore::new(self.pool.clone()),
            blobs: Arc::new(FsBlobStore::new(self.tmp.path().join("blobs"))),
            fetcher: Arc::new(StubFetcher),
        };
        Agent::new(deps, config).unwrap()
    }

    fn sessions(&self) -> SqliteSessionStore {
        SqliteSessionStore::new(self.pool.clone())
    }

    fn attachments(&self) -> SqliteAttachmentStore {
        SqliteAttachmentStore::new(self.pool.clone())
    }

    async fn session_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM conversation_sessions")
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    async fn raw_pending(&self, sender: &str) -> Option<String> {
        sqlx::query_scalar::<_, Option<String>>(
            "SELECT pending_action FROM conversation_sessions WHERE identifier = ?",
        )
        .bind(sender)
        .fetch_optional(&self.pool)
        .await
        .unwrap()
        .flatten()
    }

    async fn only_attachment(&self) -> voltaic_media::IngestedAttachment {
        let id: String = sqlx::query_scalar("SELECT id FROM ingested_attachments")
            .fetch_one(&self.pool)
            .await
            .unwrap();
        self.attachments().get(&id).await.unwrap().unwrap()
    }
}

fn user(id: &str, memberships: Vec<(&str, Option<&str>, Role)>) -> UserRecord {
    UserRecord {
        id: id.into(),
        display_name: None,
        default_org_id: memberships.first().map(|(o, _, _)| (*o).to_string()),
        memberships: memberships
            .into_iter()
            .map(|(org_id, org_name, role)| OrgMembership {
                org_id: org_id.into(),
                org_name: org_name.map(Into::into),
                role,
            })
            .collect(),
        active: true,
    }
}

async fn seed_identities(dir: &SqliteIdentityDirectory) {
    for (identifier, user_id, verified) in [
        ("+15550001", Some("u-single"), true),
        ("+15550002", Some("u-multi"), true),
        ("+15550003", None, false),
        ("+15550004", Some("u-viewer"), true),
    ] {
        dir.record_first_contact(WHATSAPP, identifier, None)
            .await
            .unwrap();
        if let Some(user_id) = user_id {
            dir.link_user(WHATSAPP, identifier, user_id).await.unwrap();
        }
        if verified {
            dir.mark_verified(WHATSAPP, identifier).await.unwrap();
        }
    }
}

fn build_registry(
    users: Arc<StaticUserDirectory>,
    work_orders: Arc<Mutex<Vec<serde_json::Value>>>,
) -> OperationRegistry {
    let mut registry = OperationRegistry::new(users);

    registry.register("projects.status", |caller, input| async move {
        let org = input["org_id"].as_str().unwrap_or_default().to_string();
        if !caller.can_read(&org) {
            return Err(OperationError::forbidden("no membership"));
        }
        if input["project_id"] == "missing" {
            return Err(OperationError::not_found("no such project"));
        }
        Ok(json!({"id": input["project_id"], "status": "operational"}))
    });

    registry.register("documents.search", |caller, input| async move {
        let org = input["org_id"].as_str().unwrap_or_default().to_string();
        if !caller.can_read(&org) {
            return Err(OperationError::forbidden("no membership"));
        }
        Ok(json!({"hits": []}))
    });

    registry.register("diligence.summary", |caller, input| async move {
        let org = input["org_id"].as_str().unwrap_or_default().to_string();
        if !caller.can_read(&org) {
            return Err(OperationError::forbidden("no membership"));
        }
        Ok(json!({"open_items": 2}))
    });

    registry.register("work_orders.create", move |caller, input| {
        let work_orders = work_orders.clone();
        async move {
            let org = input["org_id"].as_str().unwrap_or_default().to_string();
            if !caller.can_write(&org) {
                return Err(OperationError::forbidden("read-only access"));
            }
            work_orders.lock().unwrap().push(input);
            Ok(json!({"id": "wo-123"}))
        }
    });

    registry.register("datarooms.generate", |caller, input| async move {
        let org = input["org_id"].as_str().unwrap_or_default().to_string();
        if !caller.can_write(&org) {
            return Err(OperationError::forbidden("read-only access"));
        }
        Ok(json!({"id": "dr-9"}))
    });

    registry.register("attachments.link", |caller, input| async move {
        let org = input["org_id"].as_str().unwrap_or_default().to_string();
        if !caller.can_write(&org) {
            return Err(OperationError::forbidden(
                "user u-viewer lacks write on org1",
            ));
        }
        Ok(json!({"ok": true}))
    });

    registry
}

fn text(sender: &str, body: &str) -> InboundMessage {
    InboundMessage::text(WHATSAPP, sender, body)
}

fn document(sender: &str, filename: &str) -> InboundMessage {
    InboundMessage {
        kind: MessageKind::Document,
        media: Some(MediaRef {
            url: format!("https://media.example/{filename}"),
            content_type: Some("application/pdf".into()),
            filename: Some(filename.into()),
        }),
        text: None,
        ..InboundMessage::text(WHATSAPP, sender, "")
    }
}

// ── Identity & workspace ────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_sender_is_quarantined_without_session() {
    let h = Harness::new().await;
    let agent = h.agent();

    let resp = agent.handle_message(&text("+19999", "hello there")).await;

    assert!(!resp.success);
    // The rejection must not imply any account, org, or record exists.
    for word in ["account", "organization", "workspace", "project"] {
        assert!(
            !resp.message.to_lowercase().contains(word),
            "rejection leaked {word:?}: {}",
            resp.message
        );
    }
    assert_eq!(h.session_count().await, 0);

    let quarantined = h.identities.recent_quarantine(10).await.unwrap();
    assert_eq!(quarantined.len(), 1);
    assert_eq!(quarantined[0].identifier, "+19999");
    assert_eq!(quarantined[0].body, "hello there");
}

#[tokio::test]
async fn unverified_sender_is_rejected_without_session() {
    let h = Harness::new().await;
    let agent = h.agent();

    let resp = agent.handle_message(&text("+15550003", "status of p1")).await;

    assert!(!resp.success);
    assert!(resp.message.contains("pending verification"));
    assert_eq!(h.session_count().await, 0);
    // Not quarantined either: the contact is known, just not verified.
    assert!(h.identities.recent_quarantine(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn ambiguous_workspace_is_rejected_without_session() {
    let h = Harness::new().await;
    let agent = h.agent();

    let resp = agent.handle_message(&text("+15550002", "status of p1")).await;

    assert!(!resp.success);
    assert!(resp.message.contains("more than one workspace"));
    assert_eq!(h.session_count().await, 0);
}

#[tokio::test]
async fn switch_command_binds_and_short_circuits() {
    let h = Harness::new().await;
    let agent = h.agent();

    let resp = agent
        .handle_message(&text("+15550002", "switch to Globex Wind"))
        .await;
    assert!(resp.success);
    assert!(resp.message.contains("Globex Wind"));

    // The thread is now bound; ordinary turns work under org2.
    let session = h
        .sessions()
        .peek("u-multi", WHATSAPP, "+15550002")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.org_id, "org2");

    let resp = agent.handle_message(&text("+15550002", "status of p1")).await;
    assert!(resp.success);
    assert_eq!(resp.data.unwrap()["status"], "operational");
}

#[tokio::test]
async fn switch_to_foreign_workspace_is_refused() {
    let h = Harness::new().await;
    let agent = h.agent();

    let resp = agent
        .handle_message(&text("+15550001", "switch to Globex Wind"))
        .await;
    assert!(!resp.success);
    // Only the user's own memberships are consulted; nothing about the
    // target workspace is revealed.
    assert!(!resp.message.contains("Globex"));
}

// ── Confirmation gate ───────────────────────────────────────────────────────

#[tokio::test]
async fn bare_yes_with_nothing_pending_asks_for_clarification() {
    let h = Harness::new().await;
    let agent = h.agent();

    let resp = agent.handle_message(&text("+15550001", "yes")).await;

    assert!(resp.success);
    assert!(resp.message.contains("nothing waiting"));
    assert!(h.work_orders.lock().unwrap().is_empty());
}

#[tokio::test]
async fn mutating_intent_arms_the_gate_without_executing() {
    let h = Harness::new().await;
    let agent = h.agent();

    let resp = agent
        .handle_message(&text("+15550001", "create a work order for inverter repair"))
        .await;

    assert!(resp.success);
    assert!(resp.requires_confirmation);
    assert!(resp.message.contains("\"inverter repair\""));

    // The bridge is not invoked on the turn that produced the prompt.
    assert!(h.work_orders.lock().unwrap().is_empty());
    assert!(h.raw_pending("+15550001").await.is_some());
}

#[tokio::test]
async fn affirmative_executes_exactly_once_with_stored_payload() {
    let h = Harness::new().await;
    let agent = h.agent();

    agent
        .handle_message(&text("+15550001", "create a work order for inverter repair"))
        .await;
    let resp = agent.handle_message(&text("+15550001", "confirm")).await;

    assert!(resp.success);
    assert!(resp.message.contains("wo-123"));

    let calls = h.work_orders.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["description"], "inverter repair");
    assert_eq!(calls[0]["org_id"], "org1");
    drop(calls);

    assert!(h.raw_pending("+15550001").await.is_none());

    // A second "yes" finds nothing to execute.
    let resp = agent.handle_message(&text("+15550001", "yes")).await;
    assert!(resp.message.contains("nothing waiting"));
    assert_eq!(h.work_orders.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn negative_cancels_and_returns_to_no_pending() {
    let h = Harness::new().await;
    let agent = h.agent();

    agent
        .handle_message(&text("+15550001", "create a work order for inverter repair"))
        .await;
    let resp = agent.handle_message(&text("+15550001", "no")).await;

    assert!(resp.success);
    assert!(resp.message.contains("Cancelled"));
    assert!(h.raw_pending("+15550001").await.is_none());
    assert!(h.work_orders.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unrelated_reply_leaves_payload_unchanged_and_reissues_prompt() {
    let h = Harness::new().await;
    let agent = h.agent();

    let armed = agent
        .handle_message(&text("+15550001", "create a work order for inverter repair"))
        .await;
    let payload_before = h.raw_pending("+15550001").await.unwrap();

    let resp = agent
        .handle_message(&text("+15550001", "hmm let me think about it"))
        .await;

    // Byte-for-byte unchanged, same prompt re-issued, nothing executed.
    assert_eq!(h.raw_pending("+15550001").await.unwrap(), payload_before);
    assert!(resp.requires_confirmation);
    assert_eq!(resp.confirmation_prompt, armed.confirmation_prompt);
    assert!(h.work_orders.lock().unwrap().is_empty());
}

#[tokio::test]
async fn pending_action_survives_process_restart() {
    let h = Harness::new().await;

    h.agent()
        .handle_message(&text("+15550001", "create a work order for inverter repair"))
        .await;

    // A fresh agent (new process) sees the pending action from the row.
    let resp = h.agent().handle_message(&text("+15550001", "yes")).await;

    assert!(resp.success);
    assert_eq!(h.work_orders.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn expired_pending_action_is_auto_cancelled() {
    let h = Harness::new().await;
    let agent = h.agent();

    agent
        .handle_message(&text("+15550001", "create a work order for inverter repair"))
        .await;

    // Age the stored action far past the 24h default.
    let stale = h.raw_pending("+15550001").await.unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&stale).unwrap();
    value["created_at_ms"] = json!(1);
    sqlx::query("UPDATE conversation_sessions SET pending_action = ? WHERE identifier = ?")
        .bind(value.to_string())
        .bind("+15550001")
        .execute(&h.pool)
        .await
        .unwrap();

    // A later "yes" must not resolve the stale action.
    let resp = agent.handle_message(&text("+15550001", "yes")).await;

    assert!(resp.message.contains("expired"));
    assert!(h.work_orders.lock().unwrap().is_empty());
    assert!(h.raw_pending("+15550001").await.is_none());
}

// ── Reads and fallback ──────────────────────────────────────────────────────

#[tokio::test]
async fn read_intent_dispatches_directly_and_updates_context() {
    let h = Harness::new().await;
    let agent = h.agent();

    let resp = agent.handle_message(&text("+15550001", "status of p1")).await;

    assert!(resp.success);
    assert_eq!(resp.data.unwrap()["status"], "operational");

    let session = h
        .sessions()
        .peek("u-single", WHATSAPP, "+15550001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.context.last_project_id.as_deref(), Some("p1"));
}

#[tokio::test]
async fn context_pointer_resolves_follow_up_mutation() {
    let h = Harness::new().await;
    let agent = h.agent();

    agent.handle_message(&text("+15550001", "status of p1")).await;
    // "generate a dataroom" carries no project hint; the pointer fills it.
    let resp = agent
        .handle_message(&text("+15550001", "generate a dataroom"))
        .await;

    assert!(resp.requires_confirmation);
    assert!(resp.message.contains("project p1"));
}

#[tokio::test]
async fn unknown_intent_gets_fixed_fallback() {
    let h = Harness::new().await;
    let agent = h.agent();

    let resp = agent
        .handle_message(&text("+15550001", "what a lovely morning"))
        .await;

    assert!(resp.success);
    assert!(resp.message.contains("I didn't catch that"));
}

// ── Attachments ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn document_without_context_stays_unlinked_with_no_pending() {
    let h = Harness::new().await;
    let agent = h.agent();

    let resp = agent
        .handle_message(&document("+15550001", "site-survey.pdf"))
        .await;

    assert!(resp.success);
    assert!(!resp.requires_confirmation);
    assert!(resp.message.contains("which project"));

    // A durable unlinked record exists regardless.
    let att = h.only_attachment().await;
    assert_eq!(att.link_state, LinkState::Unlinked);
    assert!(h.raw_pending("+15550001").await.is_none());
}

#[tokio::test]
async fn document_with_context_defers_link_to_the_gate() {
    let h = Harness::new().await;
    let agent = h.agent();

    agent.handle_message(&text("+15550001", "status of p1")).await;
    let resp = agent
        .handle_message(&document("+15550001", "site-survey.pdf"))
        .await;

    assert!(resp.requires_confirmation);
    assert!(resp.message.contains("project p1"));
    assert_eq!(h.only_attachment().await.link_state, LinkState::LinkPending);

    let resp = agent.handle_message(&text("+15550001", "yes")).await;
    assert!(resp.success);

    let att = h.only_attachment().await;
    assert_eq!(att.link_state, LinkState::Linked);
    assert_eq!(att.linked_kind.as_deref(), Some("project"));
    assert_eq!(att.linked_id.as_deref(), Some("p1"));
}

#[tokio::test]
async fn cancelled_link_releases_the_attachment() {
    let h = Harness::new().await;
    let agent = h.agent();

    agent.handle_message(&text("+15550001", "status of p1")).await;
    agent
        .handle_message(&document("+15550001", "site-survey.pdf"))
        .await;
    let resp = agent.handle_message(&text("+15550001", "no")).await;

    assert!(resp.message.contains("Cancelled"));
    assert_eq!(h.only_attachment().await.link_state, LinkState::Unlinked);
    assert!(h.raw_pending("+15550001").await.is_none());
}

#[tokio::test]
async fn text_initiated_link_uses_last_attachment() {
    let h = Harness::new().await;
    let agent = h.agent();

    // No prior context: the file stays unlinked with an invitation.
    agent
        .handle_message(&document("+15550001", "site-survey.pdf"))
        .await;
    // The user names the target later.
    let resp = agent
        .handle_message(&text("+15550001", "link it to project p1"))
        .await;
    assert!(resp.requires_confirmation);

    let resp = agent.handle_message(&text("+15550001", "yes")).await;
    assert!(resp.success);
    assert_eq!(h.only_attachment().await.link_state, LinkState::Linked);
}

#[tokio::test]
async fn denied_link_reports_safely_and_releases() {
    let h = Harness::new().await;
    let agent = h.agent();

    // Viewer can read project status but cannot write links.
    agent.handle_message(&text("+15550004", "status of p1")).await;
    agent
        .handle_message(&document("+15550004", "invoice.pdf"))
        .await;
    let resp = agent.handle_message(&text("+15550004", "yes")).await;

    assert!(!resp.success);
    // The handler's internal message never surfaces.
    assert!(!resp.message.contains("u-viewer"));
    assert!(!resp.message.contains("org1"));
    assert!(resp.message.contains("permission"));

    assert_eq!(h.only_attachment().await.link_state, LinkState::Unlinked);
}
