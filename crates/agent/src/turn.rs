//! One inbound message, one turn.
//!
//! Control flow: identity → workspace switch short-circuit → workspace
//! binding → session (under the per-session lock) → confirmation gate if an
//! action is pending, else attachment intake for media, else classification.
//! Every failure is caught at the turn boundary and converted into a safe
//! outbound response; session state is left exactly as before a failing
//! turn.

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use {
    serde_json::json,
    tracing::{debug, error, info, warn},
    voltaic_classifier::{ClassifierHandle, EntityHints, Intent},
    voltaic_common::types::{AgentResponse, InboundMessage},
    voltaic_config::AgentConfig,
    voltaic_identity::IdentityDirectory,
    voltaic_media::{BlobStore, LinkState, MediaFetcher, SqliteAttachmentStore},
    voltaic_registry::{ExecutionOutcome, OperationRegistry, UserDirectory, UserRecord},
    voltaic_sessions::{
        ContextPatch, ConversationSession, EntityKind, EntityRef, PendingAction, SessionLocks,
        SqliteSessionStore, StoredPendingAction, TranscriptLog,
    },
};

use crate::{
    binder,
    error::{Error, Result},
    gate::{self, ReplyKind},
    intake, responses, summary,
};

/// Operation paths the agent dispatches to. Validated against the registry
/// at construction, so a missing handler fails at startup rather than
/// mid-conversation.
pub mod ops {
    pub const PROJECT_STATUS: &str = "projects.status";
    pub const DOCUMENT_SEARCH: &str = "documents.search";
    pub const DILIGENCE_SUMMARY: &str = "diligence.summary";
    pub const WORK_ORDER_CREATE: &str = "work_orders.create";
    pub const DATAROOM_GENERATE: &str = "datarooms.generate";
    pub const ATTACHMENT_LINK: &str = "attachments.link";

    pub const REQUIRED: &[&str] = &[
        PROJECT_STATUS,
        DOCUMENT_SEARCH,
        DILIGENCE_SUMMARY,
        WORK_ORDER_CREATE,
        DATAROOM_GENERATE,
        ATTACHMENT_LINK,
    ];
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Everything the agent needs, supplied explicitly at construction.
pub struct AgentDeps {
    pub identities: Arc<dyn IdentityDirectory>,
    pub users: Arc<dyn UserDirectory>,
    pub registry: Arc<OperationRegistry>,
    pub classifier: ClassifierHandle,
    pub sessions: SqliteSessionStore,
    pub locks: SessionLocks,
    pub transcript: TranscriptLog,
    pub attachments: SqliteAttachmentStore,
    pub blobs: Arc<dyn BlobStore>,
    pub fetcher: Arc<dyn MediaFetcher>,
}

/// The conversational agent.
pub struct Agent {
    pub(crate) identities: Arc<dyn IdentityDirectory>,
    pub(crate) users: Arc<dyn UserDirectory>,
    pub(crate) registry: Arc<OperationRegistry>,
    pub(crate) classifier: ClassifierHandle,
    pub(crate) sessions: SqliteSessionStore,
    pub(crate) locks: SessionLocks,
    pub(crate) transcript: TranscriptLog,
    pub(crate) attachments: SqliteAttachmentStore,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) fetcher: Arc<dyn MediaFetcher>,
    pub(crate) pending_max_age: Duration,
}

impl Agent {
    /// Build the agent, validating that every operation path it dispatches
    /// to is actually registered.
    pub fn new(
        deps: AgentDeps,
        config: &AgentConfig,
    ) -> std::result::Result<Self, voltaic_registry::Error> {
        deps.registry.validate(ops::REQUIRED)?;
        Ok(Self {
            identities: deps.identities,
            users: deps.users,
            registry: deps.registry,
            classifier: deps.classifier,
            sessions: deps.sessions,
            locks: deps.locks,
            transcript: deps.transcript,
            attachments: deps.attachments,
            blobs: deps.blobs,
            fetcher: deps.fetcher,
            pending_max_age: Duration::from_secs(config.pending_max_age_secs),
        })
    }

    /// Process one inbound message. Never fails outward: internal errors
    /// become a generic apology and are logged here.
    pub async fn handle_message(&self, msg: &InboundMessage) -> AgentResponse {
        match self.process_turn(msg).await {
            Ok(response) => response,
            Err(e) => {
                error!(channel = %msg.channel, error = %e, "turn failed");
                AgentResponse::failed(responses::INTERNAL_ERROR)
            },
        }
    }

    async fn process_turn(&self, msg: &InboundMessage) -> Result<AgentResponse> {
        // Who is speaking? Exact match or nothing.
        let Some(identity) = self.identities.resolve(msg.channel, &msg.sender).await? else {
            self.identities
                .record_first_contact(msg.channel, &msg.sender, msg.sender_name.as_deref())
                .await?;
            self.identities
                .quarantine(msg.channel, &msg.sender, msg.text_body())
                .await?;
            info!(channel = %msg.channel, "quarantined message from unrecognized sender");
            return Ok(AgentResponse::failed(responses::NOT_LINKED));
        };
        if !identity.verified {
            return Ok(AgentResponse::failed(responses::PENDING_VERIFICATION));
        }
        let Some(user_id) = identity.user_id else {
            return Ok(AgentResponse::failed(responses::PENDING_VERIFICATION));
        };

        let Some(user) = self.users.load_user(&user_id).await? else {
            warn!(%user_id, "verified identity points at a missing user record");
            return Ok(AgentResponse::failed(responses::PENDING_VERIFICATION));
        };

        // Explicit workspace switches short-circuit the rest of the turn.
        if let Some(target) = msg.text.as_deref().and_then(binder::parse_switch_command) {
            return self.handle_switch(&user, msg, target).await;
        }

        // Bind the workspace. Never guess under ambiguity.
        let thread_id = msg.thread_key().to_string();
        let existing = self.sessions.peek(&user.id, msg.channel, &thread_id).await?;
        let Some(org_id) = binder::resolve_binding(&user, existing.as_ref()) else {
            return Ok(if user.memberships.is_empty() {
                AgentResponse::failed(responses::NO_WORKSPACE)
            } else {
                AgentResponse::failed(responses::AMBIGUOUS_WORKSPACE)
            });
        };

        let session = self
            .sessions
            .ensure(&user.id, &org_id, msg.channel, &msg.sender, &thread_id)
            .await?;
        let key = session.key();

        // Critical section: one turn at a time per session.
        let lock = self.locks.lock_for(&key);
        let _guard = lock.lock().await;

        // Re-read under the lock; another turn may have run since `ensure`.
        let mut session = self
            .sessions
            .get(&session.id)
            .await?
            .ok_or_else(|| Error::message("session disappeared mid-turn"))?;

        self.transcript
            .append(
                &key,
                &json!({
                    "ts": now_ms(),
                    "direction": "inbound",
                    "kind": msg.kind,
                    "body": msg.text_body(),
                }),
            )
            .await?;

        // Expire a stale pending action before anything can match it.
        let mut note = None;
        if let Some(stored) = &session.pending
            && self.is_expired(stored)
        {
            self.cancel_stale(&session, stored).await?;
            note = Some(format!(
                "Your earlier request to {} expired, so I've cancelled it.",
                stored.action.describe()
            ));
            session.pending = None;
        }

        let mut response = if session.pending.is_some() {
            gate::resolve_pending(self, &session, msg).await?
        } else if msg.kind.is_media() || msg.media.is_some() {
            intake::handle_media(self, &session, msg).await?
        } else if gate::classify_reply(msg.text_body()) != ReplyKind::Unrelated {
            // A bare yes/no with nothing armed gets a clarification, not a
            // classifier round-trip.
            AgentResponse::ok(responses::NOTHING_PENDING)
        } else {
            self.classify_and_dispatch(&session, msg).await?
        };

        if let Some(note) = note {
            response.message = format!("{note} {}", response.message);
        }

        self.transcript
            .append(
                &key,
                &json!({
                    "ts": now_ms(),
                    "direction": "outbound",
                    "success": response.success,
                    "body": response.message,
                }),
            )
            .await?;

        Ok(response)
    }

    async fn handle_switch(
        &self,
        user: &UserRecord,
        msg: &InboundMessage,
        target: &str,
    ) -> Result<AgentResponse> {
        let Some(membership) = binder::match_org(user, target) else {
            return Ok(AgentResponse::failed(responses::UNKNOWN_WORKSPACE));
        };

        let session = self
            .sessions
            .ensure(
                &user.id,
                &membership.org_id,
                msg.channel,
                &msg.sender,
                msg.thread_key(),
            )
            .await?;
        if session.org_id != membership.org_id {
            self.sessions
                .rebind_org(&session.id, &membership.org_id)
                .await?;
        }

        let label = membership
            .org_name
            .clone()
            .unwrap_or_else(|| membership.org_id.clone());
        info!(user_id = %user.id, org_id = %membership.org_id, "workspace switched");
        Ok(AgentResponse::ok(format!("Switched to workspace {label}.")))
    }

    fn is_expired(&self, stored: &StoredPendingAction) -> bool {
        // A zero max age disables expiry.
        !self.pending_max_age.is_zero()
            && now_ms() >= stored.created_at_ms + self.pending_max_age.as_millis() as u64
    }

    async fn cancel_stale(
        &self,
        session: &ConversationSession,
        stored: &StoredPendingAction,
    ) -> Result<()> {
        self.sessions.clear_pending_action(&session.id).await?;
        if let PendingAction::LinkAttachment { attachment_id, .. } = &stored.action
            && let Err(e) = self.attachments.release_link(attachment_id).await
        {
            warn!(%attachment_id, error = %e, "failed to release expired link");
        }
        info!(session_id = %session.id, "expired pending action auto-cancelled");
        Ok(())
    }

    /// Classify free text and dispatch. Read intents go straight to the
    /// bridge; mutating intents only arm the confirmation gate.
    async fn classify_and_dispatch(
        &self,
        session: &ConversationSession,
        msg: &InboundMessage,
    ) -> Result<AgentResponse> {
        let context_summary = summary::context_summary(&session.context);
        let classification = self
            .classifier
            .classify_or_fallback(msg.text_body(), &context_summary)
            .await;
        debug!(
            intent = ?classification.intent,
            confidence = f64::from(classification.confidence),
            "classified inbound message"
        );
        let hints = classification.entities;

        match classification.intent {
            Intent::Unknown => Ok(AgentResponse::ok(responses::UNKNOWN_INTENT)),
            Intent::Help => Ok(AgentResponse::ok(responses::HELP)),

            Intent::ProjectStatus => {
                let Some(project_id) = hints
                    .project_id
                    .clone()
                    .or_else(|| session.context.last_project_id.clone())
                else {
                    return Ok(AgentResponse::ok(responses::WHICH_PROJECT));
                };
                let outcome = self
                    .registry
                    .execute_with_rbac(
                        &session.user_id,
                        ops::PROJECT_STATUS,
                        json!({"org_id": session.org_id, "project_id": project_id}),
                    )
                    .await;
                match outcome {
                    ExecutionOutcome::Success(data) => {
                        self.sessions
                            .update_context(
                                &session.id,
                                &ContextPatch::default().project(project_id.clone()),
                            )
                            .await?;
                        Ok(AgentResponse::ok(format!(
                            "Here's the latest on project {project_id}."
                        ))
                        .with_data(data))
                    },
                    ExecutionOutcome::Failure(err) => Ok(responses::translate_failure(&err)),
                }
            },

            Intent::SearchDocuments => {
                let query = hints
                    .description
                    .clone()
                    .unwrap_or_else(|| msg.text_body().to_string());
                let outcome = self
                    .registry
                    .execute_with_rbac(
                        &session.user_id,
                        ops::DOCUMENT_SEARCH,
                        json!({"org_id": session.org_id, "query": query}),
                    )
                    .await;
                match outcome {
                    ExecutionOutcome::Success(data) => Ok(AgentResponse::ok(format!(
                        "Here's what I found for \"{query}\"."
                    ))
                    .with_data(data)),
                    ExecutionOutcome::Failure(err) => Ok(responses::translate_failure(&err)),
                }
            },

            Intent::SummarizeDiligence => {
                let project_id = hints
                    .project_id
                    .clone()
                    .or_else(|| session.context.last_project_id.clone());
                let outcome = self
                    .registry
                    .execute_with_rbac(
                        &session.user_id,
                        ops::DILIGENCE_SUMMARY,
                        json!({"org_id": session.org_id, "project_id": project_id}),
                    )
                    .await;
                match outcome {
                    ExecutionOutcome::Success(data) => {
                        Ok(AgentResponse::ok("Here's the diligence summary.").with_data(data))
                    },
                    ExecutionOutcome::Failure(err) => Ok(responses::translate_failure(&err)),
                }
            },

            Intent::CreateWorkOrder => {
                let description = hints
                    .description
                    .clone()
                    .unwrap_or_else(|| msg.text_body().to_string());
                let action = PendingAction::CreateWorkOrder {
                    org_id: session.org_id.clone(),
                    project_id: hints
                        .project_id
                        .clone()
                        .or_else(|| session.context.last_project_id.clone()),
                    asset_id: hints
                        .asset_id
                        .clone()
                        .or_else(|| session.context.last_asset_id.clone()),
                    description,
                };
                self.arm(session, action).await
            },

            Intent::GenerateDataroom => {
                let Some(project_id) = hints
                    .project_id
                    .clone()
                    .or_else(|| session.context.last_project_id.clone())
                else {
                    return Ok(AgentResponse::ok(responses::WHICH_PROJECT));
                };
                let action = PendingAction::GenerateDataroom {
                    org_id: session.org_id.clone(),
                    project_id,
                    label: hints.description.clone(),
                };
                self.arm(session, action).await
            },

            Intent::LinkAttachment => {
                let Some(attachment_id) = hints
                    .attachment_id
                    .clone()
                    .or_else(|| session.context.last_attachment_id.clone())
                else {
                    return Ok(AgentResponse::ok(responses::NO_ATTACHMENT));
                };
                let Some(target) = target_from_hints(&hints) else {
                    return Ok(AgentResponse::ok(responses::WHICH_TARGET));
                };
                let Some(attachment) = self.attachments.get(&attachment_id).await? else {
                    return Ok(AgentResponse::ok(responses::NO_ATTACHMENT));
                };
                if attachment.link_state != LinkState::Unlinked
                    || !self.attachments.mark_link_pending(&attachment.id).await?
                {
                    return Ok(AgentResponse::ok(
                        "That file is already linked or awaiting confirmation.",
                    ));
                }
                let action = PendingAction::LinkAttachment {
                    attachment_id: attachment.id.clone(),
                    target,
                };
                self.arm(session, action).await
            },
        }
    }

    /// Arm the confirmation gate: persist the action and restate its effect.
    /// No side effect happens here.
    async fn arm(
        &self,
        session: &ConversationSession,
        action: PendingAction,
    ) -> Result<AgentResponse> {
        let description = action.describe();
        self.sessions.set_pending_action(&session.id, &action).await?;
        info!(session_id = %session.id, "pending action armed, awaiting confirmation");
        Ok(AgentResponse::confirm(
            format!("Before I do anything: I can {description}."),
            gate::confirm_prompt(&description),
        ))
    }
}

/// Link target from classifier hints, most specific container first.
fn target_from_hints(hints: &EntityHints) -> Option<EntityRef> {
    if let Some(p) = &hints.project_id {
        return Some(EntityRef::new(EntityKind::Project, p));
    }
    if let Some(d) = &hints.dataroom_id {
        return Some(EntityRef::new(EntityKind::Dataroom, d));
    }
    if let Some(d) = &hints.document_id {
        return Some(EntityRef::new(EntityKind::Document, d));
    }
    None
}
