//! The confirmation gate.
//!
//! Messaging channels are asynchronous, forwardable, and screenshot-able.
//! No mutation ever runs off automatic classification: the requested effect
//! is persisted as a pending action, restated in plain language, and only an
//! explicit affirmative reply on a later turn dispatches it. The pending
//! action is cleared atomically with being read, so a crash mid-execution
//! cannot leave a stale action waiting to be re-confirmed.

use {
    serde_json::json,
    tracing::{info, warn},
    voltaic_common::types::{AgentResponse, InboundMessage},
    voltaic_registry::ExecutionOutcome,
    voltaic_sessions::{ContextPatch, ConversationSession, PendingAction},
};

use crate::{
    error::Result,
    responses,
    turn::{Agent, ops},
};

/// Fixed affirmative word set. A reply must match one of these exactly
/// (after trimming and punctuation stripping) to resolve a pending action.
const AFFIRMATIVE: &[&str] = &[
    "yes", "y", "yeah", "yep", "confirm", "confirmed", "ok", "okay", "sure", "go ahead", "do it",
    "approve", "approved",
];

/// Fixed negative word set.
const NEGATIVE: &[&str] = &[
    "no", "n", "nope", "cancel", "stop", "don't", "dont", "abort", "never mind", "nevermind",
    "reject",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReplyKind {
    Affirmative,
    Negative,
    Unrelated,
}

/// Classify a reply against the fixed word sets.
///
/// Whole-message match only: "yes please go wild" is Unrelated, not
/// Affirmative. Ambiguity is never resolved by assumption.
pub(crate) fn classify_reply(text: &str) -> ReplyKind {
    let normalized = text
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .trim()
        .to_lowercase();
    if AFFIRMATIVE.contains(&normalized.as_str()) {
        ReplyKind::Affirmative
    } else if NEGATIVE.contains(&normalized.as_str()) {
        ReplyKind::Negative
    } else {
        ReplyKind::Unrelated
    }
}

/// The prompt attached to a confirmation request. Deterministic per action,
/// so an unrelated reply re-issues exactly the same prompt.
pub(crate) fn confirm_prompt(description: &str) -> String {
    format!("Reply yes to {description}, or no to cancel.")
}

/// Handle a turn that arrived while a pending action is armed.
pub(crate) async fn resolve_pending(
    agent: &Agent,
    session: &ConversationSession,
    msg: &InboundMessage,
) -> Result<AgentResponse> {
    let Some(stored) = &session.pending else {
        return Ok(AgentResponse::ok(responses::NOTHING_PENDING));
    };
    let description = stored.action.describe();

    match classify_reply(msg.text_body()) {
        ReplyKind::Unrelated => {
            // State untouched; re-issue the same prompt.
            Ok(AgentResponse::confirm(
                format!("I still need a yes or no before I {description}."),
                confirm_prompt(&description),
            ))
        },
        ReplyKind::Negative => {
            agent.sessions.clear_pending_action(&session.id).await?;
            if let PendingAction::LinkAttachment { attachment_id, .. } = &stored.action
                && let Err(e) = agent.attachments.release_link(attachment_id).await
            {
                warn!(%attachment_id, error = %e, "failed to release cancelled link");
            }
            info!(session_id = %session.id, "pending action cancelled by user");
            Ok(AgentResponse::ok(format!("Cancelled — I won't {description}.")))
        },
        ReplyKind::Affirmative => {
            // Cleared before dispatch: the row no longer holds the action
            // when the operation runs.
            let Some(taken) = agent.sessions.take_pending_action(&session.id).await? else {
                return Ok(AgentResponse::ok(responses::NOTHING_PENDING));
            };
            info!(session_id = %session.id, "pending action confirmed, dispatching");
            execute_action(agent, session, taken.action).await
        },
    }
}

/// Dispatch a confirmed action to the operation bridge under its original
/// action type.
async fn execute_action(
    agent: &Agent,
    session: &ConversationSession,
    action: PendingAction,
) -> Result<AgentResponse> {
    match action {
        PendingAction::CreateWorkOrder {
            org_id,
            project_id,
            asset_id,
            description,
        } => {
            let input = json!({
                "org_id": org_id,
                "project_id": project_id,
                "asset_id": asset_id,
                "description": description,
            });
            let outcome = agent
                .registry
                .execute_with_rbac(&session.user_id, ops::WORK_ORDER_CREATE, input)
                .await;
            Ok(report_created(outcome, "work order"))
        },
        PendingAction::GenerateDataroom {
            org_id,
            project_id,
            label,
        } => {
            let input = json!({
                "org_id": org_id,
                "project_id": project_id,
                "label": label,
            });
            let outcome = agent
                .registry
                .execute_with_rbac(&session.user_id, ops::DATAROOM_GENERATE, input)
                .await;
            if let ExecutionOutcome::Success(data) = &outcome
                && let Some(id) = data.get("id").and_then(serde_json::Value::as_str)
            {
                let patch = ContextPatch {
                    dataroom_id: Some(id.to_string()),
                    ..Default::default()
                };
                agent.sessions.update_context(&session.id, &patch).await?;
            }
            Ok(report_created(outcome, "dataroom"))
        },
        PendingAction::LinkAttachment {
            attachment_id,
            target,
        } => {
            let input = json!({
                "org_id": session.org_id,
                "attachment_id": attachment_id,
                "target_kind": target.kind.as_str(),
                "target_id": target.id,
            });
            let outcome = agent
                .registry
                .execute_with_rbac(&session.user_id, ops::ATTACHMENT_LINK, input)
                .await;
            match outcome {
                ExecutionOutcome::Success(data) => {
                    agent
                        .attachments
                        .complete_link(&attachment_id, target.kind.as_str(), &target.id)
                        .await?;
                    Ok(AgentResponse::ok(format!("Done — linked to {target}.")).with_data(data))
                },
                ExecutionOutcome::Failure(err) => {
                    // The link didn't happen; free the attachment so the
                    // user can try a different target.
                    if let Err(e) = agent.attachments.release_link(&attachment_id).await {
                        warn!(%attachment_id, error = %e, "failed to release denied link");
                    }
                    Ok(responses::translate_failure(&err))
                },
            }
        },
    }
}

fn report_created(outcome: ExecutionOutcome, noun: &str) -> AgentResponse {
    match outcome {
        ExecutionOutcome::Success(data) => {
            let message = match data.get("id").and_then(serde_json::Value::as_str) {
                Some(id) => format!("Done — {noun} {id} created."),
                None => format!("Done — {noun} created."),
            };
            AgentResponse::ok(message).with_data(data)
        },
        ExecutionOutcome::Failure(err) => responses::translate_failure(&err),
    }
}
