//! Attachment intake.
//!
//! Durability precedes any linking decision: the bytes and an `unlinked`
//! record are persisted first, unconditionally. Linking only ever happens
//! through the confirmation gate; context pointers merely shape the
//! suggestion and the prompt wording, never the need to confirm.

use {
    tracing::{info, warn},
    voltaic_common::types::{AgentResponse, InboundMessage},
    voltaic_media::storage_key_for,
    voltaic_sessions::{
        ContextPatch, ContextPointers, ConversationSession, EntityKind, EntityRef, PendingAction,
    },
};

use crate::{
    error::{Error, Result},
    gate, responses,
    turn::Agent,
};

/// Suggested link target from the session's context pointers, with a coarse
/// confidence: a project or active dataroom is a strong suggestion, a
/// recently discussed document is a weak one.
fn suggest_target(ctx: &ContextPointers) -> Option<(EntityRef, bool)> {
    if let Some(p) = &ctx.last_project_id {
        return Some((EntityRef::new(EntityKind::Project, p), true));
    }
    if let Some(d) = &ctx.active_dataroom_id {
        return Some((EntityRef::new(EntityKind::Dataroom, d), true));
    }
    if let Some(d) = &ctx.last_document_id {
        return Some((EntityRef::new(EntityKind::Document, d), false));
    }
    None
}

/// Handle an inbound binary.
pub(crate) async fn handle_media(
    agent: &Agent,
    session: &ConversationSession,
    msg: &InboundMessage,
) -> Result<AgentResponse> {
    let Some(media) = &msg.media else {
        return Ok(AgentResponse::failed(responses::MEDIA_MISSING));
    };

    let bytes = match agent.fetcher.fetch(media).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(url = %media.url, error = %e, "failed to fetch inbound media");
            return Ok(AgentResponse::failed(responses::MEDIA_FETCH_FAILED));
        },
    };

    let filename = media.filename.as_deref().unwrap_or("attachment.bin");
    let key = storage_key_for(filename);
    agent.blobs.put(&key, &bytes).await?;
    let attachment = agent
        .attachments
        .insert_unlinked(
            &key,
            media.content_type.as_deref(),
            media.filename.as_deref(),
            msg.channel,
        )
        .await?;

    info!(
        attachment_id = %attachment.id,
        filename,
        size = bytes.len() as u64,
        "attachment ingested"
    );

    // Point the thread at this file so a later "link it to X" can find it.
    agent
        .sessions
        .update_context(
            &session.id,
            &ContextPatch::default().attachment(&attachment.id),
        )
        .await?;

    match suggest_target(&session.context) {
        Some((target, confident)) => {
            if !agent.attachments.mark_link_pending(&attachment.id).await? {
                return Err(Error::message("fresh attachment was not unlinked"));
            }
            let action = PendingAction::LinkAttachment {
                attachment_id: attachment.id.clone(),
                target: target.clone(),
            };
            let description = action.describe();
            agent.sessions.set_pending_action(&session.id, &action).await?;

            // Confidence changes the wording, never the need to confirm.
            let message = if confident {
                format!("Got {filename}. I'll attach it to {target}.")
            } else {
                format!("Got {filename}. It might belong with {target}.")
            };
            Ok(AgentResponse::confirm(
                message,
                gate::confirm_prompt(&description),
            ))
        },
        None => Ok(AgentResponse::ok(format!(
            "Got {filename} — it's saved, but not attached to anything yet. \
             Tell me which project or dataroom it belongs to and I'll link it.",
        ))),
    }
}
