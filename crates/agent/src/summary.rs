//! Natural-language context summary handed to the classifier.
//!
//! Built from id-only pointers; nothing here is a snapshot of entity data.

use voltaic_sessions::ContextPointers;

pub(crate) fn context_summary(ctx: &ContextPointers) -> String {
    if ctx.is_empty() {
        return "No prior context for this conversation.".to_string();
    }

    let mut recent = Vec::new();
    if let Some(p) = &ctx.last_project_id {
        recent.push(format!("project {p}"));
    }
    if let Some(s) = &ctx.last_site_id {
        recent.push(format!("site {s}"));
    }
    if let Some(a) = &ctx.last_asset_id {
        recent.push(format!("asset {a}"));
    }
    if let Some(d) = &ctx.last_document_id {
        recent.push(format!("document {d}"));
    }

    let mut parts = Vec::new();
    if !recent.is_empty() {
        parts.push(format!("Recently discussed: {}.", recent.join(", ")));
    }
    if let Some(d) = &ctx.active_dataroom_id {
        parts.push(format!("Active dataroom: {d}."));
    }
    if let Some(v) = &ctx.active_view_scope_id {
        parts.push(format!("Active view scope: {v}."));
    }
    if ctx.last_attachment_id.is_some() {
        parts.push("An uploaded file is available to link.".to_string());
    }
    parts.join(" ")
}
