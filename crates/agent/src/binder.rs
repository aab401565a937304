//! Workspace binding.
//!
//! Which organization governs this turn? An explicit switch command wins;
//! otherwise the thread's existing binding, then a sole membership. With
//! several memberships and no binding the turn is rejected, because guessing a
//! tenant would risk cross-tenant exposure.

use {
    voltaic_registry::{OrgMembership, UserRecord},
    voltaic_sessions::ConversationSession,
};

/// Switch-command prefixes, checked case-insensitively.
const SWITCH_PREFIXES: &[&str] = &["switch to ", "use workspace ", "workspace "];

/// Recognize an explicit workspace-switch command and extract the target.
pub(crate) fn parse_switch_command(text: &str) -> Option<&str> {
    let t = text.trim();
    for prefix in SWITCH_PREFIXES {
        if let Some(head) = t.get(..prefix.len())
            && head.eq_ignore_ascii_case(prefix)
        {
            let rest = t[prefix.len()..].trim();
            if !rest.is_empty() {
                return Some(rest);
            }
        }
    }
    None
}

/// Resolve the workspace for this turn without guessing.
///
/// `None` means no binding could be derived: the caller distinguishes
/// "no memberships" from "ambiguous" for the rejection text.
pub(crate) fn resolve_binding(
    user: &UserRecord,
    existing: Option<&ConversationSession>,
) -> Option<String> {
    if let Some(session) = existing {
        return Some(session.org_id.clone());
    }
    match user.memberships.as_slice() {
        [only] => Some(only.org_id.clone()),
        _ => None,
    }
}

/// Match a switch-command target against the user's own memberships,
/// by organization id or name (case-insensitive).
pub(crate) fn match_org<'a>(user: &'a UserRecord, name: &str) -> Option<&'a OrgMembership> {
    let needle = name.trim();
    user.memberships.iter().find(|m| {
        m.org_id.eq_ignore_ascii_case(needle)
            || m.org_name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(needle))
    })
}
