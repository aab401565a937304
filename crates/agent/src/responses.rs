//! Canned user-facing text.
//!
//! Security-relevant rejections stay deliberately generic: they never
//! confirm or deny that an account, organization, or record exists.

use {voltaic_common::types::AgentResponse, voltaic_registry::OperationError};

/// Unknown sender. Reveals nothing about accounts or workspaces.
pub(crate) const NOT_LINKED: &str =
    "Sorry, I can't help with this request. If you believe this is an error, \
     please contact your administrator.";

/// Known contact, not yet verified by an administrator.
pub(crate) const PENDING_VERIFICATION: &str =
    "This contact is still pending verification. Please check with your \
     workspace administrator.";

/// Verified user with several workspaces and no binding for this thread.
pub(crate) const AMBIGUOUS_WORKSPACE: &str =
    "You have access to more than one workspace. Tell me which one to use — \
     for example: switch to Acme Solar.";

/// Verified user with no workspace memberships at all.
pub(crate) const NO_WORKSPACE: &str =
    "Your account isn't part of any workspace yet. Please check with your \
     administrator.";

/// Switch command named a workspace this user doesn't belong to.
pub(crate) const UNKNOWN_WORKSPACE: &str =
    "I couldn't find that workspace for your account.";

/// Affirmative/negative reply with nothing armed.
pub(crate) const NOTHING_PENDING: &str =
    "There's nothing waiting for confirmation right now. What would you like \
     to do?";

/// Unknown-intent fallback.
pub(crate) const UNKNOWN_INTENT: &str =
    "I didn't catch that. I can check project status, search documents, \
     summarize diligence, create work orders, or file an attachment you send \
     me.";

pub(crate) const HELP: &str =
    "Here's what I can do: check project status, search documents, summarize \
     diligence, create work orders, generate datarooms, and link files you \
     send me. Nothing changes without your confirmation.";

pub(crate) const WHICH_PROJECT: &str =
    "Which project do you mean? Give me a project name or id.";

pub(crate) const NO_ATTACHMENT: &str =
    "I don't have a file from you to link. Send the file first and I'll take \
     it from there.";

pub(crate) const WHICH_TARGET: &str =
    "Where should I link it? Name a project, dataroom, or document.";

pub(crate) const MEDIA_MISSING: &str =
    "It looks like an attachment was sent, but I couldn't find its content. \
     Please try sending it again.";

pub(crate) const MEDIA_FETCH_FAILED: &str =
    "I couldn't download that file. Please try sending it again.";

pub(crate) const NOT_AUTHENTICATED: &str =
    "I can't verify your access right now. Please contact your administrator.";

pub(crate) const FORBIDDEN: &str =
    "You don't have permission to do that in this workspace.";

pub(crate) const NOT_FOUND: &str =
    "I couldn't find what you're referring to.";

pub(crate) const INVALID_REQUEST: &str =
    "I couldn't process that request as stated. Could you rephrase it?";

pub(crate) const INTERNAL_ERROR: &str =
    "Something went wrong on my side. Nothing was changed — please try again.";

/// Translate an operation failure into safe user-facing text.
///
/// Fixed strings only: handler messages and identifiers stay internal.
pub(crate) fn translate_failure(err: &OperationError) -> AgentResponse {
    let text = match err {
        OperationError::NotAuthenticated => NOT_AUTHENTICATED,
        OperationError::Forbidden { .. } => FORBIDDEN,
        OperationError::NotFound { .. } => NOT_FOUND,
        OperationError::Invalid { .. } => INVALID_REQUEST,
        OperationError::Internal { .. } => INTERNAL_ERROR,
    };
    AgentResponse::failed(text)
}
