use serde::{Deserialize, Serialize};

/// Id-only pointers to the entities most recently discussed on a thread.
///
/// These are references, never snapshots: consumers must re-validate
/// existence and permission against the live operation surface on every
/// use, so revoked access is never silently trusted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextPointers {
    pub last_project_id: Option<String>,
    pub last_site_id: Option<String>,
    pub last_asset_id: Option<String>,
    pub last_document_id: Option<String>,
    pub active_dataroom_id: Option<String>,
    pub active_view_scope_id: Option<String>,
    pub last_attachment_id: Option<String>,
}

impl ContextPointers {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Last-write-wins partial merge: only fields set in the patch overwrite.
    pub fn apply(&mut self, patch: &ContextPatch) {
        if let Some(v) = &patch.project_id {
            self.last_project_id = Some(v.clone());
        }
        if let Some(v) = &patch.site_id {
            self.last_site_id = Some(v.clone());
        }
        if let Some(v) = &patch.asset_id {
            self.last_asset_id = Some(v.clone());
        }
        if let Some(v) = &patch.document_id {
            self.last_document_id = Some(v.clone());
        }
        if let Some(v) = &patch.dataroom_id {
            self.active_dataroom_id = Some(v.clone());
        }
        if let Some(v) = &patch.view_scope_id {
            self.active_view_scope_id = Some(v.clone());
        }
        if let Some(v) = &patch.attachment_id {
            self.last_attachment_id = Some(v.clone());
        }
    }
}

/// Partial update to [`ContextPointers`]. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ContextPatch {
    pub project_id: Option<String>,
    pub site_id: Option<String>,
    pub asset_id: Option<String>,
    pub document_id: Option<String>,
    pub dataroom_id: Option<String>,
    pub view_scope_id: Option<String>,
    pub attachment_id: Option<String>,
}

impl ContextPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.project_id.is_none()
            && self.site_id.is_none()
            && self.asset_id.is_none()
            && self.document_id.is_none()
            && self.dataroom_id.is_none()
            && self.view_scope_id.is_none()
            && self.attachment_id.is_none()
    }

    #[must_use]
    pub fn project(mut self, id: impl Into<String>) -> Self {
        self.project_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn document(mut self, id: impl Into<String>) -> Self {
        self.document_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn attachment(mut self, id: impl Into<String>) -> Self {
        self.attachment_id = Some(id.into());
        self
    }
}
