use serde::{Deserialize, Serialize};

/// Kind of business entity a pointer or link target refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Site,
    Asset,
    Document,
    Dataroom,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Site => "site",
            Self::Asset => "asset",
            Self::Document => "document",
            Self::Dataroom => "dataroom",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed reference to a business entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    #[must_use]
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// A mutation that has been requested but not yet confirmed.
///
/// The payload is complete: once confirmed it can be executed without
/// re-deriving anything from the original message text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PendingAction {
    CreateWorkOrder {
        org_id: String,
        project_id: Option<String>,
        asset_id: Option<String>,
        description: String,
    },
    GenerateDataroom {
        org_id: String,
        project_id: String,
        label: Option<String>,
    },
    LinkAttachment {
        attachment_id: String,
        target: EntityRef,
    },
}

impl PendingAction {
    /// Plain-language restatement of the concrete effect, used verbatim in
    /// the confirmation prompt.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::CreateWorkOrder {
                description,
                project_id,
                ..
            } => match project_id {
                Some(p) => format!("create a work order on project {p}: \"{description}\""),
                None => format!("create a work order: \"{description}\""),
            },
            Self::GenerateDataroom {
                project_id, label, ..
            } => match label {
                Some(l) => format!("generate dataroom \"{l}\" for project {project_id}"),
                None => format!("generate a dataroom for project {project_id}"),
            },
            Self::LinkAttachment { target, .. } => {
                format!("link the uploaded file to {target}")
            },
        }
    }
}

/// A pending action as persisted in the session row, with its arming time
/// so stale actions can be expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPendingAction {
    pub action: PendingAction,
    pub created_at_ms: u64,
}
