use serde::{Deserialize, Serialize};

/// The fixed intent set. Anything the classifier returns outside this set
/// collapses to [`Intent::Unknown`] at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ProjectStatus,
    SearchDocuments,
    SummarizeDiligence,
    CreateWorkOrder,
    GenerateDataroom,
    LinkAttachment,
    Help,
    Unknown,
}

impl Intent {
    /// Mutating intents never execute from classification alone; they are
    /// routed through the confirmation gate.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::CreateWorkOrder | Self::GenerateDataroom | Self::LinkAttachment
        )
    }
}

/// Resolved-entity id hints returned by the classifier.
///
/// Hints, not ground truth: every id is re-validated (existence and
/// permission) by the operation bridge before use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityHints {
    pub project_id: Option<String>,
    pub site_id: Option<String>,
    pub asset_id: Option<String>,
    pub document_id: Option<String>,
    pub dataroom_id: Option<String>,
    pub attachment_id: Option<String>,
    /// Free-text payload extracted for the intent (work-order description,
    /// search query, dataroom label).
    pub description: Option<String>,
}

/// One classification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    #[serde(default)]
    pub entities: EntityHints,
    #[serde(default)]
    pub confidence: f32,
}

impl Classification {
    /// The fallback result used whenever the classifier fails, times out,
    /// or returns something unparseable.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            intent: Intent::Unknown,
            entities: EntityHints::default(),
            confidence: 0.0,
        }
    }

    /// Validate loosely-typed classifier output into the typed union.
    ///
    /// Tolerant on purpose: an unrecognized intent string becomes
    /// [`Intent::Unknown`], malformed hints are dropped, confidence is
    /// clamped into [0, 1]. This never fails.
    #[must_use]
    pub fn from_value(value: serde_json::Value) -> Self {
        let intent = value
            .get("intent")
            .cloned()
            .and_then(|v| serde_json::from_value::<Intent>(v).ok())
            .unwrap_or(Intent::Unknown);
        let entities = value
            .get("entities")
            .cloned()
            .and_then(|v| serde_json::from_value::<EntityHints>(v).ok())
            .unwrap_or_default();
        let confidence = value
            .get("confidence")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0)
            .clamp(0.0, 1.0) as f32;
        Self {
            intent,
            entities,
            confidence,
        }
    }
}
