use async_trait::async_trait;

use crate::{
    client::IntentClassifier,
    intent::{Classification, EntityHints, Intent},
};

/// Deterministic keyword-table classifier for development and tests.
///
/// Production deployments talk to the real classifier service; this one
/// exists so the agent can be driven locally without network access.
#[derive(Debug, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn classify_text(text: &str) -> Classification {
        let lower = text.to_lowercase();
        let mut entities = EntityHints::default();

        let intent = if lower.contains("work order") {
            entities.description = Some(
                lower
                    .split_once("work order for ")
                    .map(|(_, rest)| rest.trim().to_string())
                    .unwrap_or_else(|| text.trim().to_string()),
            );
            Intent::CreateWorkOrder
        } else if lower.contains("dataroom") || lower.contains("data room") {
            if lower.contains("generate") || lower.contains("create") || lower.contains("build") {
                Intent::GenerateDataroom
            } else {
                Intent::SummarizeDiligence
            }
        } else if lower.contains("link") || lower.contains("attach") {
            Intent::LinkAttachment
        } else if lower.contains("status") || lower.contains("how is") {
            Intent::ProjectStatus
        } else if lower.contains("search") || lower.contains("find") {
            entities.description = Some(
                lower
                    .split_once("search for ")
                    .or_else(|| lower.split_once("find "))
                    .map(|(_, rest)| rest.trim().to_string())
                    .unwrap_or_else(|| text.trim().to_string()),
            );
            Intent::SearchDocuments
        } else if lower.contains("diligence") {
            Intent::SummarizeDiligence
        } else if lower.contains("help") || lower == "?" {
            Intent::Help
        } else {
            Intent::Unknown
        };

        let confidence = if intent == Intent::Unknown { 0.0 } else { 0.6 };
        Classification {
            intent,
            entities,
            confidence,
        }
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, text: &str, _context_summary: &str) -> anyhow::Result<Classification> {
        Ok(Self::classify_text(text))
    }
}
