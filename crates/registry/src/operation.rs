use serde::{Deserialize, Serialize};

/// Dotted identifier of a registered business operation,
/// e.g. `work_orders.create`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationPath(String);

impl OperationPath {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for OperationPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OperationPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for OperationPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
