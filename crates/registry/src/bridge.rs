use std::{collections::HashMap, sync::Arc};

use {
    async_trait::async_trait,
    futures::future::BoxFuture,
    serde::{Deserialize, Serialize},
    tracing::{error, warn},
};

use crate::{
    error::{Error, OperationError, Result},
    operation::OperationPath,
};

/// Role of a user within one organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Member,
    Admin,
}

/// One organization membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgMembership {
    pub org_id: String,
    #[serde(default)]
    pub org_name: Option<String>,
    pub role: Role,
}

/// A user record as loaded from the business user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub default_org_id: Option<String>,
    pub memberships: Vec<OrgMembership>,
    pub active: bool,
}

/// Source of truth for user records. The bridge reloads through this on
/// every call; there is no cross-turn caching of users or permissions.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn load_user(&self, user_id: &str) -> anyhow::Result<Option<UserRecord>>;
}

/// In-memory user directory for tests and the development harness.
#[derive(Default)]
pub struct StaticUserDirectory {
    users: HashMap<String, UserRecord>,
}

impl StaticUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, user: UserRecord) {
        self.users.insert(user.id.clone(), user);
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn load_user(&self, user_id: &str) -> anyhow::Result<Option<UserRecord>> {
        Ok(self.users.get(user_id).cloned())
    }
}

/// Authorization context for one invocation, rebuilt fresh every time.
///
/// Handlers receive this and enforce their own checks against it; the
/// bridge grants nothing beyond what the loaded user actually has.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub memberships: Vec<OrgMembership>,
}

impl Caller {
    #[must_use]
    pub fn role_in(&self, org_id: &str) -> Option<Role> {
        self.memberships
            .iter()
            .find(|m| m.org_id == org_id)
            .map(|m| m.role)
    }

    #[must_use]
    pub fn can_read(&self, org_id: &str) -> bool {
        self.role_in(org_id).is_some()
    }

    #[must_use]
    pub fn can_write(&self, org_id: &str) -> bool {
        matches!(self.role_in(org_id), Some(Role::Member | Role::Admin))
    }
}

/// Result of one bridged invocation.
#[derive(Debug)]
pub enum ExecutionOutcome {
    Success(serde_json::Value),
    Failure(OperationError),
}

impl ExecutionOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn data(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Success(data) => Some(data),
            Self::Failure(_) => None,
        }
    }
}

type HandlerFuture = BoxFuture<'static, std::result::Result<serde_json::Value, OperationError>>;
type OperationHandler = Arc<dyn Fn(Caller, serde_json::Value) -> HandlerFuture + Send + Sync>;

/// Typed map from operation paths to handler closures.
///
/// Built once at startup; [`OperationRegistry::validate`] fails fast if any
/// path the agent references is missing, so there is no unchecked dynamic
/// dispatch at message time.
pub struct OperationRegistry {
    users: Arc<dyn UserDirectory>,
    handlers: HashMap<OperationPath, OperationHandler>,
}

impl OperationRegistry {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self {
            users,
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under a path.
    pub fn register<F, Fut>(&mut self, path: &str, handler: F)
    where
        F: Fn(Caller, serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<serde_json::Value, OperationError>>
            + Send
            + 'static,
    {
        self.handlers.insert(
            OperationPath::new(path),
            Arc::new(move |caller, input| Box::pin(handler(caller, input))),
        );
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.handlers.contains_key(path)
    }

    /// Startup validation: every path in `required` must be registered.
    pub fn validate(&self, required: &[&str]) -> Result<()> {
        for path in required {
            if !self.contains(path) {
                return Err(Error::UnknownPath {
                    path: (*path).to_string(),
                });
            }
        }
        Ok(())
    }

    /// Execute an operation under the caller's real permissions.
    ///
    /// The user record is reloaded on every call and the scoped [`Caller`]
    /// rebuilt from it, so authorization is evaluated exactly as the primary
    /// interface would: revocations take effect immediately and there is no
    /// privileged agent bypass.
    pub async fn execute_with_rbac(
        &self,
        user_id: &str,
        path: &str,
        input: serde_json::Value,
    ) -> ExecutionOutcome {
        let user = match self.users.load_user(user_id).await {
            Ok(Some(user)) if user.active => user,
            Ok(_) => {
                warn!(user_id, path, "operation attempted by unknown or inactive user");
                return ExecutionOutcome::Failure(OperationError::NotAuthenticated);
            },
            Err(e) => {
                error!(user_id, path, error = %e, "user directory lookup failed");
                return ExecutionOutcome::Failure(OperationError::internal(
                    "user directory unavailable",
                ));
            },
        };

        let caller = Caller {
            user_id: user.id,
            memberships: user.memberships,
        };

        let Some(handler) = self.handlers.get(path) else {
            // validate() should have caught this at startup.
            error!(path, "dispatch to unregistered operation path");
            return ExecutionOutcome::Failure(OperationError::internal("unknown operation"));
        };

        match handler(caller, input).await {
            Ok(data) => ExecutionOutcome::Success(data),
            Err(e) => ExecutionOutcome::Failure(e),
        }
    }
}
