//! Typed operation registry and RBAC execution bridge.
//!
//! Every business operation the agent can reach is registered up front in a
//! typed map, validated at startup. Execution always rebuilds the caller's
//! authorization context from a fresh user load; the agent holds no
//! privileged credentials and no cached permissions.

pub mod bridge;
pub mod error;
pub mod operation;

pub use {
    bridge::{
        Caller, ExecutionOutcome, OperationRegistry, OrgMembership, Role, StaticUserDirectory,
        UserDirectory, UserRecord,
    },
    error::{Error, OperationError, Result},
    operation::OperationPath,
};
