//! Scope of an environment variable.
//!
//! Storage keeps three nullable parent columns; code works with `EnvVarScope`
//! so a row is always attached to exactly one level.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "level", content = "id", rename_all = "snake_case")]
pub enum EnvVarScope {
    Deployment(Uuid),
    Service(Uuid),
    Project(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("environment variable has no parent link")]
    Unattached,
    #[error("environment variable is linked to {0} parents, expected exactly one")]
    Ambiguous(usize),
}

/// Nullable column values in `(deployment_id, service_id, project_id)` order
pub type ScopeColumns = (Option<Uuid>, Option<Uuid>, Option<Uuid>);

impl EnvVarScope {
    pub fn from_columns(
        deployment_id: Option<Uuid>,
        service_id: Option<Uuid>,
        project_id: Option<Uuid>,
    ) -> Result<Self, ScopeError> {
        match (deployment_id, service_id, project_id) {
            (Some(id), None, None) => Ok(EnvVarScope::Deployment(id)),
            (None, Some(id), None) => Ok(EnvVarScope::Service(id)),
            (None, None, Some(id)) => Ok(EnvVarScope::Project(id)),
            (None, None, None) => Err(ScopeError::Unattached),
            (d, s, p) => {
                let linked = [d, s, p].iter().filter(|v| v.is_some()).count();
                Err(ScopeError::Ambiguous(linked))
            }
        }
    }

    pub fn columns(&self) -> ScopeColumns {
        match *self {
            EnvVarScope::Deployment(id) => (Some(id), None, None),
            EnvVarScope::Service(id) => (None, Some(id), None),
            EnvVarScope::Project(id) => (None, None, Some(id)),
        }
    }

    pub fn level(&self) -> &'static str {
        match self {
            EnvVarScope::Deployment(_) => "deployment",
            EnvVarScope::Service(_) => "service",
            EnvVarScope::Project(_) => "project",
        }
    }

    pub fn parent_id(&self) -> Uuid {
        match *self {
            EnvVarScope::Deployment(id) | EnvVarScope::Service(id) | EnvVarScope::Project(id) => {
                id
            }
        }
    }

    /// Merge order when resolving a deployment's effective environment.
    /// Higher values override lower ones.
    pub fn precedence(&self) -> u8 {
        match self {
            EnvVarScope::Project(_) => 0,
            EnvVarScope::Service(_) => 1,
            EnvVarScope::Deployment(_) => 2,
        }
    }
}

impl Display for EnvVarScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.level(), self.parent_id())
    }
}
