use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, Condition};
use serde::{Deserialize, Serialize};
use shipyard_entities::{deployments, environment_variables, projects, services, EnvVarScope};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{run_in_transaction, DbConnection, DbError, DbResult, ListQuery, Repository};

type EnvVars = Repository<environment_variables::Entity>;

/// Ciphertext and IV exactly as produced by the caller's encryption layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedValue {
    pub ciphertext: String,
    pub iv: String,
}

/// Effective variable for a deployment after merging all scopes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEnvVar {
    pub key: String,
    #[serde(skip_serializing)]
    pub value: EncryptedValue,
    pub is_secret: bool,
    /// Scope the winning value came from
    pub scope: EnvVarScope,
}

/// A stored row whose parent links do not name exactly one scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeViolation {
    pub id: Uuid,
    pub key: String,
    pub reason: String,
}

/// `[A-Za-z_][A-Za-z0-9_]*`
fn validate_key(key: &str) -> DbResult<()> {
    let mut chars = key.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DbError::validation(format!(
            "invalid environment variable name '{}'",
            key
        )))
    }
}

/// Rows attached to `scope` and to nothing else
fn scope_condition(scope: &EnvVarScope) -> Condition {
    let (deployment_id, service_id, project_id) = scope.columns();
    let link = |column: environment_variables::Column, value: Option<Uuid>| match value {
        Some(id) => column.eq(id),
        None => column.is_null(),
    };
    Condition::all()
        .add(link(environment_variables::Column::DeploymentId, deployment_id))
        .add(link(environment_variables::Column::ServiceId, service_id))
        .add(link(environment_variables::Column::ProjectId, project_id))
}

pub struct EnvVarStore {
    db: Arc<DbConnection>,
    vars: EnvVars,
    deployments: Repository<deployments::Entity>,
    services: Repository<services::Entity>,
    projects: Repository<projects::Entity>,
}

impl EnvVarStore {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            vars: Repository::new(db.clone()),
            deployments: Repository::new(db.clone()),
            services: Repository::new(db.clone()),
            projects: Repository::new(db.clone()),
            db,
        }
    }

    /// Insert or replace the value of `key` in `scope`
    pub async fn set(
        &self,
        scope: EnvVarScope,
        key: &str,
        value: EncryptedValue,
        is_secret: bool,
    ) -> DbResult<environment_variables::Model> {
        validate_key(key)?;

        // Losing an insert race to a concurrent writer trips the per-scope
        // unique index; the retry then finds the committed row and updates it.
        let (var, created) = match self.upsert(scope, key, value.clone(), is_secret).await {
            Err(DbError::UniqueViolation { .. }) => {
                debug!(%scope, key, "Concurrent insert of environment variable, retrying as update");
                self.upsert(scope, key, value, is_secret).await?
            }
            other => other?,
        };

        info!(%scope, key = %var.key, created, "Set environment variable");
        Ok(var)
    }

    async fn upsert(
        &self,
        scope: EnvVarScope,
        key: &str,
        value: EncryptedValue,
        is_secret: bool,
    ) -> DbResult<(environment_variables::Model, bool)> {
        let key = key.to_string();
        run_in_transaction(&self.db, None, move |txn| {
            Box::pin(async move {
                let existing = EnvVars::find_one_in(
                    txn,
                    scope_condition(&scope).add(environment_variables::Column::Key.eq(key.as_str())),
                )
                .await?;

                match existing {
                    Some(existing) => {
                        let updated = EnvVars::update_in(
                            txn,
                            environment_variables::ActiveModel {
                                id: Set(existing.id),
                                value_encrypted: Set(value.ciphertext),
                                value_iv: Set(value.iv),
                                is_secret: Set(is_secret),
                                ..Default::default()
                            },
                        )
                        .await?;
                        Ok((updated, false))
                    }
                    None => {
                        let (deployment_id, service_id, project_id) = scope.columns();
                        let inserted = EnvVars::insert_in(
                            txn,
                            environment_variables::ActiveModel {
                                deployment_id: Set(deployment_id),
                                service_id: Set(service_id),
                                project_id: Set(project_id),
                                key: Set(key),
                                value_encrypted: Set(value.ciphertext),
                                value_iv: Set(value.iv),
                                is_secret: Set(is_secret),
                                ..Default::default()
                            },
                        )
                        .await?;
                        Ok((inserted, true))
                    }
                }
            })
        })
        .await
    }

    pub async fn list(&self, scope: EnvVarScope) -> DbResult<Vec<environment_variables::Model>> {
        self.vars
            .find(
                &ListQuery::new()
                    .filter(scope_condition(&scope))
                    .order_by("key", false),
            )
            .await
    }

    pub async fn get(
        &self,
        scope: EnvVarScope,
        key: &str,
    ) -> DbResult<Option<environment_variables::Model>> {
        self.vars
            .find_one(scope_condition(&scope).add(environment_variables::Column::Key.eq(key)))
            .await
    }

    /// Returns whether a variable was removed
    pub async fn delete(&self, scope: EnvVarScope, key: &str) -> DbResult<bool> {
        let removed = self
            .vars
            .delete_where(scope_condition(&scope).add(environment_variables::Column::Key.eq(key)))
            .await?;
        if removed > 0 {
            info!(%scope, key, "Deleted environment variable");
        }
        Ok(removed > 0)
    }

    /// Effective environment of a deployment: project values, overridden by
    /// service values, overridden by deployment values. Sorted by key.
    /// Deployments under a soft-deleted project resolve to `NotFound`.
    pub async fn resolve_for_deployment(&self, deployment_id: Uuid) -> DbResult<Vec<ResolvedEnvVar>> {
        let deployment = self.deployments.get(deployment_id).await?;
        let service = self.services.get(deployment.service_id).await?;
        self.projects.get(service.project_id).await?;

        let mut scopes = [
            EnvVarScope::Project(service.project_id),
            EnvVarScope::Service(service.id),
            EnvVarScope::Deployment(deployment.id),
        ];
        scopes.sort_by_key(|scope| scope.precedence());

        let mut merged: BTreeMap<String, ResolvedEnvVar> = BTreeMap::new();
        for scope in scopes {
            for var in self.list(scope).await? {
                merged.insert(
                    var.key.clone(),
                    ResolvedEnvVar {
                        key: var.key,
                        value: EncryptedValue {
                            ciphertext: var.value_encrypted,
                            iv: var.value_iv,
                        },
                        is_secret: var.is_secret,
                        scope,
                    },
                );
            }
        }
        Ok(merged.into_values().collect())
    }

    /// Rows attached to zero or several parents. The schema cannot rule these
    /// out, so they are reported rather than rejected on read.
    pub async fn validate_all(&self) -> DbResult<Vec<ScopeViolation>> {
        let violations: Vec<ScopeViolation> = self
            .vars
            .find(&ListQuery::new().order_by("created_at", false))
            .await?
            .into_iter()
            .filter_map(|var| match var.scope() {
                Ok(_) => None,
                Err(e) => Some(ScopeViolation {
                    id: var.id,
                    key: var.key,
                    reason: e.to_string(),
                }),
            })
            .collect();

        if !violations.is_empty() {
            warn!(
                count = violations.len(),
                "Environment variables with invalid scope"
            );
        }
        Ok(violations)
    }
}
