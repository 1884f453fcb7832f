use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, Condition, EntityTrait, ModelTrait};
use serde::{Deserialize, Serialize};
use shipyard_core::PaginationParams;
use shipyard_entities::types::DeploymentStatus;
use shipyard_entities::{deployments, projects, services, users};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{run_in_transaction, DbConnection, DbError, DbResult, ListQuery, Repository};

/// Commit that triggered a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitCommit {
    pub sha: String,
    pub message: Option<String>,
    pub author: Option<String>,
}

/// A deployment together with the ownership chain above it
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentLineage {
    pub deployment: deployments::Model,
    pub service: services::Model,
    pub project: projects::Model,
    pub user: users::Model,
}

#[derive(Clone, Copy)]
enum LogStream {
    Build,
    Deployment,
}

pub struct DeploymentStore {
    db: Arc<DbConnection>,
    deployments: Repository<deployments::Entity>,
    services: Repository<services::Entity>,
    projects: Repository<projects::Entity>,
}

impl DeploymentStore {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            deployments: Repository::new(db.clone()),
            services: Repository::new(db.clone()),
            projects: Repository::new(db.clone()),
            db,
        }
    }

    pub async fn create(
        &self,
        service_id: Uuid,
        name: &str,
        commit: Option<GitCommit>,
    ) -> DbResult<deployments::Model> {
        // Soft-deleted projects do not accept new deployments
        let service = self.services.get(service_id).await?;
        self.projects.get(service.project_id).await?;

        let (sha, message, author) = match commit {
            Some(commit) => (Some(commit.sha), commit.message, commit.author),
            None => (None, None, None),
        };
        let deployment = self
            .deployments
            .insert(deployments::ActiveModel {
                service_id: Set(service_id),
                name: Set(name.to_string()),
                status: Set(DeploymentStatus::Pending),
                git_commit_sha: Set(sha),
                git_commit_message: Set(message),
                git_author: Set(author),
                ..Default::default()
            })
            .await?;

        info!(
            deployment_id = %deployment.id,
            service_id = %service_id,
            "Created deployment"
        );
        Ok(deployment)
    }

    pub async fn get(&self, id: Uuid) -> DbResult<deployments::Model> {
        self.deployments.get(id).await
    }

    /// Move to `status` if the lifecycle allows it. Reaching `running` stamps
    /// `deployed_at`; reaching `stopped` stamps `stopped_at`.
    pub async fn transition(&self, id: Uuid, status: DeploymentStatus) -> DbResult<deployments::Model> {
        run_in_transaction(&self.db, None, move |txn| {
            Box::pin(async move {
                let current = Repository::<deployments::Entity>::get_in(txn, id).await?;
                if !current.status.can_transition_to(status) {
                    return Err(DbError::invalid_state(format!(
                        "deployment {} cannot move from {} to {}",
                        id, current.status, status
                    )));
                }

                let now = shipyard_core::db_now();
                let mut model = deployments::ActiveModel {
                    id: Set(id),
                    status: Set(status),
                    ..Default::default()
                };
                match status {
                    DeploymentStatus::Running => model.deployed_at = Set(Some(now)),
                    DeploymentStatus::Stopped => model.stopped_at = Set(Some(now)),
                    _ => {}
                }

                let updated = Repository::<deployments::Entity>::update_in(txn, model).await?;
                info!(deployment_id = %id, from = %current.status, to = %status, "Deployment transitioned");
                Ok(updated)
            })
        })
        .await
    }

    pub async fn set_image(
        &self,
        id: Uuid,
        image_url: &str,
        image_tag: Option<&str>,
    ) -> DbResult<deployments::Model> {
        self.deployments
            .update(deployments::ActiveModel {
                id: Set(id),
                image_url: Set(Some(image_url.to_string())),
                image_tag: Set(image_tag.map(str::to_string)),
                ..Default::default()
            })
            .await
    }

    pub async fn append_build_log(&self, id: Uuid, chunk: &str) -> DbResult<deployments::Model> {
        self.append_log(id, LogStream::Build, chunk).await
    }

    pub async fn append_deployment_log(&self, id: Uuid, chunk: &str) -> DbResult<deployments::Model> {
        self.append_log(id, LogStream::Deployment, chunk).await
    }

    async fn append_log(&self, id: Uuid, stream: LogStream, chunk: &str) -> DbResult<deployments::Model> {
        let chunk = chunk.to_string();
        run_in_transaction(&self.db, None, move |txn| {
            Box::pin(async move {
                let current = Repository::<deployments::Entity>::get_in(txn, id).await?;
                let existing = match stream {
                    LogStream::Build => current.build_logs,
                    LogStream::Deployment => current.deployment_logs,
                };
                let combined = existing.unwrap_or_default() + &chunk;

                let mut model = deployments::ActiveModel {
                    id: Set(id),
                    ..Default::default()
                };
                match stream {
                    LogStream::Build => model.build_logs = Set(Some(combined)),
                    LogStream::Deployment => model.deployment_logs = Set(Some(combined)),
                }
                debug!(deployment_id = %id, bytes = chunk.len(), "Appended log chunk");
                Repository::<deployments::Entity>::update_in(txn, model).await
            })
        })
        .await
    }

    pub async fn list_for_service(
        &self,
        service_id: Uuid,
        pagination: PaginationParams,
    ) -> DbResult<Vec<deployments::Model>> {
        self.deployments
            .find(
                &ListQuery::new()
                    .filter(Condition::all().add(deployments::Column::ServiceId.eq(service_id)))
                    .paginate(pagination),
            )
            .await
    }

    pub async fn latest_for_service(&self, service_id: Uuid) -> DbResult<Option<deployments::Model>> {
        let latest = self
            .deployments
            .find(
                &ListQuery::new()
                    .filter(Condition::all().add(deployments::Column::ServiceId.eq(service_id)))
                    .order_by("created_at", true)
                    .paginate(PaginationParams {
                        page: Some(1),
                        page_size: Some(1),
                        sort_by: None,
                        sort_order: None,
                    }),
            )
            .await?;
        Ok(latest.into_iter().next())
    }

    /// Deployment -> service -> project -> user in one call. A soft-deleted
    /// project hides the whole chain.
    pub async fn find_with_lineage(&self, id: Uuid) -> DbResult<DeploymentLineage> {
        let db = self.db.as_ref();
        let (deployment, service) = deployments::Entity::find_by_id(id)
            .find_also_related(services::Entity)
            .one(db)
            .await?
            .ok_or_else(|| DbError::not_found::<deployments::Entity>(id))?;
        let service =
            service.ok_or_else(|| DbError::not_found::<services::Entity>(deployment.service_id))?;

        let project = Repository::<projects::Entity>::get_in(db, service.project_id).await?;
        let user = project
            .find_related(users::Entity)
            .one(db)
            .await?
            .ok_or_else(|| DbError::not_found::<users::Entity>(project.user_id))?;

        Ok(DeploymentLineage {
            deployment,
            service,
            project,
            user,
        })
    }
}
