use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use shipyard_entities::types::{ServiceStatus, ServiceType};
use shipyard_entities::{projects, services, ServiceSource};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{DbConnection, DbError, DbResult, ListQuery, Repository};

/// Runtime sizing of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub port: i32,
    pub replicas: i32,
    pub cpu_limit: String,
    pub memory_limit: String,
    pub cpu_request: String,
    pub memory_request: String,
    pub health_check_path: String,
    pub auto_deploy: bool,
}

impl Default for ResourceSpec {
    fn default() -> Self {
        Self {
            port: 3000,
            replicas: 1,
            cpu_limit: "1000m".to_string(),
            memory_limit: "512Mi".to_string(),
            cpu_request: "250m".to_string(),
            memory_request: "256Mi".to_string(),
            health_check_path: "/".to_string(),
            auto_deploy: true,
        }
    }
}

impl ResourceSpec {
    pub fn validate(&self) -> DbResult<()> {
        if !(1..=65535).contains(&self.port) {
            return Err(DbError::validation(format!(
                "port {} is outside 1-65535",
                self.port
            )));
        }
        if self.replicas < 0 {
            return Err(DbError::validation("replicas must not be negative"));
        }
        for (field, value) in [
            ("cpu_limit", &self.cpu_limit),
            ("memory_limit", &self.memory_limit),
            ("cpu_request", &self.cpu_request),
            ("memory_request", &self.memory_request),
        ] {
            if value.trim().is_empty() {
                return Err(DbError::validation(format!("{} must not be empty", field)));
            }
        }
        if !self.health_check_path.starts_with('/') {
            return Err(DbError::validation(
                "health_check_path must start with '/'",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewService {
    pub project_id: Uuid,
    pub name: String,
    pub service_type: ServiceType,
    pub source: ServiceSource,
    #[serde(default)]
    pub resources: ResourceSpec,
}

impl NewService {
    pub fn new(
        project_id: Uuid,
        name: impl Into<String>,
        service_type: ServiceType,
        source: ServiceSource,
    ) -> Self {
        Self {
            project_id,
            name: name.into(),
            service_type,
            source,
            resources: ResourceSpec::default(),
        }
    }
}

/// Column values for a source; the other kind's columns are cleared
fn apply_source(model: &mut services::ActiveModel, source: ServiceSource) -> DbResult<()> {
    match source {
        ServiceSource::Repository {
            url,
            provider,
            branch,
        } => {
            let url = url.trim().to_string();
            if url.is_empty() {
                return Err(DbError::validation("repository url must not be empty"));
            }
            let provider = provider.or_else(|| ServiceSource::detect_provider(&url));
            model.repository_url = Set(Some(url));
            model.repository_provider = Set(provider);
            model.repository_branch = Set(branch);
            model.docker_image = Set(None);
            model.docker_tag = Set(None);
        }
        ServiceSource::Image { image, tag } => {
            let image = image.trim().to_string();
            if image.is_empty() {
                return Err(DbError::validation("docker image must not be empty"));
            }
            model.repository_url = Set(None);
            model.repository_provider = Set(None);
            model.repository_branch = Set(None);
            model.docker_image = Set(Some(image));
            model.docker_tag = Set(tag);
        }
    }
    Ok(())
}

pub struct ServiceStore {
    db: Arc<DbConnection>,
    services: Repository<services::Entity>,
    projects: Repository<projects::Entity>,
}

impl ServiceStore {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            services: Repository::new(db.clone()),
            projects: Repository::new(db.clone()),
            db,
        }
    }

    pub async fn create(&self, new_service: NewService) -> DbResult<services::Model> {
        let name = new_service.name.trim().to_string();
        if name.is_empty() {
            return Err(DbError::validation("service name must not be empty"));
        }
        new_service.resources.validate()?;
        // Soft-deleted projects do not accept new services
        self.projects.get(new_service.project_id).await?;

        let resources = new_service.resources;
        let mut model = services::ActiveModel {
            project_id: Set(new_service.project_id),
            name: Set(name),
            service_type: Set(new_service.service_type),
            port: Set(resources.port),
            replicas: Set(resources.replicas),
            cpu_limit: Set(resources.cpu_limit),
            memory_limit: Set(resources.memory_limit),
            cpu_request: Set(resources.cpu_request),
            memory_request: Set(resources.memory_request),
            health_check_path: Set(resources.health_check_path),
            auto_deploy: Set(resources.auto_deploy),
            status: Set(ServiceStatus::Created),
            ..Default::default()
        };
        apply_source(&mut model, new_service.source)?;

        let service = self.services.insert(model).await?;
        info!(
            service_id = %service.id,
            project_id = %service.project_id,
            service_type = %service.service_type,
            "Created service"
        );
        Ok(service)
    }

    pub async fn get(&self, id: Uuid) -> DbResult<services::Model> {
        self.services.get(id).await
    }

    pub async fn list_for_project(&self, project_id: Uuid) -> DbResult<Vec<services::Model>> {
        self.services
            .find(
                &ListQuery::new()
                    .filter(Condition::all().add(services::Column::ProjectId.eq(project_id)))
                    .order_by("name", false),
            )
            .await
    }

    pub async fn update_status(&self, id: Uuid, status: ServiceStatus) -> DbResult<services::Model> {
        let service = self
            .services
            .update(services::ActiveModel {
                id: Set(id),
                status: Set(status),
                ..Default::default()
            })
            .await?;
        info!(service_id = %id, %status, "Changed service status");
        Ok(service)
    }

    pub async fn set_source(&self, id: Uuid, source: ServiceSource) -> DbResult<services::Model> {
        let mut model = services::ActiveModel {
            id: Set(id),
            ..Default::default()
        };
        apply_source(&mut model, source)?;
        self.services.update(model).await
    }

    pub async fn scale(&self, id: Uuid, replicas: i32) -> DbResult<services::Model> {
        if replicas < 0 {
            return Err(DbError::validation("replicas must not be negative"));
        }
        let service = self
            .services
            .update(services::ActiveModel {
                id: Set(id),
                replicas: Set(replicas),
                ..Default::default()
            })
            .await?;
        info!(service_id = %id, replicas, "Scaled service");
        Ok(service)
    }

    /// Services that should redeploy on a push to `url`/`branch`. A service
    /// without a branch follows every branch. Services of soft-deleted
    /// projects are skipped.
    pub async fn auto_deploy_for_repository(
        &self,
        url: &str,
        branch: &str,
    ) -> DbResult<Vec<services::Model>> {
        Ok(services::Entity::find()
            .inner_join(projects::Entity)
            .filter(projects::Column::DeletedAt.is_null())
            .filter(services::Column::RepositoryUrl.eq(url.trim()))
            .filter(services::Column::AutoDeploy.eq(true))
            .filter(
                Condition::any()
                    .add(services::Column::RepositoryBranch.eq(branch))
                    .add(services::Column::RepositoryBranch.is_null()),
            )
            .order_by_asc(services::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?)
    }

    /// Hard delete; deployments cascade
    pub async fn delete(&self, id: Uuid) -> DbResult<()> {
        if !self.services.delete(id).await? {
            return Err(DbError::not_found::<services::Entity>(id));
        }
        info!(service_id = %id, "Deleted service");
        Ok(())
    }
}
