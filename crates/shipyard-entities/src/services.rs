use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};
use shipyard_core::DBDateTime;

use crate::source::ServiceSource;
use crate::types::{RepositoryProvider, ServiceStatus, ServiceType};
use crate::Record;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "services")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub service_type: ServiceType,
    // Repository-backed source
    pub repository_url: Option<String>,
    pub repository_provider: Option<RepositoryProvider>,
    pub repository_branch: Option<String>,
    // Image-backed source
    pub docker_image: Option<String>,
    pub docker_tag: Option<String>,
    pub port: i32,
    pub replicas: i32,
    /// Kubernetes style quantities, e.g. `1000m`, `512Mi`
    pub cpu_limit: String,
    pub memory_limit: String,
    pub cpu_request: String,
    pub memory_request: String,
    pub health_check_path: String,
    pub auto_deploy: bool,
    pub status: ServiceStatus,
    pub created_at: DBDateTime,
    pub updated_at: DBDateTime,
}

impl Model {
    /// The deployable source described by the stored columns. The schema does
    /// not enforce exclusivity; a repository wins over an image when both are set.
    pub fn source(&self) -> Option<ServiceSource> {
        if let Some(url) = &self.repository_url {
            return Some(ServiceSource::Repository {
                url: url.clone(),
                provider: self.repository_provider,
                branch: self.repository_branch.clone(),
            });
        }
        self.docker_image.as_ref().map(|image| ServiceSource::Image {
            image: image.clone(),
            tag: self.docker_tag.clone(),
        })
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::projects::Entity",
        from = "Column::ProjectId",
        to = "super::projects::Column::Id",
        on_delete = "Cascade"
    )]
    Project,
    #[sea_orm(has_many = "super::deployments::Entity")]
    Deployments,
    #[sea_orm(has_many = "super::environment_variables::Entity")]
    EnvironmentVariables,
}

impl Related<super::projects::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::deployments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Deployments.def()
    }
}

impl Related<super::environment_variables::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EnvironmentVariables.def()
    }
}

impl Record for Entity {
    const NAME: &'static str = "service";
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = shipyard_core::db_now();

        if insert {
            if self.id.is_not_set() {
                self.id = Set(Uuid::new_v4());
            }
            if self.status.is_not_set() {
                self.status = Set(ServiceStatus::Created);
            }
            if self.created_at.is_not_set() {
                self.created_at = Set(now);
            }
            if self.updated_at.is_not_set() {
                self.updated_at = Set(now);
            }
        } else {
            self.updated_at = Set(now);
        }

        Ok(self)
    }
}
