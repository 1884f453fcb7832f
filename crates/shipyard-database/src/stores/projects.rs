use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use shipyard_core::generate_slug;
use shipyard_entities::types::ProjectStatus;
use shipyard_entities::{projects, users};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{DbConnection, DbError, DbResult, ListQuery, Repository};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub user_id: Uuid,
    pub name: String,
    /// Derived from `name` when absent
    pub slug: Option<String>,
    pub description: Option<String>,
}

impl NewProject {
    pub fn new(user_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            slug: None,
            description: None,
        }
    }
}

pub struct ProjectStore {
    db: Arc<DbConnection>,
    projects: Repository<projects::Entity>,
    users: Repository<users::Entity>,
}

impl ProjectStore {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            projects: Repository::new(db.clone()),
            users: Repository::new(db.clone()),
            db,
        }
    }

    pub async fn create(&self, new_project: NewProject) -> DbResult<projects::Model> {
        let name = new_project.name.trim().to_string();
        if name.is_empty() {
            return Err(DbError::validation("project name must not be empty"));
        }
        let slug = generate_slug(new_project.slug.as_deref().unwrap_or(&name));
        if slug.is_empty() {
            return Err(DbError::validation(format!(
                "cannot derive a slug from '{}'",
                name
            )));
        }
        self.users.get(new_project.user_id).await?;

        let project = self
            .projects
            .insert(projects::ActiveModel {
                user_id: Set(new_project.user_id),
                name: Set(name),
                slug: Set(slug),
                description: Set(new_project.description),
                status: Set(ProjectStatus::Active),
                deleted_at: Set(None),
                ..Default::default()
            })
            .await?;

        info!(project_id = %project.id, slug = %project.slug, "Created project");
        Ok(project)
    }

    /// Live project by id; soft-deleted projects are not found
    pub async fn get(&self, id: Uuid) -> DbResult<projects::Model> {
        self.projects.get(id).await
    }

    pub async fn get_including_deleted(&self, id: Uuid) -> DbResult<projects::Model> {
        projects::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| DbError::not_found::<projects::Entity>(id))
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> DbResult<Vec<projects::Model>> {
        self.projects
            .find(
                &ListQuery::new()
                    .filter(Condition::all().add(projects::Column::UserId.eq(user_id)))
                    .order_by("created_at", true),
            )
            .await
    }

    /// Most recently created live project with this slug
    pub async fn find_by_slug(&self, user_id: Uuid, slug: &str) -> DbResult<Option<projects::Model>> {
        let matches = self
            .projects
            .find(
                &ListQuery::new()
                    .filter(
                        Condition::all()
                            .add(projects::Column::UserId.eq(user_id))
                            .add(projects::Column::Slug.eq(slug)),
                    )
                    .order_by("created_at", true),
            )
            .await?;
        Ok(matches.into_iter().next())
    }

    pub async fn update_status(&self, id: Uuid, status: ProjectStatus) -> DbResult<projects::Model> {
        self.get(id).await?;
        let project = self
            .projects
            .update(projects::ActiveModel {
                id: Set(id),
                status: Set(status),
                ..Default::default()
            })
            .await?;
        info!(project_id = %id, %status, "Changed project status");
        Ok(project)
    }

    /// Rename; the slug is kept so existing URLs stay valid
    pub async fn rename(&self, id: Uuid, name: &str) -> DbResult<projects::Model> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DbError::validation("project name must not be empty"));
        }
        self.get(id).await?;
        self.projects
            .update(projects::ActiveModel {
                id: Set(id),
                name: Set(name.to_string()),
                ..Default::default()
            })
            .await
    }

    pub async fn soft_delete(&self, id: Uuid) -> DbResult<projects::Model> {
        let project = self.get_including_deleted(id).await?;
        if project.is_deleted() {
            return Err(DbError::invalid_state(format!(
                "project {} is already deleted",
                id
            )));
        }
        let project = self
            .projects
            .update(projects::ActiveModel {
                id: Set(id),
                deleted_at: Set(Some(shipyard_core::db_now())),
                ..Default::default()
            })
            .await?;
        info!(project_id = %id, "Soft-deleted project");
        Ok(project)
    }

    pub async fn restore(&self, id: Uuid) -> DbResult<projects::Model> {
        let project = self.get_including_deleted(id).await?;
        if !project.is_deleted() {
            return Err(DbError::invalid_state(format!(
                "project {} is not deleted",
                id
            )));
        }
        let project = self
            .projects
            .update(projects::ActiveModel {
                id: Set(id),
                deleted_at: Set(None),
                ..Default::default()
            })
            .await?;
        info!(project_id = %id, "Restored project");
        Ok(project)
    }

    /// Hard delete. Services, deployments, domains and scoped environment
    /// variables go with it through the foreign key cascade.
    pub async fn purge(&self, id: Uuid) -> DbResult<()> {
        let result = projects::Entity::delete_many()
            .filter(projects::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected == 0 {
            return Err(DbError::not_found::<projects::Entity>(id));
        }
        info!(project_id = %id, "Purged project");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::fixtures;
    use crate::test_utils::TestDatabase;
    use shipyard_entities::{deployments, services};

    #[tokio::test]
    async fn test_create_derives_slug() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let user = fixtures::user(&test_db, "p@example.com").await?;
        let store = ProjectStore::new(test_db.db.clone());

        let project = store.create(NewProject::new(user.id, "My Cool App")).await?;
        assert_eq!(project.slug, "my-cool-app");
        assert_eq!(project.status, ProjectStatus::Active);
        assert!(project.deleted_at.is_none());

        let mut explicit = NewProject::new(user.id, "Other");
        explicit.slug = Some("Custom Slug".to_string());
        assert_eq!(store.create(explicit).await?.slug, "custom-slug");

        let err = store.create(NewProject::new(user.id, "!!!")).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_slug_is_not_unique() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let user = fixtures::user(&test_db, "p@example.com").await?;
        let store = ProjectStore::new(test_db.db.clone());

        let first = store.create(NewProject::new(user.id, "demo")).await?;
        let second = store.create(NewProject::new(user.id, "demo")).await?;
        assert_ne!(first.id, second.id);

        let found = store.find_by_slug(user.id, "demo").await?.map(|p| p.id);
        assert!(found == Some(first.id) || found == Some(second.id));
        assert_eq!(store.list_for_user(user.id).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_soft_delete_and_restore() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let user = fixtures::user(&test_db, "p@example.com").await?;
        let store = ProjectStore::new(test_db.db.clone());
        let project = store.create(NewProject::new(user.id, "demo")).await?;

        let deleted = store.soft_delete(project.id).await?;
        assert!(deleted.is_deleted());
        assert!(store.get(project.id).await.unwrap_err().is_not_found());
        assert!(store.find_by_slug(user.id, "demo").await?.is_none());
        assert!(store.list_for_user(user.id).await?.is_empty());
        assert!(store.get_including_deleted(project.id).await?.is_deleted());
        assert!(matches!(
            store.soft_delete(project.id).await,
            Err(DbError::InvalidState(_))
        ));

        let restored = store.restore(project.id).await?;
        assert!(!restored.is_deleted());
        assert_eq!(store.get(project.id).await?.id, project.id);
        assert!(matches!(
            store.restore(project.id).await,
            Err(DbError::InvalidState(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_status_and_rename() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let user = fixtures::user(&test_db, "p@example.com").await?;
        let store = ProjectStore::new(test_db.db.clone());
        let project = store.create(NewProject::new(user.id, "demo")).await?;

        let paused = store.update_status(project.id, ProjectStatus::Paused).await?;
        assert_eq!(paused.status, ProjectStatus::Paused);

        let renamed = store.rename(project.id, "Demo Two").await?;
        assert_eq!(renamed.name, "Demo Two");
        assert_eq!(renamed.slug, "demo");
        Ok(())
    }

    #[tokio::test]
    async fn test_purge_cascades() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let chain = fixtures::chain(&test_db).await?;
        let store = ProjectStore::new(test_db.db.clone());

        store.purge(chain.project.id).await?;

        assert!(services::Entity::find_by_id(chain.service.id)
            .one(test_db.db.as_ref())
            .await?
            .is_none());
        assert!(deployments::Entity::find_by_id(chain.deployment.id)
            .one(test_db.db.as_ref())
            .await?
            .is_none());
        assert!(store.purge(chain.project.id).await.unwrap_err().is_not_found());
        Ok(())
    }
}
