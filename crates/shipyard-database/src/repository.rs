//! Generic CRUD access shared by every entity.
//!
//! `Repository<E>` is the one data access path for all tables. Reads always
//! apply [`Record::visible`], so soft-deleted rows never leak through a
//! generic query. Each operation also exists as an associated `_in` function
//! taking any `ConnectionTrait`, which lets the same code run inside a
//! transaction.

use sea_orm::sea_query::{Asterisk, Expr, Value};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ActiveValue, Condition, ConnectionTrait, DbErr,
    EntityTrait, IntoActiveModel, Iterable, PaginatorTrait, PrimaryKeyToColumn, PrimaryKeyTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;
use shipyard_core::PaginationParams;
use shipyard_entities::{parse_field, Record};
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

use crate::{DbConnection, DbError, DbResult};

const DEFAULT_SORT_FIELD: &str = "created_at";

/// Filter, ordering and paging for [`Repository::find`]
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub filter: Condition,
    /// Field name, validated against the entity's columns
    pub order_by: Option<String>,
    pub descending: bool,
    /// `None` returns every matching row
    pub pagination: Option<PaginationParams>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filter: Condition::all(),
            order_by: None,
            descending: false,
            pagination: None,
        }
    }
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Condition) -> Self {
        self.filter = filter;
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.order_by = Some(field.into());
        self.descending = descending;
        self
    }

    /// Page and sort according to `params.sort_by` / `params.sort_order`.
    /// Without either a `sort_by` or an earlier `order_by`, pages are ordered
    /// by `created_at` so that LIMIT/OFFSET stays deterministic.
    pub fn paginate(mut self, params: PaginationParams) -> Self {
        match &params.sort_by {
            Some(sort_by) => {
                self.order_by = Some(sort_by.clone());
                self.descending = params.is_descending();
            }
            None if self.order_by.is_none() => {
                self.order_by = Some(DEFAULT_SORT_FIELD.to_string());
                self.descending = params.is_descending();
            }
            None => {}
        }
        self.pagination = Some(params);
        self
    }
}

/// One bucket of a `count_by` aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub key: Option<String>,
    pub count: i64,
}

pub struct Repository<E: Record> {
    db: Arc<DbConnection>,
    _entity: PhantomData<E>,
}

impl<E: Record> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> Repository<E>
where
    E: Record,
    E::PrimaryKey: PrimaryKeyTrait<ValueType = Uuid>,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
{
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            db,
            _entity: PhantomData,
        }
    }

    pub fn connection(&self) -> &DbConnection {
        &self.db
    }

    pub async fn find_by_id(&self, id: Uuid) -> DbResult<Option<E::Model>> {
        Self::find_by_id_in(&*self.db, id).await
    }

    /// Like `find_by_id` but a missing row is an error
    pub async fn get(&self, id: Uuid) -> DbResult<E::Model> {
        Self::get_in(&*self.db, id).await
    }

    pub async fn find(&self, query: &ListQuery) -> DbResult<Vec<E::Model>> {
        Self::find_in(&*self.db, query).await
    }

    pub async fn find_one(&self, filter: Condition) -> DbResult<Option<E::Model>> {
        Self::find_one_in(&*self.db, filter).await
    }

    pub async fn count(&self, filter: Condition) -> DbResult<u64> {
        Self::count_in(&*self.db, filter).await
    }

    pub async fn exists(&self, id: Uuid) -> DbResult<bool> {
        Self::exists_in(&*self.db, id).await
    }

    pub async fn insert(&self, model: E::ActiveModel) -> DbResult<E::Model> {
        Self::insert_in(&*self.db, model).await
    }

    pub async fn update(&self, model: E::ActiveModel) -> DbResult<E::Model> {
        Self::update_in(&*self.db, model).await
    }

    pub async fn delete(&self, id: Uuid) -> DbResult<bool> {
        Self::delete_in(&*self.db, id).await
    }

    pub async fn delete_where(&self, filter: Condition) -> DbResult<u64> {
        Self::delete_where_in(&*self.db, filter).await
    }

    pub async fn count_by(&self, column: E::Column, filter: Condition) -> DbResult<Vec<GroupCount>> {
        Self::count_by_in(&*self.db, column, filter).await
    }

    pub async fn find_by_id_in<C: ConnectionTrait>(db: &C, id: Uuid) -> DbResult<Option<E::Model>> {
        Ok(E::find_by_id(id).filter(E::visible()).one(db).await?)
    }

    pub async fn get_in<C: ConnectionTrait>(db: &C, id: Uuid) -> DbResult<E::Model> {
        Self::find_by_id_in(db, id)
            .await?
            .ok_or_else(|| DbError::not_found::<E>(id))
    }

    pub async fn find_in<C: ConnectionTrait>(db: &C, query: &ListQuery) -> DbResult<Vec<E::Model>> {
        let mut select = E::find()
            .filter(E::visible())
            .filter(query.filter.clone());

        if let Some(field) = &query.order_by {
            let column = parse_field::<E>(field)?;
            select = if query.descending {
                select.order_by_desc(column)
            } else {
                select.order_by_asc(column)
            };
        }

        if let Some(pagination) = &query.pagination {
            let (_, page_size) = pagination.normalize();
            select = select.offset(pagination.offset()).limit(page_size);
        }

        Ok(select.all(db).await?)
    }

    pub async fn find_one_in<C: ConnectionTrait>(
        db: &C,
        filter: Condition,
    ) -> DbResult<Option<E::Model>> {
        Ok(E::find()
            .filter(E::visible())
            .filter(filter)
            .one(db)
            .await?)
    }

    pub async fn count_in<C: ConnectionTrait>(db: &C, filter: Condition) -> DbResult<u64> {
        Ok(E::find()
            .filter(E::visible())
            .filter(filter)
            .count(db)
            .await?)
    }

    pub async fn exists_in<C: ConnectionTrait>(db: &C, id: Uuid) -> DbResult<bool> {
        Ok(Self::find_by_id_in(db, id).await?.is_some())
    }

    pub async fn insert_in<C: ConnectionTrait>(db: &C, model: E::ActiveModel) -> DbResult<E::Model> {
        Ok(model.insert(db).await?)
    }

    /// Persist the set fields of `model`. The primary key must be set.
    pub async fn update_in<C: ConnectionTrait>(db: &C, model: E::ActiveModel) -> DbResult<E::Model> {
        let id = primary_key_of::<E>(&model);
        model.update(db).await.map_err(|e| match e {
            DbErr::RecordNotUpdated => DbError::NotFound {
                entity: E::NAME,
                id,
            },
            other => other.into(),
        })
    }

    /// Hard delete by id. Returns whether a row was removed.
    pub async fn delete_in<C: ConnectionTrait>(db: &C, id: Uuid) -> DbResult<bool> {
        let result = E::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn delete_where_in<C: ConnectionTrait>(db: &C, filter: Condition) -> DbResult<u64> {
        let result = E::delete_many().filter(filter).exec(db).await?;
        Ok(result.rows_affected)
    }

    /// `SELECT column, COUNT(*) ... GROUP BY column` over visible rows
    pub async fn count_by_in<C: ConnectionTrait>(
        db: &C,
        column: E::Column,
        filter: Condition,
    ) -> DbResult<Vec<GroupCount>> {
        let rows: Vec<(Option<String>, i64)> = E::find()
            .select_only()
            .column(column)
            .column_as(Expr::col(Asterisk).count(), "count")
            .filter(E::visible())
            .filter(filter)
            .group_by(column)
            .order_by_asc(column)
            .into_tuple()
            .all(db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(key, count)| GroupCount { key, count })
            .collect())
    }
}

fn primary_key_of<E: Record>(model: &E::ActiveModel) -> String
where
    E::ActiveModel: ActiveModelTrait<Entity = E>,
{
    E::PrimaryKey::iter()
        .next()
        .and_then(|key| match model.get(key.into_column()) {
            ActiveValue::Set(value) | ActiveValue::Unchanged(value) => Some(value),
            ActiveValue::NotSet => None,
        })
        .map(|value| match value {
            Value::Uuid(Some(id)) => id.to_string(),
            other => format!("{:?}", other),
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestDatabase;
    use sea_orm::ActiveValue::Set;
    use sea_orm::{ColumnTrait, DatabaseBackend, MockDatabase};
    use shipyard_entities::types::ProjectStatus;
    use shipyard_entities::{projects, users};

    async fn seed_user(repo: &Repository<users::Entity>, email: &str) -> DbResult<users::Model> {
        repo.insert(users::ActiveModel {
            email: Set(email.to_string()),
            password_hash: Set("hash".to_string()),
            is_email_verified: Set(false),
            is_active: Set(true),
            ..Default::default()
        })
        .await
    }

    fn project(user_id: Uuid, slug: &str, status: ProjectStatus) -> projects::ActiveModel {
        projects::ActiveModel {
            user_id: Set(user_id),
            name: Set(slug.to_uppercase()),
            slug: Set(slug.to_string()),
            status: Set(status),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamps() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let repo = Repository::<users::Entity>::new(test_db.db.clone());

        let user = seed_user(&repo, "a@b.com").await?;
        assert!(!user.id.is_nil());
        assert_eq!(user.created_at, user.updated_at);

        let fetched = repo.get(user.id).await?;
        assert_eq!(fetched, user);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let repo = Repository::<users::Entity>::new(test_db.db.clone());

        let err = repo.get(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(repo.find_by_id(Uuid::new_v4()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_refreshes_updated_at() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let repo = Repository::<users::Entity>::new(test_db.db.clone());
        let user = seed_user(&repo, "u@b.com").await?;

        let mut active: users::ActiveModel = user.clone().into();
        active.full_name = Set(Some("Ada".to_string()));
        let updated = repo.update(active).await?;

        assert_eq!(updated.full_name.as_deref(), Some("Ada"));
        assert!(updated.updated_at >= user.updated_at);
        assert_eq!(updated.created_at, user.created_at);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let repo = Repository::<users::Entity>::new(test_db.db.clone());

        let ghost = Uuid::new_v4();
        let active = users::ActiveModel {
            id: Set(ghost),
            full_name: Set(Some("nobody".to_string())),
            ..Default::default()
        };
        match repo.update(active).await {
            Err(DbError::NotFound { entity, id }) => {
                assert_eq!(entity, "user");
                assert_eq!(id, ghost.to_string());
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_find_orders_filters_and_pages() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let users = Repository::<users::Entity>::new(test_db.db.clone());
        let projects = Repository::<projects::Entity>::new(test_db.db.clone());
        let owner = seed_user(&users, "owner@b.com").await?;

        for slug in ["charlie", "alpha", "bravo", "delta"] {
            projects
                .insert(project(owner.id, slug, ProjectStatus::Active))
                .await?;
        }

        let query = ListQuery::new()
            .filter(Condition::all().add(projects::Column::UserId.eq(owner.id)))
            .order_by("slug", false);
        let slugs: Vec<String> = projects
            .find(&query)
            .await?
            .into_iter()
            .map(|p| p.slug)
            .collect();
        assert_eq!(slugs, vec!["alpha", "bravo", "charlie", "delta"]);

        let mut page = PaginationParams::new(2, 3);
        page.sort_by = Some("slug".to_string());
        page.sort_order = Some("asc".to_string());
        let second_page = projects.find(&ListQuery::new().paginate(page)).await?;
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].slug, "delta");
        Ok(())
    }

    #[test]
    fn test_paginate_without_sort_field_orders_by_created_at() {
        let params = PaginationParams {
            page: Some(2),
            page_size: Some(10),
            sort_by: None,
            sort_order: Some("asc".to_string()),
        };
        let query = ListQuery::new().paginate(params.clone());
        assert_eq!(query.order_by.as_deref(), Some("created_at"));
        assert!(!query.descending);

        let query = ListQuery::new().order_by("slug", true).paginate(params);
        assert_eq!(query.order_by.as_deref(), Some("slug"));
        assert!(query.descending);

        let query = ListQuery::new().paginate(PaginationParams {
            sort_by: None,
            sort_order: None,
            ..PaginationParams::new(1, 5)
        });
        assert_eq!(query.order_by.as_deref(), Some("created_at"));
        assert!(query.descending);
    }

    #[tokio::test]
    async fn test_find_rejects_unknown_order_field() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let repo = Repository::<projects::Entity>::new(test_db.db.clone());

        let err = repo
            .find(&ListQuery::new().order_by("password", true))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(ref m) if m.contains("password")));
        Ok(())
    }

    #[tokio::test]
    async fn test_soft_deleted_rows_are_invisible() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let users = Repository::<users::Entity>::new(test_db.db.clone());
        let projects = Repository::<projects::Entity>::new(test_db.db.clone());
        let owner = seed_user(&users, "soft@b.com").await?;

        let live = projects
            .insert(project(owner.id, "live", ProjectStatus::Active))
            .await?;
        let gone = projects
            .insert(project(owner.id, "gone", ProjectStatus::Active))
            .await?;
        let mut active: projects::ActiveModel = gone.clone().into();
        active.deleted_at = Set(Some(shipyard_core::db_now()));
        projects.update(active).await?;

        assert!(projects.exists(live.id).await?);
        assert!(!projects.exists(gone.id).await?);
        assert_eq!(projects.count(Condition::all()).await?, 1);
        assert_eq!(projects.find(&ListQuery::new()).await?.len(), 1);

        // Hard delete still reaches the hidden row
        assert!(projects.delete(gone.id).await?);
        assert!(!projects.delete(gone.id).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_count_by_groups_text_column() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let users = Repository::<users::Entity>::new(test_db.db.clone());
        let projects = Repository::<projects::Entity>::new(test_db.db.clone());
        let owner = seed_user(&users, "group@b.com").await?;

        for (slug, status) in [
            ("a", ProjectStatus::Active),
            ("b", ProjectStatus::Active),
            ("c", ProjectStatus::Paused),
            ("d", ProjectStatus::Archived),
        ] {
            projects.insert(project(owner.id, slug, status)).await?;
        }

        let counts = projects
            .count_by(projects::Column::Status, Condition::all())
            .await?;
        assert_eq!(
            counts,
            vec![
                GroupCount {
                    key: Some("active".into()),
                    count: 2
                },
                GroupCount {
                    key: Some("archived".into()),
                    count: 1
                },
                GroupCount {
                    key: Some("paused".into()),
                    count: 1
                },
            ]
        );

        let removed = projects
            .delete_where(Condition::all().add(projects::Column::Status.eq(ProjectStatus::Active)))
            .await?;
        assert_eq!(removed, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_find_by_id_maps_rows_on_postgres() -> anyhow::Result<()> {
        let now = shipyard_core::db_now();
        let row = users::Model {
            id: Uuid::new_v4(),
            email: "mock@b.com".to_string(),
            password_hash: "hash".to_string(),
            full_name: None,
            is_email_verified: true,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row.clone()]])
            .into_connection();

        let found = Repository::<users::Entity>::find_by_id_in(&db, row.id).await?;
        assert_eq!(found, Some(row));

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 1);
        Ok(())
    }
}
