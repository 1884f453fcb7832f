use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, Condition};
use serde::{Deserialize, Serialize};
use shipyard_core::{normalize_email, PaginationParams};
use shipyard_entities::users;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{DbConnection, DbError, DbResult, ListQuery, Repository};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
}

impl NewUser {
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password_hash: password_hash.into(),
            full_name: None,
        }
    }
}

pub struct UserStore {
    users: Repository<users::Entity>,
}

impl UserStore {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            users: Repository::new(db),
        }
    }

    /// Create an account. The email is stored trimmed and lowercased; a second
    /// account with the same address is a `UniqueViolation`.
    pub async fn create(&self, new_user: NewUser) -> DbResult<users::Model> {
        let email = normalize_email(&new_user.email);
        if email.is_empty() || !email.contains('@') {
            return Err(DbError::validation(format!(
                "invalid email address '{}'",
                new_user.email
            )));
        }

        let user = self
            .users
            .insert(users::ActiveModel {
                email: Set(email),
                password_hash: Set(new_user.password_hash),
                full_name: Set(new_user.full_name),
                is_email_verified: Set(false),
                is_active: Set(true),
                last_login_at: Set(None),
                ..Default::default()
            })
            .await?;

        info!(user_id = %user.id, "Created user");
        Ok(user)
    }

    pub async fn get(&self, id: Uuid) -> DbResult<users::Model> {
        self.users.get(id).await
    }

    pub async fn find_by_email(&self, email: &str) -> DbResult<Option<users::Model>> {
        self.users
            .find_one(Condition::all().add(users::Column::Email.eq(normalize_email(email))))
            .await
    }

    pub async fn record_login(&self, id: Uuid) -> DbResult<users::Model> {
        let user = self
            .users
            .update(users::ActiveModel {
                id: Set(id),
                last_login_at: Set(Some(shipyard_core::db_now())),
                ..Default::default()
            })
            .await?;
        debug!(user_id = %id, "Recorded login");
        Ok(user)
    }

    pub async fn mark_email_verified(&self, id: Uuid) -> DbResult<users::Model> {
        self.users
            .update(users::ActiveModel {
                id: Set(id),
                is_email_verified: Set(true),
                ..Default::default()
            })
            .await
    }

    pub async fn set_password_hash(&self, id: Uuid, password_hash: String) -> DbResult<users::Model> {
        self.users
            .update(users::ActiveModel {
                id: Set(id),
                password_hash: Set(password_hash),
                ..Default::default()
            })
            .await
    }

    pub async fn set_active(&self, id: Uuid, is_active: bool) -> DbResult<users::Model> {
        let user = self
            .users
            .update(users::ActiveModel {
                id: Set(id),
                is_active: Set(is_active),
                ..Default::default()
            })
            .await?;
        info!(user_id = %id, is_active, "Changed user activation");
        Ok(user)
    }

    pub async fn list(&self, pagination: PaginationParams) -> DbResult<Vec<users::Model>> {
        self.users.find(&ListQuery::new().paginate(pagination)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestDatabase;

    #[tokio::test]
    async fn test_create_normalizes_email() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let store = UserStore::new(test_db.db.clone());

        let user = store.create(NewUser::new("  Alice@Example.COM ", "h")).await?;
        assert_eq!(user.email, "alice@example.com");
        assert!(user.is_active);
        assert!(!user.is_email_verified);

        let found = store.find_by_email("ALICE@example.com").await?;
        assert_eq!(found.map(|u| u.id), Some(user.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let store = UserStore::new(test_db.db.clone());

        store.create(NewUser::new("a@b.com", "h")).await?;
        let err = store.create(NewUser::new("A@B.com", "h")).await.unwrap_err();
        assert!(err.is_unique_violation(), "got {:?}", err);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_email_is_rejected() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let store = UserStore::new(test_db.db.clone());

        let err = store.create(NewUser::new("   ", "h")).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_soft_fields_update() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let store = UserStore::new(test_db.db.clone());
        let user = store.create(NewUser::new("c@d.com", "old")).await?;

        let user_after_login = store.record_login(user.id).await?;
        assert!(user_after_login.last_login_at.is_some());

        assert!(store.mark_email_verified(user.id).await?.is_email_verified);
        assert_eq!(
            store
                .set_password_hash(user.id, "new".to_string())
                .await?
                .password_hash,
            "new"
        );
        assert!(!store.set_active(user.id, false).await?.is_active);

        let reloaded = store.get(user.id).await?;
        assert!(reloaded.is_email_verified);
        assert!(!reloaded.is_active);
        assert_eq!(reloaded.email, "c@d.com");
        Ok(())
    }

    #[tokio::test]
    async fn test_update_unknown_user_is_not_found() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let store = UserStore::new(test_db.db.clone());

        let err = store.record_login(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_pages() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let store = UserStore::new(test_db.db.clone());
        for i in 0..5 {
            store
                .create(NewUser::new(format!("user{}@example.com", i), "h"))
                .await?;
        }

        let mut params = PaginationParams::new(1, 2);
        params.sort_by = Some("email".to_string());
        params.sort_order = Some("asc".to_string());
        let page = store.list(params).await?;
        assert_eq!(
            page.iter().map(|u| u.email.as_str()).collect::<Vec<_>>(),
            vec!["user0@example.com", "user1@example.com"]
        );
        Ok(())
    }
}
