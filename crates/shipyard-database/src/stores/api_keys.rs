use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, Condition};
use serde::Serialize;
use shipyard_core::{generate_token, mask_sensitive, sha256_hex, DBDateTime};
use shipyard_entities::{api_keys, users};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{DbConnection, DbError, DbResult, ListQuery, Repository};

const KEY_PREFIX: &str = "sk_";
const KEY_RANDOM_LENGTH: usize = 40;

/// A freshly issued key. `secret` is shown to the caller once and never stored.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedApiKey {
    pub model: api_keys::Model,
    pub secret: String,
}

pub struct ApiKeyStore {
    keys: Repository<api_keys::Entity>,
    users: Repository<users::Entity>,
}

impl ApiKeyStore {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            keys: Repository::new(db.clone()),
            users: Repository::new(db),
        }
    }

    pub async fn issue(
        &self,
        user_id: Uuid,
        name: &str,
        expires_at: Option<DBDateTime>,
    ) -> DbResult<IssuedApiKey> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DbError::validation("API key name must not be empty"));
        }
        // Surface a missing owner as NotFound rather than a foreign key error
        self.users.get(user_id).await?;

        let secret = generate_api_key();
        let model = self
            .keys
            .insert(api_keys::ActiveModel {
                user_id: Set(user_id),
                name: Set(name.to_string()),
                key_hash: Set(hash_api_key(&secret)),
                key_preview: Set(key_preview(&secret)),
                expires_at: Set(expires_at),
                last_used_at: Set(None),
                ..Default::default()
            })
            .await?;

        info!(
            user_id = %user_id,
            key_id = %model.id,
            key = %mask_sensitive(&secret),
            "Issued API key"
        );
        Ok(IssuedApiKey { model, secret })
    }

    /// Resolve a presented secret to its key and owner, touching `last_used_at`
    pub async fn verify(&self, secret: &str) -> DbResult<(api_keys::Model, users::Model)> {
        let key = self
            .keys
            .find_one(Condition::all().add(api_keys::Column::KeyHash.eq(hash_api_key(secret))))
            .await?
            .ok_or_else(|| {
                warn!(key = %mask_sensitive(secret), "Rejected unknown API key");
                DbError::NotFound {
                    entity: "api_key",
                    id: key_preview(secret),
                }
            })?;

        let now = shipyard_core::db_now();
        if key.is_expired_at(now) {
            warn!(key_id = %key.id, "Rejected expired API key");
            return Err(DbError::invalid_state(format!(
                "API key {} has expired",
                key.key_preview
            )));
        }

        let user = self.users.get(key.user_id).await?;
        if !user.is_active {
            warn!(key_id = %key.id, user_id = %user.id, "Rejected API key of inactive user");
            return Err(DbError::invalid_state("API key owner is deactivated"));
        }

        let key = self
            .keys
            .update(api_keys::ActiveModel {
                id: Set(key.id),
                last_used_at: Set(Some(now)),
                ..Default::default()
            })
            .await?;
        Ok((key, user))
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> DbResult<Vec<api_keys::Model>> {
        self.keys
            .find(
                &ListQuery::new()
                    .filter(Condition::all().add(api_keys::Column::UserId.eq(user_id)))
                    .order_by("created_at", true),
            )
            .await
    }

    /// Delete a key owned by `user_id`
    pub async fn revoke(&self, user_id: Uuid, key_id: Uuid) -> DbResult<()> {
        let removed = self
            .keys
            .delete_where(
                Condition::all()
                    .add(api_keys::Column::Id.eq(key_id))
                    .add(api_keys::Column::UserId.eq(user_id)),
            )
            .await?;
        if removed == 0 {
            return Err(DbError::not_found::<api_keys::Entity>(key_id));
        }
        info!(user_id = %user_id, key_id = %key_id, "Revoked API key");
        Ok(())
    }
}

fn generate_api_key() -> String {
    generate_token(KEY_PREFIX, KEY_RANDOM_LENGTH)
}

fn hash_api_key(secret: &str) -> String {
    sha256_hex(secret)
}

/// First 8 and last 4 characters, e.g. `sk_AbCdE…wxyz`
fn key_preview(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return format!("{}…", chars.iter().take(4).collect::<String>());
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::fixtures;
    use crate::stores::UserStore;
    use crate::test_utils::TestDatabase;
    use chrono::Duration;

    #[test]
    fn test_key_shape() {
        let secret = generate_api_key();
        assert!(secret.starts_with("sk_"));
        assert_eq!(secret.len(), 43);

        let hash = hash_api_key(&secret);
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, secret);

        let preview = key_preview(&secret);
        assert!(preview.starts_with(&secret[..8]));
        assert!(preview.ends_with(&secret[secret.len() - 4..]));
        assert!(!preview.contains(&secret[8..secret.len() - 4]));
    }

    #[tokio::test]
    async fn test_issue_and_verify() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let user = fixtures::user(&test_db, "keys@example.com").await?;
        let store = ApiKeyStore::new(test_db.db.clone());

        let issued = store.issue(user.id, "ci", None).await?;
        assert_eq!(issued.model.key_hash, sha256_hex(&issued.secret));
        assert!(issued.model.last_used_at.is_none());

        let (key, owner) = store.verify(&issued.secret).await?;
        assert_eq!(key.id, issued.model.id);
        assert_eq!(owner.id, user.id);
        assert!(key.last_used_at.is_some());

        let err = store.verify("sk_not-a-real-key-000000000000").await.unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn test_verify_rejects_expired_and_inactive() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let user = fixtures::user(&test_db, "exp@example.com").await?;
        let store = ApiKeyStore::new(test_db.db.clone());

        let expired = store
            .issue(
                user.id,
                "old",
                Some(shipyard_core::db_now() - Duration::hours(1)),
            )
            .await?;
        assert!(matches!(
            store.verify(&expired.secret).await,
            Err(DbError::InvalidState(_))
        ));

        let live = store.issue(user.id, "live", None).await?;
        UserStore::new(test_db.db.clone())
            .set_active(user.id, false)
            .await?;
        assert!(matches!(
            store.verify(&live.secret).await,
            Err(DbError::InvalidState(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_revoke_only_own_keys() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let alice = fixtures::user(&test_db, "alice@example.com").await?;
        let bob = fixtures::user(&test_db, "bob@example.com").await?;
        let store = ApiKeyStore::new(test_db.db.clone());

        let key = store.issue(alice.id, "deploy", None).await?;
        assert!(store.revoke(bob.id, key.model.id).await.unwrap_err().is_not_found());
        assert_eq!(store.list_for_user(alice.id).await?.len(), 1);

        store.revoke(alice.id, key.model.id).await?;
        assert!(store.list_for_user(alice.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_issue_for_unknown_user() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let store = ApiKeyStore::new(test_db.db.clone());

        let err = store.issue(Uuid::new_v4(), "x", None).await.unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    }
}
