//! Multi-statement transactions with an explicit isolation level

use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseTransaction, IsolationLevel, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use tracing::debug;

use crate::{DbConnection, DbError, DbResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionIsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl TransactionIsolationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionIsolationLevel::ReadUncommitted => "read_uncommitted",
            TransactionIsolationLevel::ReadCommitted => "read_committed",
            TransactionIsolationLevel::RepeatableRead => "repeatable_read",
            TransactionIsolationLevel::Serializable => "serializable",
        }
    }
}

impl Display for TransactionIsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionIsolationLevel {
    type Err = DbError;

    /// Accepts the snake_case names as well as the SQL spelling (`READ COMMITTED`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "read_uncommitted" => Ok(TransactionIsolationLevel::ReadUncommitted),
            "read_committed" => Ok(TransactionIsolationLevel::ReadCommitted),
            "repeatable_read" => Ok(TransactionIsolationLevel::RepeatableRead),
            "serializable" => Ok(TransactionIsolationLevel::Serializable),
            _ => Err(DbError::validation(format!(
                "unknown isolation level '{}'",
                s
            ))),
        }
    }
}

impl From<TransactionIsolationLevel> for IsolationLevel {
    fn from(level: TransactionIsolationLevel) -> Self {
        match level {
            TransactionIsolationLevel::ReadUncommitted => IsolationLevel::ReadUncommitted,
            TransactionIsolationLevel::ReadCommitted => IsolationLevel::ReadCommitted,
            TransactionIsolationLevel::RepeatableRead => IsolationLevel::RepeatableRead,
            TransactionIsolationLevel::Serializable => IsolationLevel::Serializable,
        }
    }
}

fn effective_level(
    db: &DbConnection,
    level: Option<TransactionIsolationLevel>,
) -> Option<IsolationLevel> {
    match (db.get_database_backend(), level) {
        (DatabaseBackend::Sqlite, Some(level)) => {
            debug!(%level, "SQLite transactions are always serializable, ignoring isolation level");
            None
        }
        (_, level) => level.map(Into::into),
    }
}

/// Run `callback` as one transaction: committed when it returns `Ok`, rolled
/// back when it returns `Err`.
///
/// ```ignore
/// let user = run_in_transaction(&db, None, |txn| {
///     Box::pin(async move {
///         let user = Repository::<users::Entity>::insert_in(txn, new_user).await?;
///         Repository::<api_keys::Entity>::insert_in(txn, key).await?;
///         Ok(user)
///     })
/// })
/// .await?;
/// ```
pub async fn run_in_transaction<F, T>(
    db: &DbConnection,
    level: Option<TransactionIsolationLevel>,
    callback: F,
) -> DbResult<T>
where
    F: for<'c> FnOnce(
            &'c DatabaseTransaction,
        ) -> Pin<Box<dyn Future<Output = DbResult<T>> + Send + 'c>>
        + Send,
    T: Send,
{
    let isolation = effective_level(db, level);
    db.transaction_with_config::<F, T, DbError>(callback, isolation, None)
        .await
        .map_err(DbError::from)
}

/// Open a transaction for callers that batch statements by hand. Dropping it
/// without `commit()` rolls back.
pub async fn begin(
    db: &DbConnection,
    level: Option<TransactionIsolationLevel>,
) -> DbResult<DatabaseTransaction> {
    let isolation = effective_level(db, level);
    Ok(db.begin_with_config(isolation, None).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestDatabase;
    use crate::Repository;
    use sea_orm::ActiveValue::Set;
    use shipyard_entities::users;

    fn new_user(email: &str) -> users::ActiveModel {
        users::ActiveModel {
            email: Set(email.to_string()),
            password_hash: Set("hash".to_string()),
            is_email_verified: Set(false),
            is_active: Set(true),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_isolation_level() {
        assert_eq!(
            "READ COMMITTED".parse::<TransactionIsolationLevel>().unwrap(),
            TransactionIsolationLevel::ReadCommitted
        );
        assert_eq!(
            "repeatable_read".parse::<TransactionIsolationLevel>().unwrap(),
            TransactionIsolationLevel::RepeatableRead
        );
        assert!("snapshot".parse::<TransactionIsolationLevel>().is_err());
        assert_eq!(TransactionIsolationLevel::Serializable.to_string(), "serializable");
    }

    #[tokio::test]
    async fn test_commit_on_ok() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;

        let created = run_in_transaction(
            &test_db.db,
            Some(TransactionIsolationLevel::Serializable),
            |txn| {
                Box::pin(async move {
                    Repository::<users::Entity>::insert_in(txn, new_user("a@example.com")).await?;
                    Repository::<users::Entity>::insert_in(txn, new_user("b@example.com")).await
                })
            },
        )
        .await?;

        let users = Repository::<users::Entity>::new(test_db.db.clone());
        assert!(users.exists(created.id).await?);
        assert_eq!(users.count(sea_orm::Condition::all()).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_rollback_on_err() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;

        let result: DbResult<()> = run_in_transaction(&test_db.db, None, |txn| {
            Box::pin(async move {
                Repository::<users::Entity>::insert_in(txn, new_user("dup@example.com")).await?;
                // Second insert violates the unique email index
                Repository::<users::Entity>::insert_in(txn, new_user("dup@example.com")).await?;
                Ok(())
            })
        })
        .await;

        assert!(matches!(result, Err(DbError::UniqueViolation { .. })));
        let users = Repository::<users::Entity>::new(test_db.db.clone());
        assert_eq!(users.count(sea_orm::Condition::all()).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_manual_transaction() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let users = Repository::<users::Entity>::new(test_db.db.clone());

        let txn = begin(&test_db.db, None).await?;
        Repository::<users::Entity>::insert_in(&txn, new_user("c@example.com")).await?;
        txn.rollback().await?;
        assert_eq!(users.count(sea_orm::Condition::all()).await?, 0);

        let txn = begin(&test_db.db, None).await?;
        Repository::<users::Entity>::insert_in(&txn, new_user("c@example.com")).await?;
        txn.commit().await?;
        assert_eq!(users.count(sea_orm::Condition::all()).await?, 1);
        Ok(())
    }
}
