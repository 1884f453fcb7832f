//! Database connection management

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use shipyard_core::{DatabaseConfig, ServiceError, ServiceResult};
use shipyard_migrations::{Migrator, MigratorTrait};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub type DbConnection = DatabaseConnection;

pub async fn establish_connection(config: &DatabaseConfig) -> ServiceResult<Arc<DbConnection>> {
    config.validate()?;

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .sqlx_logging(config.sqlx_logging);

    // Every connection to `sqlite::memory:` opens its own empty database
    if config.is_sqlite() && config.url.contains(":memory:") {
        opt.max_connections(1).min_connections(1);
    }

    let db = Database::connect(opt)
        .await
        .map_err(|e| ServiceError::Database(e.to_string()))?;
    info!(
        backend = ?db.get_database_backend(),
        max_connections = config.max_connections,
        "Connected to database"
    );

    if config.run_migrations {
        debug!("Applying pending migrations");
        Migrator::up(&db, None)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;
    }

    Ok(Arc::new(db))
}

/// Connect with default pool settings and apply migrations
pub async fn connect(database_url: &str) -> ServiceResult<Arc<DbConnection>> {
    establish_connection(&DatabaseConfig::new(database_url)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, Statement};

    #[tokio::test]
    async fn test_connect_sqlite_memory_runs_migrations() -> anyhow::Result<()> {
        let db = connect("sqlite::memory:").await?;
        assert_eq!(db.get_database_backend(), DatabaseBackend::Sqlite);

        let row = db
            .query_one(Statement::from_string(
                DatabaseBackend::Sqlite,
                "SELECT COUNT(*) AS n FROM users",
            ))
            .await?;
        let n: i64 = row.expect("count row").try_get("", "n")?;
        assert_eq!(n, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = DatabaseConfig {
            max_connections: 0,
            ..DatabaseConfig::new("sqlite::memory:")
        };
        let err = establish_connection(&config).await.unwrap_err();
        assert!(matches!(err, ServiceError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_skip_migrations() -> anyhow::Result<()> {
        let config = DatabaseConfig {
            run_migrations: false,
            ..DatabaseConfig::new("sqlite::memory:")
        };
        let db = establish_connection(&config).await?;
        let result = db
            .execute(Statement::from_string(
                DatabaseBackend::Sqlite,
                "SELECT * FROM users",
            ))
            .await;
        assert!(result.is_err());
        Ok(())
    }
}
