//! Test utilities for database integration tests
//!
//! `TestDatabase::sqlite()` gives every test its own migrated in-memory
//! database and needs nothing external. `TestDatabase::postgres()` starts a
//! dedicated PostgreSQL container for the tests that must run against the
//! production backend.

use crate::DbConnection;
use sea_orm::*;
use sea_orm_migration::MigratorTrait;
use shipyard_migrations::Migrator;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{runners::AsyncRunner, ContainerAsync, GenericImage, ImageExt};

pub struct TestDatabase {
    pub db: Arc<DbConnection>,
    pub database_url: String,
    /// Kept alive for as long as the database is in use
    #[allow(dead_code)]
    container: Option<ContainerAsync<GenericImage>>,
}

impl TestDatabase {
    /// Fresh in-memory SQLite database with all migrations applied
    pub async fn sqlite() -> anyhow::Result<Self> {
        let database_url = "sqlite::memory:".to_string();

        // A second pooled connection would open a different, empty database
        let mut opt = ConnectOptions::new(database_url.clone());
        opt.max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);

        let db = Database::connect(opt).await?;
        Migrator::up(&db, None)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

        Ok(TestDatabase {
            db: Arc::new(db),
            database_url,
            container: None,
        })
    }

    /// Dedicated PostgreSQL container with all migrations applied
    pub async fn postgres() -> anyhow::Result<Self> {
        let db_name = "shipyard_test";
        let username = "test_user";
        let password = "test_password";

        let container = GenericImage::new("postgres", "16-alpine")
            .with_env_var("POSTGRES_DB", db_name)
            .with_env_var("POSTGRES_USER", username)
            .with_env_var("POSTGRES_PASSWORD", password)
            .start()
            .await?;

        let port = container.get_host_port_ipv4(5432).await?;
        let database_url = format!(
            "postgresql://{}:{}@localhost:{}/{}",
            username, password, port, db_name
        );

        let db = Self::connect_with_retry(&database_url, 20).await?;
        Migrator::up(&db, None)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

        Ok(TestDatabase {
            db: Arc::new(db),
            database_url,
            container: Some(container),
        })
    }

    async fn connect_with_retry(
        database_url: &str,
        max_retries: u32,
    ) -> anyhow::Result<DbConnection> {
        let mut opt = ConnectOptions::new(database_url.to_owned());
        opt.max_connections(5)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        let mut retries = max_retries;
        loop {
            let attempt = match Database::connect(opt.clone()).await {
                Ok(db) => {
                    let ping = Statement::from_string(DatabaseBackend::Postgres, "SELECT 1");
                    db.execute(ping).await.map(|_| db)
                }
                Err(e) => Err(e),
            };

            match attempt {
                Ok(db) => return Ok(db),
                Err(e) if retries > 0 => {
                    eprintln!(
                        "Database not ready (retries left: {}): {}",
                        retries, e
                    );
                    retries -= 1;
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(e) => {
                    return Err(anyhow::anyhow!(
                        "Failed to connect to database after {} retries: {}",
                        max_retries,
                        e
                    ));
                }
            }
        }
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.db.get_database_backend()
    }

    /// Execute raw SQL
    pub async fn execute_sql(&self, sql: &str) -> anyhow::Result<ExecResult> {
        let statement = Statement::from_string(self.backend(), sql.to_owned());
        Ok(self.db.execute(statement).await?)
    }

    /// Query raw SQL and return the rows
    pub async fn query_sql(&self, sql: &str) -> anyhow::Result<Vec<QueryResult>> {
        let statement = Statement::from_string(self.backend(), sql.to_owned());
        Ok(self.db.query_all(statement).await?)
    }

    /// Application tables, sorted, excluding the migration bookkeeping table
    pub async fn table_names(&self) -> anyhow::Result<Vec<String>> {
        let sql = match self.backend() {
            DatabaseBackend::Sqlite => {
                "SELECT name FROM sqlite_master WHERE type = 'table' \
                 AND name NOT LIKE 'sqlite_%' ORDER BY name"
            }
            _ => {
                "SELECT table_name AS name FROM information_schema.tables \
                 WHERE table_schema = 'public' ORDER BY table_name"
            }
        };

        let mut names = Vec::new();
        for row in self.query_sql(sql).await? {
            let name: String = row.try_get("", "name")?;
            if name != "seaql_migrations" {
                names.push(name);
            }
        }
        Ok(names)
    }
}
