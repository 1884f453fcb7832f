use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// Partial indexes are written as SQL: both PostgreSQL and SQLite accept the
// same `CREATE UNIQUE INDEX ... WHERE` form.
const UNIQUE_INDEXES: [(&str, &str); 4] = [
    (
        "idx_environment_variables_deployment_key_unique",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_environment_variables_deployment_key_unique
            ON environment_variables (deployment_id, key)
            WHERE deployment_id IS NOT NULL AND service_id IS NULL AND project_id IS NULL",
    ),
    (
        "idx_environment_variables_service_key_unique",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_environment_variables_service_key_unique
            ON environment_variables (service_id, key)
            WHERE service_id IS NOT NULL AND deployment_id IS NULL AND project_id IS NULL",
    ),
    (
        "idx_environment_variables_project_key_unique",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_environment_variables_project_key_unique
            ON environment_variables (project_id, key)
            WHERE project_id IS NOT NULL AND deployment_id IS NULL AND service_id IS NULL",
    ),
    (
        "idx_gdpr_data_requests_open_unique",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_gdpr_data_requests_open_unique
            ON gdpr_data_requests (user_id, request_type)
            WHERE status IN ('pending', 'processing')",
    ),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        for (_, sql) in UNIQUE_INDEXES {
            db.execute_unprepared(sql).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        for (name, _) in UNIQUE_INDEXES.iter().rev() {
            db.execute_unprepared(&format!("DROP INDEX IF EXISTS {}", name))
                .await?;
        }
        Ok(())
    }
}
