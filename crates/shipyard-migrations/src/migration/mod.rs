pub use sea_orm_migration::prelude::*;

mod columns;
mod m20250101_000001_create_accounts;
mod m20250101_000002_create_projects_and_services;
mod m20250101_000003_create_deployments;
mod m20250102_000001_create_build_queue_and_webhooks;
mod m20250103_000001_create_billing_tables;
mod m20250104_000001_create_compliance_tables;
mod m20250105_000001_add_scope_unique_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_accounts::Migration),
            Box::new(m20250101_000002_create_projects_and_services::Migration),
            Box::new(m20250101_000003_create_deployments::Migration),
            Box::new(m20250102_000001_create_build_queue_and_webhooks::Migration),
            Box::new(m20250103_000001_create_billing_tables::Migration),
            Box::new(m20250104_000001_create_compliance_tables::Migration),
            Box::new(m20250105_000001_add_scope_unique_indexes::Migration),
        ]
    }
}
