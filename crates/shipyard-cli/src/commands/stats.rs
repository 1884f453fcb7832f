//! Row counts per table

use clap::Args;
use colored::Colorize;
use sea_orm::{ColumnTrait, EntityName, EntityTrait, PaginatorTrait, QueryFilter};
use serde::Serialize;
use shipyard_database::{establish_connection, DbConnection};
use shipyard_entities::{
    api_keys, audit_logs, build_queue, deployments, domains, environment_variables,
    gdpr_consents, gdpr_data_requests, invoices, notifications, projects, services,
    subscriptions, usage_records, users, webhook_events,
};
use tracing::debug;

use super::{DatabaseArgs, OutputFormat};

#[derive(Args)]
pub struct StatsCommand {
    #[command(flatten)]
    pub database: DatabaseArgs,

    /// Output format: text (human-readable) or json (machine-readable)
    #[arg(long, value_enum, default_value = "text")]
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TableCount {
    pub table: String,
    pub rows: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub tables: Vec<TableCount>,
    /// Soft-deleted projects, included in the `projects` row count
    pub deleted_projects: u64,
}

async fn count<E>(db: &DbConnection) -> anyhow::Result<TableCount>
where
    E: EntityTrait + Default,
    E::Model: Sync,
{
    Ok(TableCount {
        table: E::default().table_name().to_string(),
        rows: E::find().count(db).await?,
    })
}

/// Every table in ownership order, counting soft-deleted rows too
pub async fn collect(db: &DbConnection) -> anyhow::Result<Stats> {
    let tables = vec![
        count::<users::Entity>(db).await?,
        count::<api_keys::Entity>(db).await?,
        count::<projects::Entity>(db).await?,
        count::<services::Entity>(db).await?,
        count::<deployments::Entity>(db).await?,
        count::<environment_variables::Entity>(db).await?,
        count::<domains::Entity>(db).await?,
        count::<build_queue::Entity>(db).await?,
        count::<webhook_events::Entity>(db).await?,
        count::<subscriptions::Entity>(db).await?,
        count::<usage_records::Entity>(db).await?,
        count::<invoices::Entity>(db).await?,
        count::<audit_logs::Entity>(db).await?,
        count::<gdpr_consents::Entity>(db).await?,
        count::<gdpr_data_requests::Entity>(db).await?,
        count::<notifications::Entity>(db).await?,
    ];
    let deleted_projects = projects::Entity::find()
        .filter(projects::Column::DeletedAt.is_not_null())
        .count(db)
        .await?;

    Ok(Stats {
        tables,
        deleted_projects,
    })
}

fn print_text(stats: &Stats) {
    let width = stats
        .tables
        .iter()
        .map(|t| t.table.len())
        .max()
        .unwrap_or(0);

    println!();
    println!("{}", "Shipyard database".bright_white().bold());
    for table in &stats.tables {
        let rows = table.rows.to_string();
        println!(
            "  {:<width$}  {}",
            table.table,
            if table.rows == 0 {
                rows.dimmed()
            } else {
                rows.bright_cyan()
            },
            width = width
        );
    }
    if stats.deleted_projects > 0 {
        println!();
        println!(
            "  {} soft-deleted project(s)",
            stats.deleted_projects.to_string().bright_yellow()
        );
    }
    println!();
}

impl StatsCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        debug!("Initializing database connection...");
        let rt = tokio::runtime::Runtime::new()?;
        let db = rt.block_on(establish_connection(&self.database.config()))?;

        let stats = rt.block_on(collect(db.as_ref()))?;

        match self.output_format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
            OutputFormat::Text => print_text(&stats),
        }
        Ok(())
    }
}
