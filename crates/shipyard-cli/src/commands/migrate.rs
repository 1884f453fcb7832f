//! Schema migration command

use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use shipyard_database::{establish_connection, DbConnection};
use shipyard_migrations::{Migrator, MigratorTrait};
use tracing::{debug, info};

use super::{DatabaseArgs, OutputFormat};

#[derive(Args)]
pub struct MigrateCommand {
    #[command(flatten)]
    pub database: DatabaseArgs,

    /// Output format for the migration report
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub output_format: OutputFormat,

    #[command(subcommand)]
    pub action: MigrateAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum MigrateAction {
    /// Apply pending migrations
    Up {
        /// Apply at most this many migrations
        #[arg(long)]
        steps: Option<u32>,
    },
    /// Roll back applied migrations
    Down {
        /// Number of migrations to roll back
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Show applied and pending migrations
    Status,
    /// Drop every table and re-apply all migrations
    Fresh,
}

/// Migration names in application order
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MigrationReport {
    pub applied: Vec<String>,
    pub pending: Vec<String>,
}

pub async fn run(db: &DbConnection, action: &MigrateAction) -> anyhow::Result<MigrationReport> {
    match action {
        MigrateAction::Up { steps } => {
            info!(?steps, "Applying migrations");
            Migrator::up(db, *steps).await?;
        }
        MigrateAction::Down { steps } => {
            info!(steps, "Rolling back migrations");
            Migrator::down(db, Some(*steps)).await?;
        }
        MigrateAction::Fresh => {
            info!("Recreating schema from scratch");
            Migrator::fresh(db).await?;
        }
        MigrateAction::Status => {}
    }
    report(db).await
}

async fn report(db: &DbConnection) -> anyhow::Result<MigrationReport> {
    let applied = Migrator::get_applied_migrations(db)
        .await?
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    let pending = Migrator::get_pending_migrations(db)
        .await?
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    Ok(MigrationReport { applied, pending })
}

fn print_text(report: &MigrationReport) {
    println!();
    println!("{}", "Migrations".bright_white().bold());
    for name in &report.applied {
        println!("  {} {}", "applied".bright_green(), name);
    }
    for name in &report.pending {
        println!("  {} {}", "pending".bright_yellow(), name);
    }
    println!();
    println!(
        "{} applied, {} pending",
        report.applied.len().to_string().bright_cyan(),
        report.pending.len().to_string().bright_cyan()
    );
}

impl MigrateCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        debug!("Initializing database connection...");
        let rt = tokio::runtime::Runtime::new()?;
        let db = rt.block_on(establish_connection(&self.database.config()))?;

        let report = rt.block_on(run(db.as_ref(), &self.action))?;

        match self.output_format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Text => print_text(&report),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipyard_database::connect;
    use shipyard_core::DatabaseConfig;

    async fn empty_db() -> anyhow::Result<std::sync::Arc<DbConnection>> {
        let config = DatabaseConfig {
            run_migrations: false,
            ..DatabaseConfig::new("sqlite::memory:")
        };
        Ok(establish_connection(&config).await?)
    }

    #[tokio::test]
    async fn test_up_status_down() -> anyhow::Result<()> {
        let db = empty_db().await?;
        let total = Migrator::migrations().len();

        let status = run(&db, &MigrateAction::Status).await?;
        assert!(status.applied.is_empty());
        assert_eq!(status.pending.len(), total);

        let partial = run(&db, &MigrateAction::Up { steps: Some(2) }).await?;
        assert_eq!(partial.applied.len(), 2);
        assert_eq!(partial.applied, status.pending[..2].to_vec());

        let full = run(&db, &MigrateAction::Up { steps: None }).await?;
        assert_eq!(full.applied.len(), total);
        assert!(full.pending.is_empty());

        let rolled_back = run(&db, &MigrateAction::Down { steps: 1 }).await?;
        assert_eq!(rolled_back.pending, vec![full.applied[total - 1].clone()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_fresh_reapplies_everything() -> anyhow::Result<()> {
        let db = connect("sqlite::memory:").await?;
        let report = run(&db, &MigrateAction::Fresh).await?;
        assert_eq!(report.applied.len(), Migrator::migrations().len());
        assert!(report.pending.is_empty());
        Ok(())
    }
}
