//! Shipyard CLI - schema management and inspection for the Shipyard database

mod commands;

use clap::{Parser, Subcommand};
use commands::{MigrateCommand, StatsCommand};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "SHIPYARD_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(
        long,
        default_value = "compact",
        env = "SHIPYARD_LOG_FORMAT",
        global = true
    )]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply, roll back or inspect schema migrations
    Migrate(MigrateCommand),
    /// Print row counts per table
    Stats(StatsCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins when set; otherwise every shipyard crate logs at --log-level
    // and the database drivers only warn
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .expect("Invalid RUST_LOG environment variable")
    } else {
        tracing_subscriber::EnvFilter::new(format!(
            "shipyard_cli={level},\
             shipyard_core={level},\
             shipyard_entities={level},\
             shipyard_migrations={level},\
             shipyard_database={level},\
             sea_orm_migration={level},\
             sqlx=warn,\
             sea_orm=warn",
            level = cli.log_level
        ))
    };

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default subscriber");

    match cli.command {
        Commands::Migrate(migrate_cmd) => migrate_cmd.execute(),
        Commands::Stats(stats_cmd) => stats_cmd.execute(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "shipyard",
            "stats",
            "--database-url",
            "sqlite::memory:",
            "--log-level",
            "debug",
            "--log-format",
            "full",
        ])
        .expect("valid arguments");
        assert_eq!(cli.log_level, "debug");
        assert_eq!(cli.log_format, "full");
        assert!(matches!(cli.command, Commands::Stats(_)));
    }
}
