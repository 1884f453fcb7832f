pub mod migrate;
pub mod stats;

pub use migrate::MigrateCommand;
pub use stats::StatsCommand;

use clap::Args;
use shipyard_core::DatabaseConfig;

/// Output format shared by the reporting commands
#[derive(Debug, Clone, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors and formatting
    #[default]
    Text,
    /// JSON output for automation and scripting
    Json,
}

/// Connection settings common to every command
#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// Database connection URL (postgres://... or sqlite://...)
    #[arg(long, env = "SHIPYARD_DATABASE_URL")]
    pub database_url: String,

    /// Maximum pooled connections
    #[arg(long, default_value_t = 5, env = "SHIPYARD_DB_MAX_CONNECTIONS")]
    pub max_connections: u32,

    /// Seconds to wait for a connection
    #[arg(long, default_value_t = 10, env = "SHIPYARD_DB_CONNECT_TIMEOUT")]
    pub connect_timeout: u64,

    /// Log every SQL statement
    #[arg(long, env = "SHIPYARD_SQLX_LOGGING")]
    pub sqlx_logging: bool,
}

impl DatabaseArgs {
    /// Commands decide themselves when migrations run
    pub fn config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.database_url.clone(),
            max_connections: self.max_connections,
            min_connections: 1,
            connect_timeout_secs: self.connect_timeout,
            sqlx_logging: self.sqlx_logging,
            run_migrations: false,
        }
    }
}
