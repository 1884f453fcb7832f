//! Configuration management utilities

use serde::{Deserialize, Serialize};

use crate::{ServiceError, ServiceResult};

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    /// Log every statement sea-orm/sqlx executes
    pub sqlx_logging: bool,
    /// Apply pending migrations right after connecting
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 100,
            min_connections: 5,
            connect_timeout_secs: 10,
            sqlx_logging: false,
            run_migrations: true,
        }
    }
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }

    /// Reject settings the pool cannot honour
    pub fn validate(&self) -> ServiceResult<()> {
        if self.url.trim().is_empty() {
            return Err(ServiceError::Configuration {
                message: "database url must not be empty".to_string(),
            });
        }
        if self.max_connections == 0 {
            return Err(ServiceError::Configuration {
                message: "max_connections must be at least 1".to_string(),
            });
        }
        if self.min_connections > self.max_connections {
            return Err(ServiceError::Configuration {
                message: format!(
                    "min_connections ({}) exceeds max_connections ({})",
                    self.min_connections, self.max_connections
                ),
            });
        }
        Ok(())
    }
}

/// Common pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: Some(1),
            page_size: Some(20),
            sort_by: Some("created_at".to_string()),
            sort_order: Some("desc".to_string()),
        }
    }
}

impl PaginationParams {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
            ..Default::default()
        }
    }

    pub fn normalize(&self) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self.page_size.unwrap_or(20).clamp(1, 100);
        (page, page_size)
    }

    /// Row offset of the first item on the requested page
    pub fn offset(&self) -> u64 {
        let (page, page_size) = self.normalize();
        (page - 1) * page_size
    }

    pub fn is_descending(&self) -> bool {
        !matches!(self.sort_order.as_deref(), Some("asc") | Some("ASC"))
    }
}
