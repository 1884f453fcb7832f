//! Error categories for persistence operations

use sea_orm::{DbErr, SqlErr, TransactionError};
use shipyard_core::ServiceError;
use shipyard_entities::{Record, ScopeError, UnknownField};
use std::fmt::Display;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// A required fetch found no row
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Unique constraint violation: {message}")]
    UniqueViolation { message: String },

    #[error("Foreign key constraint violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Pool or transport failure
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Illegal lifecycle transition
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Query(DbErr),
}

impl DbError {
    pub fn not_found<E: Record>(id: impl Display) -> Self {
        DbError::NotFound {
            entity: E::NAME,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DbError::Validation(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        DbError::InvalidState(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }
}

impl From<DbErr> for DbError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(message)) => {
                return DbError::UniqueViolation { message };
            }
            Some(SqlErr::ForeignKeyConstraintViolation(message)) => {
                return DbError::ForeignKeyViolation { message };
            }
            _ => {}
        }

        match err {
            DbErr::ConnectionAcquire(e) => DbError::Connection(e.to_string()),
            DbErr::Conn(e) => DbError::Connection(e.to_string()),
            DbErr::RecordNotFound(message) => DbError::NotFound {
                entity: "record",
                id: message,
            },
            other => DbError::Query(other),
        }
    }
}

impl From<TransactionError<DbError>> for DbError {
    fn from(err: TransactionError<DbError>) -> Self {
        match err {
            TransactionError::Connection(e) => e.into(),
            TransactionError::Transaction(e) => e,
        }
    }
}

impl From<UnknownField> for DbError {
    fn from(err: UnknownField) -> Self {
        DbError::Validation(err.to_string())
    }
}

impl From<ScopeError> for DbError {
    fn from(err: ScopeError) -> Self {
        DbError::Validation(err.to_string())
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ServiceError::NotFound {
                resource: format!("{} {}", entity, id),
            },
            DbError::UniqueViolation { message } => ServiceError::Conflict { message },
            DbError::ForeignKeyViolation { message } => ServiceError::Conflict { message },
            DbError::Validation(message) => ServiceError::Validation { message },
            DbError::InvalidState(message) => ServiceError::Conflict { message },
            DbError::Connection(message) => ServiceError::Database(message),
            DbError::Query(e) => ServiceError::Database(e.to_string()),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
