//! Database connection, transactions and data access for Shipyard

pub use sea_orm;
mod connection;
mod error;
mod repository;
mod transaction;

pub mod stores;

pub use connection::{connect, establish_connection, DbConnection};
pub use error::{DbError, DbResult};
pub use repository::{GroupCount, ListQuery, Repository};
pub use transaction::{begin, run_in_transaction, TransactionIsolationLevel};

// Export test utilities for use by other crates in their tests
pub mod test_utils;
