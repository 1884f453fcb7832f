//! Database migrations for the Shipyard schema

pub use sea_orm_migration::prelude::*;

mod migration;

pub use migration::Migrator;
