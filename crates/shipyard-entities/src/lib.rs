//! sea-orm entities for the Shipyard data model
//!
//! Ownership is hierarchical: user -> project -> service -> deployment, with
//! domains and environment variables hanging off deployments. Environment
//! variables may also attach to a service or a project (see [`EnvVarScope`]).

pub mod types;
pub mod json;
pub mod record;
pub mod scope;
pub mod source;

// Accounts
pub mod users;
pub mod api_keys;

// Deployable resources
pub mod projects;
pub mod services;
pub mod deployments;
pub mod environment_variables;
pub mod domains;

// Operational side-entities
pub mod build_queue;
pub mod webhook_events;

// Billing
pub mod subscriptions;
pub mod usage_records;
pub mod invoices;

// Compliance and messaging
pub mod audit_logs;
pub mod gdpr_consents;
pub mod gdpr_data_requests;
pub mod notifications;

pub mod prelude;

pub use json::NullableJson;
pub use record::{field_names, parse_field, Record, UnknownField};
pub use scope::{EnvVarScope, ScopeError};
pub use source::ServiceSource;
