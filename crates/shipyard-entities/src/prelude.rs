pub use super::api_keys::Entity as ApiKeys;
pub use super::audit_logs::Entity as AuditLogs;
pub use super::build_queue::Entity as BuildQueue;
pub use super::deployments::Entity as Deployments;
pub use super::domains::Entity as Domains;
pub use super::environment_variables::Entity as EnvironmentVariables;
pub use super::gdpr_consents::Entity as GdprConsents;
pub use super::gdpr_data_requests::Entity as GdprDataRequests;
pub use super::invoices::Entity as Invoices;
pub use super::notifications::Entity as Notifications;
pub use super::projects::Entity as Projects;
pub use super::services::Entity as Services;
pub use super::subscriptions::Entity as Subscriptions;
pub use super::usage_records::Entity as UsageRecords;
pub use super::users::Entity as Users;
pub use super::webhook_events::Entity as WebhookEvents;
