//! Per-aggregate stores built on [`Repository`](crate::Repository).
//!
//! Each store owns the invariants of its aggregate (normalisation, lifecycle
//! transitions, scope rules) and delegates plain row access to the generic
//! repository.

mod api_keys;
mod billing;
mod build_queue;
mod compliance;
mod deployments;
mod domains;
mod env_vars;
mod notifications;
mod projects;
mod services;
mod users;
mod webhook_events;

pub use api_keys::{ApiKeyStore, IssuedApiKey};
pub use billing::{billing_period_for, BillingStore, NewInvoice, NewSubscription, NewUsage, UsageTotal};
pub use build_queue::{BuildOutcome, BuildQueueStore};
pub use compliance::{AuditFilter, ComplianceStore, NewAuditLog};
pub use deployments::{DeploymentLineage, DeploymentStore, GitCommit};
pub use domains::DomainStore;
pub use env_vars::{EncryptedValue, EnvVarStore, ResolvedEnvVar, ScopeViolation};
pub use notifications::NotificationStore;
pub use projects::{NewProject, ProjectStore};
pub use services::{NewService, ResourceSpec, ServiceStore};
pub use users::{NewUser, UserStore};
pub use webhook_events::{NewWebhookEvent, WebhookEventStore};

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::test_utils::TestDatabase;
    use shipyard_entities::types::ServiceType;
    use shipyard_entities::{deployments, projects, services, users, ServiceSource};

    /// user -> project -> service -> deployment, the chain most store tests need
    pub struct Chain {
        pub user: users::Model,
        pub project: projects::Model,
        pub service: services::Model,
        pub deployment: deployments::Model,
    }

    pub async fn user(test_db: &TestDatabase, email: &str) -> anyhow::Result<users::Model> {
        let store = UserStore::new(test_db.db.clone());
        Ok(store.create(NewUser::new(email, "argon2-hash")).await?)
    }

    pub async fn chain(test_db: &TestDatabase) -> anyhow::Result<Chain> {
        let user = user(test_db, "owner@example.com").await?;
        let project = ProjectStore::new(test_db.db.clone())
            .create(NewProject::new(user.id, "Demo"))
            .await?;
        let service = ServiceStore::new(test_db.db.clone())
            .create(NewService::new(
                project.id,
                "web",
                ServiceType::Docker,
                ServiceSource::image("nginx", "1.27"),
            ))
            .await?;
        let deployment = DeploymentStore::new(test_db.db.clone())
            .create(service.id, "web-1", None)
            .await?;
        Ok(Chain {
            user,
            project,
            service,
            deployment,
        })
    }
}
