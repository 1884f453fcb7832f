use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, Condition};
use shipyard_core::{generate_hex, is_valid_hostname, normalize_hostname, DBDateTime};
use shipyard_entities::{deployments, domains};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{DbConnection, DbError, DbResult, ListQuery, Repository};

pub struct DomainStore {
    domains: Repository<domains::Entity>,
    deployments: Repository<deployments::Entity>,
}

impl DomainStore {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            domains: Repository::new(db.clone()),
            deployments: Repository::new(db),
        }
    }

    /// Attach `hostname` to a deployment, unverified, with a fresh
    /// verification code. Hostnames are unique across all deployments.
    pub async fn attach(&self, deployment_id: Uuid, hostname: &str) -> DbResult<domains::Model> {
        let hostname = normalize_hostname(hostname);
        if !is_valid_hostname(&hostname) {
            return Err(DbError::validation(format!("invalid hostname '{}'", hostname)));
        }
        self.deployments.get(deployment_id).await?;

        let domain = self
            .domains
            .insert(domains::ActiveModel {
                deployment_id: Set(deployment_id),
                domain: Set(hostname),
                verification_code: Set(Some(generate_hex(16))),
                is_verified: Set(false),
                ..Default::default()
            })
            .await?;

        info!(domain = %domain.domain, deployment_id = %deployment_id, "Attached domain");
        Ok(domain)
    }

    pub async fn get(&self, id: Uuid) -> DbResult<domains::Model> {
        self.domains.get(id).await
    }

    pub async fn find_by_hostname(&self, hostname: &str) -> DbResult<Option<domains::Model>> {
        self.domains
            .find_one(Condition::all().add(domains::Column::Domain.eq(normalize_hostname(hostname))))
            .await
    }

    pub async fn list_for_deployment(&self, deployment_id: Uuid) -> DbResult<Vec<domains::Model>> {
        self.domains
            .find(
                &ListQuery::new()
                    .filter(Condition::all().add(domains::Column::DeploymentId.eq(deployment_id)))
                    .order_by("domain", false),
            )
            .await
    }

    pub async fn mark_verified(&self, id: Uuid) -> DbResult<domains::Model> {
        let domain = self
            .domains
            .update(domains::ActiveModel {
                id: Set(id),
                is_verified: Set(true),
                ..Default::default()
            })
            .await?;
        info!(domain = %domain.domain, "Domain verified");
        Ok(domain)
    }

    pub async fn store_certificate(
        &self,
        id: Uuid,
        certificate: &str,
        private_key: &str,
        expires_at: DBDateTime,
    ) -> DbResult<domains::Model> {
        let domain = self
            .domains
            .update(domains::ActiveModel {
                id: Set(id),
                ssl_certificate: Set(Some(certificate.to_string())),
                ssl_key: Set(Some(private_key.to_string())),
                ssl_expires_at: Set(Some(expires_at)),
                ..Default::default()
            })
            .await?;
        info!(domain = %domain.domain, %expires_at, "Stored TLS certificate");
        Ok(domain)
    }

    /// Verified domains whose certificate expires before `before`, soonest first
    pub async fn expiring_before(&self, before: DBDateTime) -> DbResult<Vec<domains::Model>> {
        self.domains
            .find(
                &ListQuery::new()
                    .filter(
                        Condition::all()
                            .add(domains::Column::IsVerified.eq(true))
                            .add(domains::Column::SslExpiresAt.is_not_null())
                            .add(domains::Column::SslExpiresAt.lt(before)),
                    )
                    .order_by("ssl_expires_at", false),
            )
            .await
    }

    pub async fn detach(&self, id: Uuid) -> DbResult<()> {
        if !self.domains.delete(id).await? {
            return Err(DbError::not_found::<domains::Entity>(id));
        }
        info!(domain_id = %id, "Detached domain");
        Ok(())
    }
}
