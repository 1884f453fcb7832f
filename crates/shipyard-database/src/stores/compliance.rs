use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Deserialize;
use shipyard_core::DBDateTime;
use shipyard_entities::types::{GdprRequestStatus, GdprRequestType};
use shipyard_entities::{audit_logs, gdpr_consents, gdpr_data_requests, NullableJson};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{run_in_transaction, DbConnection, DbError, DbResult, ListQuery, Repository};

type DataRequests = Repository<gdpr_data_requests::Entity>;

const DEFAULT_AUDIT_LIMIT: u64 = 100;
const MAX_AUDIT_LIMIT: u64 = 1000;

#[derive(Debug, Clone, Default)]
pub struct NewAuditLog {
    /// `None` for system actions
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<String>,
    pub metadata: NullableJson,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewAuditLog {
    pub fn new(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            resource: resource.into(),
            ..Default::default()
        }
    }
}

/// Audit trail query; unset fields do not filter. `from` is inclusive, `to`
/// exclusive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilter {
    pub user_id: Option<Uuid>,
    pub action: Option<String>,
    pub resource: Option<String>,
    pub resource_id: Option<String>,
    pub from: Option<DBDateTime>,
    pub to: Option<DBDateTime>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl AuditFilter {
    fn condition(&self) -> Condition {
        let mut condition = Condition::all();
        if let Some(user_id) = self.user_id {
            condition = condition.add(audit_logs::Column::UserId.eq(user_id));
        }
        if let Some(action) = &self.action {
            condition = condition.add(audit_logs::Column::Action.eq(action.as_str()));
        }
        if let Some(resource) = &self.resource {
            condition = condition.add(audit_logs::Column::Resource.eq(resource.as_str()));
        }
        if let Some(resource_id) = &self.resource_id {
            condition = condition.add(audit_logs::Column::ResourceId.eq(resource_id.as_str()));
        }
        if let Some(from) = self.from {
            condition = condition.add(audit_logs::Column::CreatedAt.gte(from));
        }
        if let Some(to) = self.to {
            condition = condition.add(audit_logs::Column::CreatedAt.lt(to));
        }
        condition
    }
}

pub struct ComplianceStore {
    db: Arc<DbConnection>,
    audit_logs: Repository<audit_logs::Entity>,
    consents: Repository<gdpr_consents::Entity>,
    requests: DataRequests,
}

impl ComplianceStore {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            audit_logs: Repository::new(db.clone()),
            consents: Repository::new(db.clone()),
            requests: Repository::new(db.clone()),
            db,
        }
    }

    // Audit log

    pub async fn record_audit(&self, entry: NewAuditLog) -> DbResult<audit_logs::Model> {
        if entry.action.trim().is_empty() || entry.resource.trim().is_empty() {
            return Err(DbError::validation("audit action and resource are required"));
        }

        let log = self
            .audit_logs
            .insert(audit_logs::ActiveModel {
                user_id: Set(entry.user_id),
                action: Set(entry.action),
                resource: Set(entry.resource),
                resource_id: Set(entry.resource_id),
                metadata: entry.metadata.into_nullable(),
                ip_address: Set(entry.ip_address),
                user_agent: Set(entry.user_agent),
                ..Default::default()
            })
            .await?;

        debug!(
            audit_id = %log.id,
            action = %log.action,
            resource = %log.resource,
            "Recorded audit log"
        );
        Ok(log)
    }

    /// Matching entries, newest first
    pub async fn audit_trail(&self, filter: &AuditFilter) -> DbResult<Vec<audit_logs::Model>> {
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_AUDIT_LIMIT)
            .clamp(1, MAX_AUDIT_LIMIT);

        Ok(audit_logs::Entity::find()
            .filter(filter.condition())
            .order_by_desc(audit_logs::Column::CreatedAt)
            .order_by_desc(audit_logs::Column::Id)
            .offset(filter.offset.unwrap_or(0))
            .limit(limit)
            .all(&*self.db)
            .await?)
    }

    // Consents

    /// Consents are append only; the latest row per type is authoritative
    pub async fn record_consent(
        &self,
        user_id: Uuid,
        consent_type: &str,
        version: &str,
        accepted: bool,
    ) -> DbResult<gdpr_consents::Model> {
        if consent_type.trim().is_empty() || version.trim().is_empty() {
            return Err(DbError::validation("consent type and version are required"));
        }

        let consent = self
            .consents
            .insert(gdpr_consents::ActiveModel {
                user_id: Set(user_id),
                consent_type: Set(consent_type.to_string()),
                version: Set(version.to_string()),
                accepted: Set(accepted),
                ..Default::default()
            })
            .await?;
        info!(%user_id, consent_type, version, accepted, "Recorded consent");
        Ok(consent)
    }

    pub async fn latest_consent(
        &self,
        user_id: Uuid,
        consent_type: &str,
    ) -> DbResult<Option<gdpr_consents::Model>> {
        Ok(gdpr_consents::Entity::find()
            .filter(gdpr_consents::Column::UserId.eq(user_id))
            .filter(gdpr_consents::Column::ConsentType.eq(consent_type))
            .order_by_desc(gdpr_consents::Column::CreatedAt)
            .one(&*self.db)
            .await?)
    }

    /// Oldest first
    pub async fn consent_history(&self, user_id: Uuid) -> DbResult<Vec<gdpr_consents::Model>> {
        self.consents
            .find(
                &ListQuery::new()
                    .filter(Condition::all().add(gdpr_consents::Column::UserId.eq(user_id)))
                    .order_by("created_at", false),
            )
            .await
    }

    // Data subject requests

    /// Open a new export or deletion request. Only one pending or processing
    /// request of each type may exist per user.
    pub async fn open_data_request(
        &self,
        user_id: Uuid,
        request_type: GdprRequestType,
    ) -> DbResult<gdpr_data_requests::Model> {
        let request = run_in_transaction(&self.db, None, move |txn| {
            Box::pin(async move {
                let open = DataRequests::count_in(
                    txn,
                    Condition::all()
                        .add(gdpr_data_requests::Column::UserId.eq(user_id))
                        .add(gdpr_data_requests::Column::RequestType.eq(request_type))
                        .add(gdpr_data_requests::Column::Status.is_in([
                            GdprRequestStatus::Pending,
                            GdprRequestStatus::Processing,
                        ])),
                )
                .await?;
                let already_open = || {
                    DbError::invalid_state(format!(
                        "user {} already has an open {} request",
                        user_id, request_type
                    ))
                };
                if open > 0 {
                    return Err(already_open());
                }

                // A concurrent opener that passed the count trips the partial unique index
                DataRequests::insert_in(
                    txn,
                    gdpr_data_requests::ActiveModel {
                        user_id: Set(user_id),
                        request_type: Set(request_type),
                        status: Set(GdprRequestStatus::Pending),
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| match e {
                    DbError::UniqueViolation { .. } => already_open(),
                    other => other,
                })
            })
        })
        .await?;

        info!(request_id = %request.id, %user_id, %request_type, "Opened data request");
        Ok(request)
    }

    /// pending -> processing
    pub async fn start_data_request(&self, id: Uuid) -> DbResult<gdpr_data_requests::Model> {
        let current = self.requests.get(id).await?;
        if current.status != GdprRequestStatus::Pending {
            return Err(DbError::invalid_state(format!(
                "data request {} is {}, expected pending",
                id, current.status
            )));
        }
        self.requests
            .update(gdpr_data_requests::ActiveModel {
                id: Set(id),
                status: Set(GdprRequestStatus::Processing),
                ..Default::default()
            })
            .await
    }

    /// processing -> completed. Exports carry the archive location and its expiry.
    pub async fn complete_data_request(
        &self,
        id: Uuid,
        download_url: Option<&str>,
        expires_at: Option<DBDateTime>,
    ) -> DbResult<gdpr_data_requests::Model> {
        let current = self.requests.get(id).await?;
        if current.status != GdprRequestStatus::Processing {
            return Err(DbError::invalid_state(format!(
                "data request {} is {}, expected processing",
                id, current.status
            )));
        }

        let completed = self
            .requests
            .update(gdpr_data_requests::ActiveModel {
                id: Set(id),
                status: Set(GdprRequestStatus::Completed),
                download_url: Set(download_url.map(str::to_string)),
                expires_at: Set(expires_at),
                completed_at: Set(Some(shipyard_core::db_now())),
                ..Default::default()
            })
            .await?;
        info!(request_id = %id, request_type = %completed.request_type, "Completed data request");
        Ok(completed)
    }

    /// Any open request may fail
    pub async fn fail_data_request(&self, id: Uuid) -> DbResult<gdpr_data_requests::Model> {
        let current = self.requests.get(id).await?;
        if !current.status.is_open() {
            return Err(DbError::invalid_state(format!(
                "data request {} is already {}",
                id, current.status
            )));
        }

        let failed = self
            .requests
            .update(gdpr_data_requests::ActiveModel {
                id: Set(id),
                status: Set(GdprRequestStatus::Failed),
                completed_at: Set(Some(shipyard_core::db_now())),
                ..Default::default()
            })
            .await?;
        warn!(request_id = %id, request_type = %failed.request_type, "Data request failed");
        Ok(failed)
    }

    /// Newest first
    pub async fn data_requests_for_user(&self, user_id: Uuid) -> DbResult<Vec<gdpr_data_requests::Model>> {
        self.requests
            .find(
                &ListQuery::new()
                    .filter(Condition::all().add(gdpr_data_requests::Column::UserId.eq(user_id)))
                    .order_by("created_at", true),
            )
            .await
    }
}
