use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, Condition};
use shipyard_core::PaginationParams;
use shipyard_entities::{webhook_events, NullableJson};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{DbConnection, DbError, DbResult, ListQuery, Repository};

/// Inbound event as received from a git provider
#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub service_id: Uuid,
    pub provider: String,
    pub event_type: String,
    pub payload: NullableJson,
    pub signature: Option<String>,
}

pub struct WebhookEventStore {
    events: Repository<webhook_events::Entity>,
}

impl WebhookEventStore {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            events: Repository::new(db),
        }
    }

    /// Store an event unprocessed. The payload column is NOT NULL, so an
    /// SQL `NULL` payload is rejected while a JSON `null` is kept as is.
    pub async fn record(&self, event: NewWebhookEvent) -> DbResult<webhook_events::Model> {
        let payload = event
            .payload
            .into_required()
            .ok_or_else(|| DbError::validation("webhook payload cannot be SQL NULL"))?;
        if payload.is_not_set() {
            return Err(DbError::validation("webhook payload is required"));
        }

        let recorded = self
            .events
            .insert(webhook_events::ActiveModel {
                service_id: Set(event.service_id),
                provider: Set(event.provider),
                event_type: Set(event.event_type),
                payload,
                signature: Set(event.signature),
                processed: Set(false),
                ..Default::default()
            })
            .await?;

        debug!(
            event_id = %recorded.id,
            provider = %recorded.provider,
            event_type = %recorded.event_type,
            "Recorded webhook event"
        );
        Ok(recorded)
    }

    /// Unprocessed events without an error, oldest first
    pub async fn pending(&self, limit: u64) -> DbResult<Vec<webhook_events::Model>> {
        let oldest_first = PaginationParams {
            sort_order: Some("asc".to_string()),
            ..PaginationParams::new(1, limit)
        };
        self.events
            .find(
                &ListQuery::new()
                    .filter(
                        Condition::all()
                            .add(webhook_events::Column::Processed.eq(false))
                            .add(webhook_events::Column::Error.is_null()),
                    )
                    .paginate(oldest_first),
            )
            .await
    }

    pub async fn mark_processed(&self, id: Uuid) -> DbResult<webhook_events::Model> {
        let event = self
            .events
            .update(webhook_events::ActiveModel {
                id: Set(id),
                processed: Set(true),
                processed_at: Set(Some(shipyard_core::db_now())),
                error: Set(None),
                ..Default::default()
            })
            .await?;
        info!(event_id = %id, "Webhook event processed");
        Ok(event)
    }

    /// Park an event with an error; it leaves the pending set until retried
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> DbResult<webhook_events::Model> {
        let event = self
            .events
            .update(webhook_events::ActiveModel {
                id: Set(id),
                error: Set(Some(error.to_string())),
                ..Default::default()
            })
            .await?;
        warn!(event_id = %id, error, "Webhook event failed");
        Ok(event)
    }

    /// Clear the error of a failed event so it is picked up again
    pub async fn retry(&self, id: Uuid) -> DbResult<webhook_events::Model> {
        let current = self.events.get(id).await?;
        if current.processed {
            return Err(DbError::invalid_state(format!(
                "webhook event {} was already processed",
                id
            )));
        }
        self.events
            .update(webhook_events::ActiveModel {
                id: Set(id),
                error: Set(None),
                ..Default::default()
            })
            .await
    }

    pub async fn list_for_service(
        &self,
        service_id: Uuid,
        pagination: PaginationParams,
    ) -> DbResult<Vec<webhook_events::Model>> {
        self.events
            .find(
                &ListQuery::new()
                    .filter(Condition::all().add(webhook_events::Column::ServiceId.eq(service_id)))
                    .paginate(pagination),
            )
            .await
    }
}
