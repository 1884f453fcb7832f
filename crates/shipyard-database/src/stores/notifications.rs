use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter};
use shipyard_core::{DBDateTime, PaginationParams};
use shipyard_entities::notifications;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{DbConnection, DbError, DbResult, ListQuery, Repository};

pub struct NotificationStore {
    db: Arc<DbConnection>,
    notifications: Repository<notifications::Entity>,
}

fn unread_of(user_id: Uuid) -> Condition {
    Condition::all()
        .add(notifications::Column::UserId.eq(user_id))
        .add(notifications::Column::Read.eq(false))
}

impl NotificationStore {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            notifications: Repository::new(db.clone()),
            db,
        }
    }

    pub async fn notify(
        &self,
        user_id: Uuid,
        notification_type: &str,
        title: &str,
        message: &str,
    ) -> DbResult<notifications::Model> {
        if title.trim().is_empty() {
            return Err(DbError::validation("notification title cannot be empty"));
        }

        let notification = self
            .notifications
            .insert(notifications::ActiveModel {
                user_id: Set(user_id),
                notification_type: Set(notification_type.to_string()),
                title: Set(title.to_string()),
                message: Set(message.to_string()),
                read: Set(false),
                ..Default::default()
            })
            .await?;
        debug!(notification_id = %notification.id, %user_id, notification_type, "Created notification");
        Ok(notification)
    }

    /// Unread notifications, newest first
    pub async fn unread(&self, user_id: Uuid) -> DbResult<Vec<notifications::Model>> {
        self.notifications
            .find(
                &ListQuery::new()
                    .filter(unread_of(user_id))
                    .order_by("created_at", true),
            )
            .await
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        pagination: PaginationParams,
    ) -> DbResult<Vec<notifications::Model>> {
        self.notifications
            .find(
                &ListQuery::new()
                    .filter(Condition::all().add(notifications::Column::UserId.eq(user_id)))
                    .paginate(pagination),
            )
            .await
    }

    /// Marking an already read notification keeps its original `read_at`
    pub async fn mark_read(&self, id: Uuid) -> DbResult<notifications::Model> {
        let current = self.notifications.get(id).await?;
        if current.read {
            return Ok(current);
        }
        self.notifications
            .update(notifications::ActiveModel {
                id: Set(id),
                read: Set(true),
                read_at: Set(Some(shipyard_core::db_now())),
                ..Default::default()
            })
            .await
    }

    /// Returns the number of notifications that changed
    pub async fn mark_all_read(&self, user_id: Uuid) -> DbResult<u64> {
        let result = notifications::Entity::update_many()
            .col_expr(notifications::Column::Read, Expr::value(true))
            .col_expr(notifications::Column::ReadAt, Expr::value(shipyard_core::db_now()))
            .filter(unread_of(user_id))
            .exec(&*self.db)
            .await?;
        debug!(%user_id, updated = result.rows_affected, "Marked notifications read");
        Ok(result.rows_affected)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> DbResult<u64> {
        self.notifications.count(unread_of(user_id)).await
    }

    /// Housekeeping: drop read notifications created before `before`
    pub async fn delete_read_older_than(&self, before: DBDateTime) -> DbResult<u64> {
        let removed = self
            .notifications
            .delete_where(
                Condition::all()
                    .add(notifications::Column::Read.eq(true))
                    .add(notifications::Column::CreatedAt.lt(before)),
            )
            .await?;
        if removed > 0 {
            info!(removed, %before, "Pruned read notifications");
        }
        Ok(removed)
    }
}
