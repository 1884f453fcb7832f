use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, Condition};
use serde::{Deserialize, Serialize};
use shipyard_core::PaginationParams;
use shipyard_entities::build_queue;
use shipyard_entities::types::BuildStatus;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{run_in_transaction, DbConnection, DbError, DbResult, GroupCount, ListQuery, Repository};

type Builds = Repository<build_queue::Entity>;

/// How a running build ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildOutcome {
    Succeeded,
    Failed { error: String },
    Cancelled,
}

impl BuildOutcome {
    fn status(&self) -> BuildStatus {
        match self {
            BuildOutcome::Succeeded => BuildStatus::Succeeded,
            BuildOutcome::Failed { .. } => BuildStatus::Failed,
            BuildOutcome::Cancelled => BuildStatus::Cancelled,
        }
    }
}

pub struct BuildQueueStore {
    db: Arc<DbConnection>,
    builds: Builds,
}

impl BuildQueueStore {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            builds: Repository::new(db.clone()),
            db,
        }
    }

    pub async fn enqueue(&self, service_id: Uuid, deployment_id: Uuid) -> DbResult<build_queue::Model> {
        let build = self
            .builds
            .insert(build_queue::ActiveModel {
                service_id: Set(service_id),
                deployment_id: Set(deployment_id),
                status: Set(BuildStatus::Queued),
                ..Default::default()
            })
            .await?;
        info!(build_id = %build.id, %service_id, %deployment_id, "Build queued");
        Ok(build)
    }

    pub async fn get(&self, id: Uuid) -> DbResult<build_queue::Model> {
        self.builds.get(id).await
    }

    /// Oldest queued build, if any
    pub async fn next_queued(&self) -> DbResult<Option<build_queue::Model>> {
        let oldest_first = PaginationParams {
            sort_order: Some("asc".to_string()),
            ..PaginationParams::new(1, 1)
        };
        let next = self
            .builds
            .find(
                &ListQuery::new()
                    .filter(Condition::all().add(build_queue::Column::Status.eq(BuildStatus::Queued)))
                    .paginate(oldest_first),
            )
            .await?;
        Ok(next.into_iter().next())
    }

    /// queued -> building, stamping the start time
    pub async fn start(&self, id: Uuid) -> DbResult<build_queue::Model> {
        self.transition(id, BuildStatus::Building, None).await
    }

    /// building -> succeeded/failed/cancelled, stamping the end time and duration
    pub async fn finish(&self, id: Uuid, outcome: BuildOutcome) -> DbResult<build_queue::Model> {
        let status = outcome.status();
        let error = match outcome {
            BuildOutcome::Failed { error } => Some(error),
            _ => None,
        };
        self.transition(id, status, error).await
    }

    /// Cancel a queued or running build
    pub async fn cancel(&self, id: Uuid) -> DbResult<build_queue::Model> {
        self.transition(id, BuildStatus::Cancelled, None).await
    }

    pub async fn list_for_service(&self, service_id: Uuid) -> DbResult<Vec<build_queue::Model>> {
        self.builds
            .find(
                &ListQuery::new()
                    .filter(Condition::all().add(build_queue::Column::ServiceId.eq(service_id)))
                    .order_by("created_at", true),
            )
            .await
    }

    /// Number of builds per status
    pub async fn status_counts(&self) -> DbResult<Vec<GroupCount>> {
        self.builds
            .count_by(build_queue::Column::Status, Condition::all())
            .await
    }

    async fn transition(
        &self,
        id: Uuid,
        status: BuildStatus,
        error: Option<String>,
    ) -> DbResult<build_queue::Model> {
        run_in_transaction(&self.db, None, move |txn| {
            Box::pin(async move {
                let current = Builds::get_in(txn, id).await?;
                if !current.status.can_transition_to(status) {
                    return Err(DbError::invalid_state(format!(
                        "build {} cannot move from {} to {}",
                        id, current.status, status
                    )));
                }

                let now = shipyard_core::db_now();
                let mut model = build_queue::ActiveModel {
                    id: Set(id),
                    status: Set(status),
                    ..Default::default()
                };
                if status == BuildStatus::Building {
                    model.build_start_time = Set(Some(now));
                } else {
                    model.build_end_time = Set(Some(now));
                    model.build_duration_seconds =
                        Set(current.build_start_time.map(|start| (now - start).num_seconds()));
                    model.error_message = Set(error);
                }

                let updated = Builds::update_in(txn, model).await?;
                if status == BuildStatus::Failed {
                    warn!(build_id = %id, error = ?updated.error_message, "Build failed");
                } else {
                    info!(build_id = %id, from = %current.status, to = %status, "Build transitioned");
                }
                Ok(updated)
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestDatabase;

    #[tokio::test]
    async fn test_queue_is_fifo() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let store = BuildQueueStore::new(test_db.db.clone());
        let service_id = Uuid::new_v4();

        assert!(store.next_queued().await?.is_none());
        let first = store.enqueue(service_id, Uuid::new_v4()).await?;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.enqueue(service_id, Uuid::new_v4()).await?;

        assert_eq!(store.next_queued().await?.map(|b| b.id), Some(first.id));
        store.start(first.id).await?;
        assert_eq!(store.next_queued().await?.map(|b| b.id), Some(second.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_build_lifecycle() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let store = BuildQueueStore::new(test_db.db.clone());

        let build = store.enqueue(Uuid::new_v4(), Uuid::new_v4()).await?;
        assert!(build.build_start_time.is_none());

        let started = store.start(build.id).await?;
        assert_eq!(started.status, BuildStatus::Building);
        assert!(started.build_start_time.is_some());

        let failed = store
            .finish(
                build.id,
                BuildOutcome::Failed {
                    error: "npm ERR! missing script: build".to_string(),
                },
            )
            .await?;
        assert_eq!(failed.status, BuildStatus::Failed);
        assert!(failed.build_end_time.is_some());
        assert_eq!(failed.build_duration_seconds, Some(0));
        assert_eq!(
            failed.error_message.as_deref(),
            Some("npm ERR! missing script: build")
        );

        let err = store.start(build.id).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidState(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_finish_requires_running_build() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let store = BuildQueueStore::new(test_db.db.clone());

        let build = store.enqueue(Uuid::new_v4(), Uuid::new_v4()).await?;
        let err = store
            .finish(build.id, BuildOutcome::Succeeded)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidState(_)));

        // A queued build can still be cancelled; it never started
        let cancelled = store.cancel(build.id).await?;
        assert_eq!(cancelled.status, BuildStatus::Cancelled);
        assert!(cancelled.build_duration_seconds.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_status_counts() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let store = BuildQueueStore::new(test_db.db.clone());
        let service_id = Uuid::new_v4();

        let a = store.enqueue(service_id, Uuid::new_v4()).await?;
        store.enqueue(service_id, Uuid::new_v4()).await?;
        store.enqueue(Uuid::new_v4(), Uuid::new_v4()).await?;
        store.start(a.id).await?;
        store.finish(a.id, BuildOutcome::Succeeded).await?;

        let counts = store.status_counts().await?;
        let as_pairs: Vec<(Option<&str>, i64)> = counts
            .iter()
            .map(|c| (c.key.as_deref(), c.count))
            .collect();
        assert_eq!(as_pairs, vec![(Some("queued"), 2), (Some("succeeded"), 1)]);

        assert_eq!(store.list_for_service(service_id).await?.len(), 2);
        Ok(())
    }
}
