use super::columns::{timestamp, timestamp_null, uuid_pk};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Queue rows outlive the deployments they built, so no foreign keys here
        manager
            .create_table(
                Table::create()
                    .table(BuildQueue::Table)
                    .if_not_exists()
                    .col(uuid_pk(BuildQueue::Id))
                    .col(ColumnDef::new(BuildQueue::ServiceId).uuid().not_null())
                    .col(ColumnDef::new(BuildQueue::DeploymentId).uuid().not_null())
                    .col(
                        ColumnDef::new(BuildQueue::Status)
                            .string()
                            .not_null()
                            .default("queued"),
                    )
                    .col(timestamp_null(BuildQueue::BuildStartTime))
                    .col(timestamp_null(BuildQueue::BuildEndTime))
                    .col(
                        ColumnDef::new(BuildQueue::BuildDurationSeconds)
                            .big_integer()
                            .null(),
                    )
                    .col(ColumnDef::new(BuildQueue::ErrorMessage).text().null())
                    .col(timestamp(BuildQueue::CreatedAt))
                    .col(timestamp(BuildQueue::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_build_queue_service_id")
                    .table(BuildQueue::Table)
                    .col(BuildQueue::ServiceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_build_queue_status_created_at")
                    .table(BuildQueue::Table)
                    .col(BuildQueue::Status)
                    .col(BuildQueue::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WebhookEvents::Table)
                    .if_not_exists()
                    .col(uuid_pk(WebhookEvents::Id))
                    .col(ColumnDef::new(WebhookEvents::ServiceId).uuid().not_null())
                    .col(ColumnDef::new(WebhookEvents::Provider).string().not_null())
                    .col(ColumnDef::new(WebhookEvents::EventType).string().not_null())
                    .col(ColumnDef::new(WebhookEvents::Payload).json_binary().not_null())
                    .col(ColumnDef::new(WebhookEvents::Signature).string().null())
                    .col(
                        ColumnDef::new(WebhookEvents::Processed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(timestamp_null(WebhookEvents::ProcessedAt))
                    .col(ColumnDef::new(WebhookEvents::Error).text().null())
                    .col(timestamp(WebhookEvents::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_webhook_events_service_id")
                    .table(WebhookEvents::Table)
                    .col(WebhookEvents::ServiceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_webhook_events_processed")
                    .table(WebhookEvents::Table)
                    .col(WebhookEvents::Processed)
                    .col(WebhookEvents::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WebhookEvents::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BuildQueue::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum BuildQueue {
    Table,
    Id,
    ServiceId,
    DeploymentId,
    Status,
    BuildStartTime,
    BuildEndTime,
    BuildDurationSeconds,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum WebhookEvents {
    Table,
    Id,
    ServiceId,
    Provider,
    EventType,
    Payload,
    Signature,
    Processed,
    ProcessedAt,
    Error,
    CreatedAt,
}
