use super::columns::{timestamp, timestamp_null, uuid_pk};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // user_id carries no foreign key: the trail must survive account deletion
        manager
            .create_table(
                Table::create()
                    .table(AuditLogs::Table)
                    .if_not_exists()
                    .col(uuid_pk(AuditLogs::Id))
                    .col(ColumnDef::new(AuditLogs::UserId).uuid().null())
                    .col(ColumnDef::new(AuditLogs::Action).string().not_null())
                    .col(ColumnDef::new(AuditLogs::Resource).string().not_null())
                    .col(ColumnDef::new(AuditLogs::ResourceId).string().null())
                    .col(ColumnDef::new(AuditLogs::Metadata).json_binary().null())
                    .col(ColumnDef::new(AuditLogs::IpAddress).string().null())
                    .col(ColumnDef::new(AuditLogs::UserAgent).text().null())
                    .col(timestamp(AuditLogs::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_audit_logs_user_id_created_at")
                    .table(AuditLogs::Table)
                    .col(AuditLogs::UserId)
                    .col(AuditLogs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_audit_logs_resource")
                    .table(AuditLogs::Table)
                    .col(AuditLogs::Resource)
                    .col(AuditLogs::ResourceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GdprConsents::Table)
                    .if_not_exists()
                    .col(uuid_pk(GdprConsents::Id))
                    .col(ColumnDef::new(GdprConsents::UserId).uuid().not_null())
                    .col(ColumnDef::new(GdprConsents::ConsentType).string().not_null())
                    .col(ColumnDef::new(GdprConsents::Version).string().not_null())
                    .col(ColumnDef::new(GdprConsents::Accepted).boolean().not_null())
                    .col(timestamp(GdprConsents::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_gdpr_consents_user_id_consent_type")
                    .table(GdprConsents::Table)
                    .col(GdprConsents::UserId)
                    .col(GdprConsents::ConsentType)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GdprDataRequests::Table)
                    .if_not_exists()
                    .col(uuid_pk(GdprDataRequests::Id))
                    .col(ColumnDef::new(GdprDataRequests::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(GdprDataRequests::RequestType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GdprDataRequests::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(GdprDataRequests::DownloadUrl).text().null())
                    .col(timestamp_null(GdprDataRequests::ExpiresAt))
                    .col(timestamp_null(GdprDataRequests::CompletedAt))
                    .col(timestamp(GdprDataRequests::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_gdpr_data_requests_user_id")
                    .table(GdprDataRequests::Table)
                    .col(GdprDataRequests::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(uuid_pk(Notifications::Id))
                    .col(ColumnDef::new(Notifications::UserId).uuid().not_null())
                    .col(ColumnDef::new(Notifications::Type).string().not_null())
                    .col(ColumnDef::new(Notifications::Title).string().not_null())
                    .col(ColumnDef::new(Notifications::Message).text().not_null())
                    .col(
                        ColumnDef::new(Notifications::Read)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(timestamp_null(Notifications::ReadAt))
                    .col(timestamp(Notifications::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notifications_user_id_read")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .col(Notifications::Read)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notifications_created_at")
                    .table(Notifications::Table)
                    .col(Notifications::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            Notifications::Table.into_iden(),
            GdprDataRequests::Table.into_iden(),
            GdprConsents::Table.into_iden(),
            AuditLogs::Table.into_iden(),
        ] {
            manager
                .drop_table(Table::drop().table(table).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum AuditLogs {
    Table,
    Id,
    UserId,
    Action,
    Resource,
    ResourceId,
    Metadata,
    IpAddress,
    UserAgent,
    CreatedAt,
}

#[derive(DeriveIden)]
enum GdprConsents {
    Table,
    Id,
    UserId,
    ConsentType,
    Version,
    Accepted,
    CreatedAt,
}

#[derive(DeriveIden)]
enum GdprDataRequests {
    Table,
    Id,
    UserId,
    RequestType,
    Status,
    DownloadUrl,
    ExpiresAt,
    CompletedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Notifications {
    Table,
    Id,
    UserId,
    Type,
    Title,
    Message,
    Read,
    ReadAt,
    CreatedAt,
}
