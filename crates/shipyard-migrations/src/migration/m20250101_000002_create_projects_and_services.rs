use super::columns::{timestamp, timestamp_null, uuid_pk};
use super::m20250101_000001_create_accounts::Users;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(uuid_pk(Projects::Id))
                    .col(ColumnDef::new(Projects::UserId).uuid().not_null())
                    .col(ColumnDef::new(Projects::Name).string().not_null())
                    .col(ColumnDef::new(Projects::Slug).string().not_null())
                    .col(ColumnDef::new(Projects::Description).text().null())
                    .col(
                        ColumnDef::new(Projects::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(timestamp(Projects::CreatedAt))
                    .col(timestamp(Projects::UpdatedAt))
                    .col(timestamp_null(Projects::DeletedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_user_id")
                            .from(Projects::Table, Projects::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Not unique: slugs of soft-deleted projects may be reused
        manager
            .create_index(
                Index::create()
                    .name("idx_projects_user_id_slug")
                    .table(Projects::Table)
                    .col(Projects::UserId)
                    .col(Projects::Slug)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Services::Table)
                    .if_not_exists()
                    .col(uuid_pk(Services::Id))
                    .col(ColumnDef::new(Services::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(Services::Name).string().not_null())
                    .col(ColumnDef::new(Services::ServiceType).string().not_null())
                    .col(ColumnDef::new(Services::RepositoryUrl).string().null())
                    .col(ColumnDef::new(Services::RepositoryProvider).string().null())
                    .col(ColumnDef::new(Services::RepositoryBranch).string().null())
                    .col(ColumnDef::new(Services::DockerImage).string().null())
                    .col(ColumnDef::new(Services::DockerTag).string().null())
                    .col(
                        ColumnDef::new(Services::Port)
                            .integer()
                            .not_null()
                            .default(3000),
                    )
                    .col(
                        ColumnDef::new(Services::Replicas)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Services::CpuLimit)
                            .string()
                            .not_null()
                            .default("1000m"),
                    )
                    .col(
                        ColumnDef::new(Services::MemoryLimit)
                            .string()
                            .not_null()
                            .default("512Mi"),
                    )
                    .col(
                        ColumnDef::new(Services::CpuRequest)
                            .string()
                            .not_null()
                            .default("250m"),
                    )
                    .col(
                        ColumnDef::new(Services::MemoryRequest)
                            .string()
                            .not_null()
                            .default("256Mi"),
                    )
                    .col(
                        ColumnDef::new(Services::HealthCheckPath)
                            .string()
                            .not_null()
                            .default("/"),
                    )
                    .col(
                        ColumnDef::new(Services::AutoDeploy)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Services::Status)
                            .string()
                            .not_null()
                            .default("created"),
                    )
                    .col(timestamp(Services::CreatedAt))
                    .col(timestamp(Services::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_services_project_id")
                            .from(Services::Table, Services::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_services_project_id")
                    .table(Services::Table)
                    .col(Services::ProjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_services_repository_url")
                    .table(Services::Table)
                    .col(Services::RepositoryUrl)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Services::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(super) enum Projects {
    Table,
    Id,
    UserId,
    Name,
    Slug,
    Description,
    Status,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
pub(super) enum Services {
    Table,
    Id,
    ProjectId,
    Name,
    ServiceType,
    RepositoryUrl,
    RepositoryProvider,
    RepositoryBranch,
    DockerImage,
    DockerTag,
    Port,
    Replicas,
    CpuLimit,
    MemoryLimit,
    CpuRequest,
    MemoryRequest,
    HealthCheckPath,
    AutoDeploy,
    Status,
    CreatedAt,
    UpdatedAt,
}
