use super::columns::{timestamp, timestamp_null, uuid_pk};
use super::m20250101_000002_create_projects_and_services::{Projects, Services};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Deployments::Table)
                    .if_not_exists()
                    .col(uuid_pk(Deployments::Id))
                    .col(ColumnDef::new(Deployments::ServiceId).uuid().not_null())
                    .col(ColumnDef::new(Deployments::Name).string().not_null())
                    .col(
                        ColumnDef::new(Deployments::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Deployments::ImageUrl).string().null())
                    .col(ColumnDef::new(Deployments::ImageTag).string().null())
                    .col(ColumnDef::new(Deployments::BuildLogs).text().null())
                    .col(ColumnDef::new(Deployments::DeploymentLogs).text().null())
                    .col(ColumnDef::new(Deployments::GitCommitSha).string().null())
                    .col(ColumnDef::new(Deployments::GitCommitMessage).text().null())
                    .col(ColumnDef::new(Deployments::GitAuthor).string().null())
                    .col(timestamp_null(Deployments::DeployedAt))
                    .col(timestamp_null(Deployments::StoppedAt))
                    .col(timestamp(Deployments::CreatedAt))
                    .col(timestamp(Deployments::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deployments_service_id")
                            .from(Deployments::Table, Deployments::ServiceId)
                            .to(Services::Table, Services::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_deployments_service_id_created_at")
                    .table(Deployments::Table)
                    .col(Deployments::ServiceId)
                    .col(Deployments::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EnvironmentVariables::Table)
                    .if_not_exists()
                    .col(uuid_pk(EnvironmentVariables::Id))
                    .col(
                        ColumnDef::new(EnvironmentVariables::DeploymentId)
                            .uuid()
                            .null(),
                    )
                    .col(ColumnDef::new(EnvironmentVariables::ServiceId).uuid().null())
                    .col(ColumnDef::new(EnvironmentVariables::ProjectId).uuid().null())
                    .col(ColumnDef::new(EnvironmentVariables::Key).string().not_null())
                    .col(
                        ColumnDef::new(EnvironmentVariables::ValueEncrypted)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EnvironmentVariables::ValueIv)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EnvironmentVariables::IsSecret)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(timestamp(EnvironmentVariables::CreatedAt))
                    .col(timestamp(EnvironmentVariables::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_environment_variables_deployment_id")
                            .from(
                                EnvironmentVariables::Table,
                                EnvironmentVariables::DeploymentId,
                            )
                            .to(Deployments::Table, Deployments::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_environment_variables_service_id")
                            .from(EnvironmentVariables::Table, EnvironmentVariables::ServiceId)
                            .to(Services::Table, Services::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_environment_variables_project_id")
                            .from(EnvironmentVariables::Table, EnvironmentVariables::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            (
                "idx_environment_variables_deployment_id",
                EnvironmentVariables::DeploymentId,
            ),
            (
                "idx_environment_variables_service_id",
                EnvironmentVariables::ServiceId,
            ),
            (
                "idx_environment_variables_project_id",
                EnvironmentVariables::ProjectId,
            ),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(EnvironmentVariables::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(Domains::Table)
                    .if_not_exists()
                    .col(uuid_pk(Domains::Id))
                    .col(ColumnDef::new(Domains::DeploymentId).uuid().not_null())
                    .col(ColumnDef::new(Domains::Domain).string().not_null())
                    .col(ColumnDef::new(Domains::VerificationCode).string().null())
                    .col(
                        ColumnDef::new(Domains::IsVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Domains::SslCertificate).text().null())
                    .col(ColumnDef::new(Domains::SslKey).text().null())
                    .col(timestamp_null(Domains::SslExpiresAt))
                    .col(timestamp(Domains::CreatedAt))
                    .col(timestamp(Domains::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_domains_deployment_id")
                            .from(Domains::Table, Domains::DeploymentId)
                            .to(Deployments::Table, Deployments::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_domains_domain_unique")
                    .table(Domains::Table)
                    .col(Domains::Domain)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_domains_deployment_id")
                    .table(Domains::Table)
                    .col(Domains::DeploymentId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Domains::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(EnvironmentVariables::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Deployments::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Deployments {
    Table,
    Id,
    ServiceId,
    Name,
    Status,
    ImageUrl,
    ImageTag,
    BuildLogs,
    DeploymentLogs,
    GitCommitSha,
    GitCommitMessage,
    GitAuthor,
    DeployedAt,
    StoppedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EnvironmentVariables {
    Table,
    Id,
    DeploymentId,
    ServiceId,
    ProjectId,
    Key,
    ValueEncrypted,
    ValueIv,
    IsSecret,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Domains {
    Table,
    Id,
    DeploymentId,
    Domain,
    VerificationCode,
    IsVerified,
    SslCertificate,
    SslKey,
    SslExpiresAt,
    CreatedAt,
    UpdatedAt,
}
