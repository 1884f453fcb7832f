use super::columns::{timestamp, timestamp_null, uuid_pk};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Subscriptions::Table)
                    .if_not_exists()
                    .col(uuid_pk(Subscriptions::Id))
                    .col(ColumnDef::new(Subscriptions::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(Subscriptions::StripeCustomerId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::StripeSubscriptionId)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::Plan)
                            .string()
                            .not_null()
                            .default("free"),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(timestamp_null(Subscriptions::CurrentPeriodStart))
                    .col(timestamp_null(Subscriptions::CurrentPeriodEnd))
                    .col(timestamp_null(Subscriptions::CanceledAt))
                    .col(timestamp(Subscriptions::CreatedAt))
                    .col(timestamp(Subscriptions::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_subscriptions_user_id_unique")
                    .table(Subscriptions::Table)
                    .col(Subscriptions::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UsageRecords::Table)
                    .if_not_exists()
                    .col(uuid_pk(UsageRecords::Id))
                    .col(ColumnDef::new(UsageRecords::UserId).uuid().not_null())
                    .col(ColumnDef::new(UsageRecords::ResourceType).string().not_null())
                    .col(ColumnDef::new(UsageRecords::Amount).double().not_null())
                    .col(ColumnDef::new(UsageRecords::Unit).string().not_null())
                    .col(timestamp(UsageRecords::RecordedAt))
                    .col(ColumnDef::new(UsageRecords::BillingPeriod).string().not_null())
                    .col(timestamp(UsageRecords::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_usage_records_user_id_billing_period")
                    .table(UsageRecords::Table)
                    .col(UsageRecords::UserId)
                    .col(UsageRecords::BillingPeriod)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Invoices::Table)
                    .if_not_exists()
                    .col(uuid_pk(Invoices::Id))
                    .col(ColumnDef::new(Invoices::UserId).uuid().not_null())
                    .col(ColumnDef::new(Invoices::StripeInvoiceId).string().null())
                    .col(ColumnDef::new(Invoices::Amount).big_integer().not_null())
                    .col(
                        ColumnDef::new(Invoices::Currency)
                            .string()
                            .not_null()
                            .default("usd"),
                    )
                    .col(
                        ColumnDef::new(Invoices::Status)
                            .string()
                            .not_null()
                            .default("draft"),
                    )
                    .col(timestamp_null(Invoices::DueDate))
                    .col(timestamp_null(Invoices::PaidAt))
                    .col(timestamp(Invoices::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_invoices_user_id")
                    .table(Invoices::Table)
                    .col(Invoices::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_invoices_stripe_invoice_id")
                    .table(Invoices::Table)
                    .col(Invoices::StripeInvoiceId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Invoices::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UsageRecords::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Subscriptions::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Subscriptions {
    Table,
    Id,
    UserId,
    StripeCustomerId,
    StripeSubscriptionId,
    Plan,
    Status,
    CurrentPeriodStart,
    CurrentPeriodEnd,
    CanceledAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum UsageRecords {
    Table,
    Id,
    UserId,
    ResourceType,
    Amount,
    Unit,
    RecordedAt,
    BillingPeriod,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Invoices {
    Table,
    Id,
    UserId,
    StripeInvoiceId,
    Amount,
    Currency,
    Status,
    DueDate,
    PaidAt,
    CreatedAt,
}
