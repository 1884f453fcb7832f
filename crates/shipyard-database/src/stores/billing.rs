use chrono::Datelike;
use sea_orm::sea_query::Expr;
use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use shipyard_core::DBDateTime;
use shipyard_entities::types::{InvoiceStatus, SubscriptionPlan, SubscriptionStatus};
use shipyard_entities::{invoices, subscriptions, usage_records, users};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{run_in_transaction, DbConnection, DbError, DbResult, ListQuery, Repository};

type Subscriptions = Repository<subscriptions::Entity>;

/// `YYYY-MM` bucket a usage record belongs to
pub fn billing_period_for(ts: DBDateTime) -> String {
    format!("{:04}-{:02}", ts.year(), ts.month())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubscription {
    pub stripe_customer_id: String,
    pub stripe_subscription_id: Option<String>,
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUsage {
    pub user_id: Uuid,
    pub resource_type: String,
    pub amount: f64,
    pub unit: String,
    /// Defaults to now; also decides the billing period
    pub recorded_at: Option<DBDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoice {
    pub user_id: Uuid,
    pub stripe_invoice_id: Option<String>,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub status: InvoiceStatus,
    pub due_date: Option<DBDateTime>,
}

impl NewInvoice {
    /// Draft invoice in USD
    pub fn new(user_id: Uuid, amount: i64) -> Self {
        Self {
            user_id,
            stripe_invoice_id: None,
            amount,
            currency: "usd".to_string(),
            status: InvoiceStatus::Draft,
            due_date: None,
        }
    }
}

/// Summed usage of one resource within a billing period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageTotal {
    pub resource_type: String,
    pub unit: String,
    pub total: f64,
}

pub struct BillingStore {
    db: Arc<DbConnection>,
    subscriptions: Subscriptions,
    usage: Repository<usage_records::Entity>,
    invoices: Repository<invoices::Entity>,
    users: Repository<users::Entity>,
}

impl BillingStore {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            subscriptions: Repository::new(db.clone()),
            usage: Repository::new(db.clone()),
            invoices: Repository::new(db.clone()),
            users: Repository::new(db.clone()),
            db,
        }
    }

    // Subscriptions

    /// Create or replace the user's single subscription
    pub async fn upsert_subscription(
        &self,
        user_id: Uuid,
        subscription: NewSubscription,
    ) -> DbResult<subscriptions::Model> {
        self.users.get(user_id).await?;

        let saved = run_in_transaction(&self.db, None, move |txn| {
            Box::pin(async move {
                let existing = Subscriptions::find_one_in(
                    txn,
                    Condition::all().add(subscriptions::Column::UserId.eq(user_id)),
                )
                .await?;

                let mut model = subscriptions::ActiveModel {
                    stripe_customer_id: Set(subscription.stripe_customer_id),
                    stripe_subscription_id: Set(subscription.stripe_subscription_id),
                    plan: Set(subscription.plan),
                    status: Set(subscription.status),
                    ..Default::default()
                };
                match existing {
                    Some(existing) => {
                        model.id = Set(existing.id);
                        if subscription.status != SubscriptionStatus::Canceled {
                            model.canceled_at = Set(None);
                        }
                        Subscriptions::update_in(txn, model).await
                    }
                    None => {
                        model.user_id = Set(user_id);
                        Subscriptions::insert_in(txn, model).await
                    }
                }
            })
        })
        .await?;

        info!(%user_id, plan = %saved.plan, status = %saved.status, "Saved subscription");
        Ok(saved)
    }

    pub async fn subscription_for_user(&self, user_id: Uuid) -> DbResult<Option<subscriptions::Model>> {
        self.subscriptions
            .find_one(Condition::all().add(subscriptions::Column::UserId.eq(user_id)))
            .await
    }

    pub async fn cancel_subscription(&self, user_id: Uuid) -> DbResult<subscriptions::Model> {
        let current = self
            .subscription_for_user(user_id)
            .await?
            .ok_or_else(|| DbError::not_found::<subscriptions::Entity>(user_id))?;
        if current.status == SubscriptionStatus::Canceled {
            return Err(DbError::invalid_state(format!(
                "subscription of user {} is already canceled",
                user_id
            )));
        }

        let canceled = self
            .subscriptions
            .update(subscriptions::ActiveModel {
                id: Set(current.id),
                status: Set(SubscriptionStatus::Canceled),
                canceled_at: Set(Some(shipyard_core::db_now())),
                ..Default::default()
            })
            .await?;
        info!(%user_id, "Canceled subscription");
        Ok(canceled)
    }

    pub async fn update_period(
        &self,
        user_id: Uuid,
        start: DBDateTime,
        end: DBDateTime,
    ) -> DbResult<subscriptions::Model> {
        if end <= start {
            return Err(DbError::validation("billing period must end after it starts"));
        }
        let current = self
            .subscription_for_user(user_id)
            .await?
            .ok_or_else(|| DbError::not_found::<subscriptions::Entity>(user_id))?;

        self.subscriptions
            .update(subscriptions::ActiveModel {
                id: Set(current.id),
                current_period_start: Set(Some(start)),
                current_period_end: Set(Some(end)),
                ..Default::default()
            })
            .await
    }

    // Usage

    pub async fn record_usage(&self, usage: NewUsage) -> DbResult<usage_records::Model> {
        if !usage.amount.is_finite() || usage.amount < 0.0 {
            return Err(DbError::validation(format!(
                "usage amount must be a non-negative number, got {}",
                usage.amount
            )));
        }
        if usage.resource_type.trim().is_empty() || usage.unit.trim().is_empty() {
            return Err(DbError::validation("usage resource type and unit are required"));
        }

        let recorded_at = usage.recorded_at.unwrap_or_else(shipyard_core::db_now);
        self.usage
            .insert(usage_records::ActiveModel {
                user_id: Set(usage.user_id),
                resource_type: Set(usage.resource_type),
                amount: Set(usage.amount),
                unit: Set(usage.unit),
                recorded_at: Set(recorded_at),
                billing_period: Set(billing_period_for(recorded_at)),
                ..Default::default()
            })
            .await
    }

    pub async fn usage_for_period(
        &self,
        user_id: Uuid,
        billing_period: &str,
    ) -> DbResult<Vec<usage_records::Model>> {
        self.usage
            .find(
                &ListQuery::new()
                    .filter(period_filter(user_id, billing_period))
                    .order_by("recorded_at", false),
            )
            .await
    }

    /// `SUM(amount)` per resource type and unit, ordered by resource type
    pub async fn usage_totals(&self, user_id: Uuid, billing_period: &str) -> DbResult<Vec<UsageTotal>> {
        let rows: Vec<(String, String, f64)> = usage_records::Entity::find()
            .select_only()
            .column(usage_records::Column::ResourceType)
            .column(usage_records::Column::Unit)
            .column_as(Expr::col(usage_records::Column::Amount).sum(), "total")
            .filter(period_filter(user_id, billing_period))
            .group_by(usage_records::Column::ResourceType)
            .group_by(usage_records::Column::Unit)
            .order_by_asc(usage_records::Column::ResourceType)
            .order_by_asc(usage_records::Column::Unit)
            .into_tuple()
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(resource_type, unit, total)| UsageTotal {
                resource_type,
                unit,
                total,
            })
            .collect())
    }

    // Invoices

    pub async fn create_invoice(&self, invoice: NewInvoice) -> DbResult<invoices::Model> {
        if invoice.amount < 0 {
            return Err(DbError::validation("invoice amount cannot be negative"));
        }
        let currency = invoice.currency.trim().to_lowercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(DbError::validation(format!("invalid currency '{}'", invoice.currency)));
        }

        let created = self
            .invoices
            .insert(invoices::ActiveModel {
                user_id: Set(invoice.user_id),
                stripe_invoice_id: Set(invoice.stripe_invoice_id),
                amount: Set(invoice.amount),
                currency: Set(currency),
                status: Set(invoice.status),
                due_date: Set(invoice.due_date),
                ..Default::default()
            })
            .await?;
        info!(invoice_id = %created.id, user_id = %created.user_id, amount = created.amount, "Created invoice");
        Ok(created)
    }

    pub async fn mark_invoice_paid(&self, id: Uuid) -> DbResult<invoices::Model> {
        let current = self.invoices.get(id).await?;
        if matches!(current.status, InvoiceStatus::Paid | InvoiceStatus::Void) {
            return Err(DbError::invalid_state(format!(
                "invoice {} is {} and cannot be paid",
                id, current.status
            )));
        }
        self.invoices
            .update(invoices::ActiveModel {
                id: Set(id),
                status: Set(InvoiceStatus::Paid),
                paid_at: Set(Some(shipyard_core::db_now())),
                ..Default::default()
            })
            .await
    }

    /// Newest first
    pub async fn invoices_for_user(&self, user_id: Uuid) -> DbResult<Vec<invoices::Model>> {
        self.invoices
            .find(
                &ListQuery::new()
                    .filter(Condition::all().add(invoices::Column::UserId.eq(user_id)))
                    .order_by("created_at", true),
            )
            .await
    }

    pub async fn find_invoice_by_stripe_id(&self, stripe_invoice_id: &str) -> DbResult<Option<invoices::Model>> {
        self.invoices
            .find_one(Condition::all().add(invoices::Column::StripeInvoiceId.eq(stripe_invoice_id)))
            .await
    }
}

fn period_filter(user_id: Uuid, billing_period: &str) -> Condition {
    Condition::all()
        .add(usage_records::Column::UserId.eq(user_id))
        .add(usage_records::Column::BillingPeriod.eq(billing_period))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::fixtures;
    use crate::test_utils::TestDatabase;
    use chrono::{TimeZone, Utc};

    fn subscription(status: SubscriptionStatus) -> NewSubscription {
        NewSubscription {
            stripe_customer_id: "cus_123".to_string(),
            stripe_subscription_id: Some("sub_456".to_string()),
            plan: SubscriptionPlan::Pro,
            status,
        }
    }

    fn usage(user_id: Uuid, resource: &str, amount: f64, at: DBDateTime) -> NewUsage {
        NewUsage {
            user_id,
            resource_type: resource.to_string(),
            amount,
            unit: "minutes".to_string(),
            recorded_at: Some(at),
        }
    }

    #[test]
    fn test_billing_period_for() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 31, 23, 59, 59).unwrap();
        assert_eq!(billing_period_for(ts), "2025-03");
        let ts = Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap();
        assert_eq!(billing_period_for(ts), "2025-12");
    }

    #[tokio::test]
    async fn test_subscription_upsert_and_cancel() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let user = fixtures::user(&test_db, "billing@example.com").await?;
        let store = BillingStore::new(test_db.db.clone());

        assert!(store.subscription_for_user(user.id).await?.is_none());
        let trial = store
            .upsert_subscription(user.id, subscription(SubscriptionStatus::Trialing))
            .await?;
        let active = store
            .upsert_subscription(user.id, subscription(SubscriptionStatus::Active))
            .await?;
        assert_eq!(trial.id, active.id);
        assert_eq!(active.status, SubscriptionStatus::Active);

        let canceled = store.cancel_subscription(user.id).await?;
        assert_eq!(canceled.status, SubscriptionStatus::Canceled);
        assert!(canceled.canceled_at.is_some());
        let err = store.cancel_subscription(user.id).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidState(_)));

        let reactivated = store
            .upsert_subscription(user.id, subscription(SubscriptionStatus::Active))
            .await?;
        assert!(reactivated.canceled_at.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_period() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let user = fixtures::user(&test_db, "period@example.com").await?;
        let store = BillingStore::new(test_db.db.clone());
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();

        let err = store.update_period(user.id, start, end).await.unwrap_err();
        assert!(err.is_not_found());

        store
            .upsert_subscription(user.id, subscription(SubscriptionStatus::Active))
            .await?;
        let err = store.update_period(user.id, end, start).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        let updated = store.update_period(user.id, start, end).await?;
        assert_eq!(updated.current_period_start, Some(start));
        assert_eq!(updated.current_period_end, Some(end));
        Ok(())
    }

    #[tokio::test]
    async fn test_usage_totals_per_period() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let store = BillingStore::new(test_db.db.clone());
        let user_id = Uuid::new_v4();
        let march = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let april = Utc.with_ymd_and_hms(2025, 4, 2, 12, 0, 0).unwrap();

        store.record_usage(usage(user_id, "build_minutes", 1.5, march)).await?;
        store.record_usage(usage(user_id, "build_minutes", 2.5, march)).await?;
        store.record_usage(usage(user_id, "bandwidth", 10.0, march)).await?;
        store.record_usage(usage(user_id, "build_minutes", 7.0, april)).await?;
        store
            .record_usage(usage(Uuid::new_v4(), "build_minutes", 100.0, march))
            .await?;

        let err = store
            .record_usage(usage(user_id, "build_minutes", -1.0, march))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        assert_eq!(store.usage_for_period(user_id, "2025-03").await?.len(), 3);
        let totals = store.usage_totals(user_id, "2025-03").await?;
        assert_eq!(
            totals,
            vec![
                UsageTotal {
                    resource_type: "bandwidth".to_string(),
                    unit: "minutes".to_string(),
                    total: 10.0,
                },
                UsageTotal {
                    resource_type: "build_minutes".to_string(),
                    unit: "minutes".to_string(),
                    total: 4.0,
                },
            ]
        );
        assert!(store.usage_totals(user_id, "2024-01").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_invoice_lifecycle() -> anyhow::Result<()> {
        let test_db = TestDatabase::sqlite().await?;
        let store = BillingStore::new(test_db.db.clone());
        let user_id = Uuid::new_v4();

        let invoice = store
            .create_invoice(NewInvoice {
                stripe_invoice_id: Some("in_789".to_string()),
                currency: "EUR".to_string(),
                status: InvoiceStatus::Open,
                ..NewInvoice::new(user_id, 1999)
            })
            .await?;
        assert_eq!(invoice.currency, "eur");

        let paid = store.mark_invoice_paid(invoice.id).await?;
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert!(paid.paid_at.is_some());
        assert!(matches!(
            store.mark_invoice_paid(invoice.id).await.unwrap_err(),
            DbError::InvalidState(_)
        ));

        let found = store.find_invoice_by_stripe_id("in_789").await?;
        assert_eq!(found.map(|i| i.id), Some(invoice.id));
        assert_eq!(store.invoices_for_user(user_id).await?.len(), 1);

        let err = store
            .create_invoice(NewInvoice::new(user_id, -5))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
        Ok(())
    }
}
