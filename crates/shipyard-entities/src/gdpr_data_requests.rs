use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};
use shipyard_core::DBDateTime;

use crate::types::{GdprRequestStatus, GdprRequestType};
use crate::Record;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "gdpr_data_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub request_type: GdprRequestType,
    pub status: GdprRequestStatus,
    /// Export archive location, set on completion of an export
    pub download_url: Option<String>,
    pub expires_at: Option<DBDateTime>,
    pub completed_at: Option<DBDateTime>,
    pub created_at: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl Record for Entity {
    const NAME: &'static str = "data request";
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if insert {
            if self.id.is_not_set() {
                self.id = Set(Uuid::new_v4());
            }
            if self.status.is_not_set() {
                self.status = Set(GdprRequestStatus::Pending);
            }
            if self.created_at.is_not_set() {
                self.created_at = Set(shipyard_core::db_now());
            }
        }

        Ok(self)
    }
}
