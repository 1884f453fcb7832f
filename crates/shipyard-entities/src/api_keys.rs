use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};
use shipyard_core::DBDateTime;

use crate::Record;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "api_keys")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// SHA-256 of the secret; the only verifiable form that is stored
    #[serde(skip_serializing)]
    pub key_hash: String,
    /// Non-secret display fragment, e.g. `sk_AbCd…wxyz`
    pub key_preview: String,
    pub expires_at: Option<DBDateTime>,
    pub last_used_at: Option<DBDateTime>,
    pub created_at: DBDateTime,
}

impl Model {
    pub fn is_expired_at(&self, at: DBDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= at)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Record for Entity {
    const NAME: &'static str = "api key";
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
            if self.created_at.is_not_set() {
                self.created_at = Set(shipyard_core::db_now());
            }
        }

        Ok(self)
    }
}
