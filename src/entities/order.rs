use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

/// Customer order.
///
/// `total` is integer minor currency units, computed server-side at creation
/// and equal to the sum of frozen line prices times quantities forever after.
/// Gateway references are attached only when settlement commits.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub email: String,
    pub phone: String,
    #[sea_orm(column_type = "Text")]
    pub shipping_address: String,
    pub total: i64,
    pub currency: String,
    pub status: OrderStatus,
    pub gateway_intent_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub gateway_signature: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();
        if insert {
            if self.created_at.is_not_set() {
                self.created_at = sea_orm::Set(now);
            }
        } else {
            self.updated_at = sea_orm::Set(Some(now));
        }
        Ok(self)
    }
}

/// Order lifecycle status.
///
/// Variant order matters: the derived `Ord` gives the forward direction of
/// the state machine, so "PAID or later" is `status >= OrderStatus::Paid`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    #[sea_orm(string_value = "PLACED")]
    Placed,
    #[sea_orm(string_value = "PAID")]
    Paid,
    #[sea_orm(string_value = "SHIPPED")]
    Shipped,
    #[sea_orm(string_value = "DELIVERED")]
    Delivered,
}

#[cfg(test)]
mod tests {
    use super::OrderStatus;

    #[test]
    fn status_ordering_follows_lifecycle() {
        assert!(OrderStatus::Placed < OrderStatus::Paid);
        assert!(OrderStatus::Paid < OrderStatus::Shipped);
        assert!(OrderStatus::Shipped < OrderStatus::Delivered);
    }

    #[test]
    fn status_string_round_trip() {
        assert_eq!(OrderStatus::Placed.to_string(), "PLACED");
        assert_eq!(
            "DELIVERED".parse::<OrderStatus>().unwrap(),
            OrderStatus::Delivered
        );
    }
}
