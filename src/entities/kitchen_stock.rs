use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

/// One received batch of a kitchen item. `quantity` never drops below zero.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "kitchen_stock")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kitchen_item_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity: Decimal,
    /// Unit price at time of receipt
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_price: Decimal,
    /// Bumped on every quantity change; guards concurrent deductions.
    pub version: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub deleted_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::kitchen_item::Entity",
        from = "Column::KitchenItemId",
        to = "super::kitchen_item::Column::Id",
        on_delete = "Restrict"
    )]
    KitchenItem,
    #[sea_orm(has_many = "super::kitchen_order_item::Entity")]
    KitchenOrderItem,
}

impl Related<super::kitchen_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::KitchenItem.def()
    }
}

impl Related<super::kitchen_order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::KitchenOrderItem.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr> {
        let mut active_model = self;
        let now = chrono::Utc::now();
        if insert {
            if active_model.id.is_not_set() {
                active_model.id = Set(Uuid::new_v4());
            }
            active_model.created_at = Set(now);
            if active_model.version.is_not_set() {
                active_model.version = Set(0);
            }
        }
        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}
