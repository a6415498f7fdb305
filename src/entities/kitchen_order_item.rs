use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "kitchen_order_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kitchen_order_id: Uuid,
    pub kitchen_stock_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity: Decimal,
    /// Stock price captured when the line was written
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_price: Decimal,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::kitchen_order::Entity",
        from = "Column::KitchenOrderId",
        to = "super::kitchen_order::Column::Id",
        on_delete = "Cascade"
    )]
    KitchenOrder,
    #[sea_orm(
        belongs_to = "super::kitchen_stock::Entity",
        from = "Column::KitchenStockId",
        to = "super::kitchen_stock::Column::Id",
        on_delete = "Restrict"
    )]
    KitchenStock,
}

impl Related<super::kitchen_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::KitchenOrder.def()
    }
}

impl Related<super::kitchen_stock::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::KitchenStock.def()
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
        }
        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}
