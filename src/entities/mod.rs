//! sea-orm entities for the kitchen back office.
//!
//! Every soft-deletable table carries a nullable `deleted_at`; see
//! [`crate::services::soft_delete`] for the shared trash lifecycle.

pub mod activity_log;
pub mod category;
pub mod discount;
pub mod kitchen_item;
pub mod kitchen_order;
pub mod kitchen_order_item;
pub mod kitchen_stock;

pub mod prelude {
    pub use super::activity_log::Entity as ActivityLog;
    pub use super::category::Entity as Category;
    pub use super::discount::Entity as Discount;
    pub use super::kitchen_item::Entity as KitchenItem;
    pub use super::kitchen_order::Entity as KitchenOrder;
    pub use super::kitchen_order_item::Entity as KitchenOrderItem;
    pub use super::kitchen_stock::Entity as KitchenStock;
}
