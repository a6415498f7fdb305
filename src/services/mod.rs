// Trash lifecycle shared by every soft-deletable entity
pub mod soft_delete;

// Stock ledger and the approval engine that consumes it
pub mod kitchen_orders;
pub mod kitchen_stock;

// Catalogue services
pub mod categories;
pub mod discounts;
pub mod kitchen_items;
pub mod slugs;

// Audit trail and periodic maintenance
pub mod activity_log;
pub mod housekeeping;

use crate::{cache::Cache, config::AppConfig, events::EventSender, queries::ListQuery};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use validator::ValidationError;

/// Collaborators every service needs: the pool, the cache facade, the event
/// channel and the paging limits.
#[derive(Clone)]
pub struct ServiceContext {
    pub db: Arc<DatabaseConnection>,
    pub cache: Cache,
    pub events: EventSender,
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl ServiceContext {
    pub fn new(db: Arc<DatabaseConnection>, cache: Cache, events: EventSender) -> Self {
        Self {
            db,
            cache,
            events,
            default_page_size: crate::queries::DEFAULT_PAGE_SIZE,
            max_page_size: crate::queries::MAX_PAGE_SIZE,
        }
    }

    pub fn from_config(db: Arc<DatabaseConnection>, config: &AppConfig, events: EventSender) -> Self {
        Self {
            db,
            cache: Cache::from_config(&config.cache),
            events,
            default_page_size: config.api_default_page_size,
            max_page_size: config.api_max_page_size,
        }
    }

    pub fn normalize(&self, query: &ListQuery) -> ListQuery {
        query.normalize(self.default_page_size, self.max_page_size)
    }
}

/// Every service wired against one shared context.
#[derive(Clone)]
pub struct AppServices {
    pub categories: Arc<categories::CategoryService>,
    pub discounts: Arc<discounts::DiscountService>,
    pub kitchen_items: Arc<kitchen_items::KitchenItemService>,
    pub kitchen_stock: Arc<kitchen_stock::KitchenStockService>,
    pub kitchen_orders: Arc<kitchen_orders::KitchenOrderService>,
    pub activity_log: Arc<activity_log::ActivityLogService>,
}

impl AppServices {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            categories: Arc::new(categories::CategoryService::new(ctx.clone())),
            discounts: Arc::new(discounts::DiscountService::new(ctx.clone())),
            kitchen_items: Arc::new(kitchen_items::KitchenItemService::new(ctx.clone())),
            kitchen_stock: Arc::new(kitchen_stock::KitchenStockService::new(ctx.clone())),
            kitchen_orders: Arc::new(kitchen_orders::KitchenOrderService::new(ctx.clone())),
            activity_log: Arc::new(activity_log::ActivityLogService::new(ctx.db)),
        }
    }
}

pub(crate) fn validate_positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("range");
        err.message = Some("Value must be greater than 0".into());
        Err(err)
    }
}

pub(crate) fn validate_non_negative_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value >= Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("range");
        err.message = Some("Value must not be negative".into());
        Err(err)
    }
}

/// Rejects negative amounts outside of a derive.
pub(crate) fn ensure_non_negative(field: &str, value: Decimal) -> Result<(), crate::errors::ServiceError> {
    if value < Decimal::ZERO {
        return Err(crate::errors::ServiceError::ValidationError(format!(
            "{} must not be negative (got {})",
            field, value
        )));
    }
    Ok(())
}
