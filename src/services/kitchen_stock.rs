use super::{
    ensure_non_negative, soft_delete::TrashService, validate_non_negative_decimal,
    ServiceContext,
};
use crate::{
    cache::CacheNamespace,
    entities::{
        kitchen_item,
        kitchen_stock::{self, Entity as KitchenStock},
    },
    errors::{ServiceError, StockShortfall},
    events::Event,
    queries::{fetch_page, ListQuery, Paginated},
};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Receipt of a new batch for a kitchen item.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateKitchenStock {
    pub kitchen_item_id: Uuid,
    #[validate(custom = "validate_non_negative_decimal")]
    pub quantity: Decimal,
    /// Unit price
    #[validate(custom = "validate_non_negative_decimal")]
    pub price: Decimal,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

/// Times a deduction re-reads a batch that another writer changed first.
const DEDUCT_ATTEMPTS: usize = 5;

/// Decrements one batch by `amount` so the row can never go negative
/// whatever else is running. The arithmetic happens on `Decimal`; the write
/// only lands if the batch still carries the version that was checked, and
/// a lost race re-reads and checks again.
///
/// Performs no cache invalidation and emits no event. Callers run it inside
/// their own transaction and invalidate after commit.
///
/// # Errors
/// * `NotFound` if the batch does not exist or is in the trash
/// * `InsufficientStock` if `amount` exceeds the quantity on hand
/// * `ConcurrentModification` if the batch kept changing on every attempt
pub async fn deduct<C>(conn: &C, stock_id: Uuid, amount: Decimal) -> Result<kitchen_stock::Model, ServiceError>
where
    C: ConnectionTrait,
{
    if amount <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "deduction must be positive (got {})",
            amount
        )));
    }

    for attempt in 1..=DEDUCT_ATTEMPTS {
        let current = find_active(conn, stock_id).await?;

        if current.quantity < amount {
            counter!("kitchen_ops.stock.deduction_rejected", 1);
            warn!(%stock_id, %amount, available = %current.quantity, "Deduction exceeds stock on hand");
            return Err(ServiceError::InsufficientStock(vec![StockShortfall::new(
                stock_id,
                amount,
                current.quantity,
            )]));
        }

        let quantity = current.quantity - amount;
        let total_price = quantity * current.price;
        let version = current.version + 1;
        let updated_at = chrono::Utc::now();

        let res = KitchenStock::update_many()
            .col_expr(kitchen_stock::Column::Quantity, Expr::value(quantity))
            .col_expr(kitchen_stock::Column::TotalPrice, Expr::value(total_price))
            .col_expr(kitchen_stock::Column::Version, Expr::value(version))
            .col_expr(kitchen_stock::Column::UpdatedAt, Expr::value(updated_at))
            .filter(kitchen_stock::Column::Id.eq(stock_id))
            .filter(kitchen_stock::Column::DeletedAt.is_null())
            .filter(kitchen_stock::Column::Version.eq(current.version))
            .exec(conn)
            .await?;

        if res.rows_affected == 1 {
            counter!("kitchen_ops.stock.deducted", 1);
            return Ok(kitchen_stock::Model {
                quantity,
                total_price,
                version,
                updated_at,
                ..current
            });
        }

        debug!(%stock_id, attempt, "Stock batch changed during deduction, retrying");
    }

    counter!("kitchen_ops.stock.deduction_conflicts", 1);
    Err(ServiceError::ConcurrentModification(stock_id))
}

/// Loads a batch that is not in the trash.
pub async fn find_active<C>(conn: &C, stock_id: Uuid) -> Result<kitchen_stock::Model, ServiceError>
where
    C: ConnectionTrait,
{
    KitchenStock::find_by_id(stock_id)
        .filter(kitchen_stock::Column::DeletedAt.is_null())
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("kitchen_stock", stock_id))
}

#[derive(Clone)]
pub struct KitchenStockService {
    ctx: ServiceContext,
    trash: TrashService<KitchenStock>,
}

impl KitchenStockService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            trash: TrashService::new(ctx.clone()),
            ctx,
        }
    }

    /// Trash lifecycle for stock batches.
    pub fn trash(&self) -> &TrashService<KitchenStock> {
        &self.trash
    }

    /// Records a newly received batch. `total_price = quantity * price`.
    #[instrument(skip(self))]
    pub async fn create(&self, input: CreateKitchenStock) -> Result<kitchen_stock::Model, ServiceError> {
        input.validate()?;
        let db = self.ctx.db.as_ref();

        kitchen_item::Entity::find_by_id(input.kitchen_item_id)
            .filter(kitchen_item::Column::DeletedAt.is_null())
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("kitchen_item", input.kitchen_item_id))?;

        let stock = kitchen_stock::ActiveModel {
            kitchen_item_id: Set(input.kitchen_item_id),
            quantity: Set(input.quantity),
            price: Set(input.price),
            total_price: Set(input.quantity * input.price),
            description: Set(input.description),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;

        self.ctx.cache.invalidate(CacheNamespace::KitchenStock).await;
        self.ctx.events.publish(Event::StockReceived {
            kitchen_stock_id: stock.id,
            kitchen_item_id: stock.kitchen_item_id,
            quantity: stock.quantity,
            price: stock.price,
        });
        counter!("kitchen_ops.stock.received", 1);
        info!(stock_id = %stock.id, item_id = %stock.kitchen_item_id, "Stock batch received");

        Ok(stock)
    }

    /// Shorthand for [`KitchenStockService::create`] without a note.
    pub async fn adjust_stock(
        &self,
        kitchen_item_id: Uuid,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> Result<kitchen_stock::Model, ServiceError> {
        self.create(CreateKitchenStock {
            kitchen_item_id,
            quantity,
            price: unit_price,
            description: None,
        })
        .await
    }

    /// Deducts outside of an order. Same contract as [`deduct`]; the caller
    /// owns cache invalidation.
    #[instrument(skip(self))]
    pub async fn deduct(&self, stock_id: Uuid, amount: Decimal) -> Result<kitchen_stock::Model, ServiceError> {
        deduct(self.ctx.db.as_ref(), stock_id, amount).await
    }

    /// Manual correction that overwrites the quantity on hand.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        stock_id: Uuid,
        quantity: Decimal,
    ) -> Result<kitchen_stock::Model, ServiceError> {
        ensure_non_negative("quantity", quantity)?;
        let db = self.ctx.db.as_ref();

        let current = find_active(db, stock_id).await?;
        let old_quantity = current.quantity;
        let price = current.price;
        let version = current.version;

        let mut active: kitchen_stock::ActiveModel = current.into();
        active.quantity = Set(quantity);
        active.total_price = Set(quantity * price);
        active.version = Set(version + 1);
        let updated = active.update(db).await?;

        self.ctx.cache.invalidate(CacheNamespace::KitchenStock).await;
        self.ctx.events.publish(Event::StockQuantityOverridden {
            kitchen_stock_id: stock_id,
            old_quantity,
            new_quantity: quantity,
        });
        info!(%stock_id, %old_quantity, new_quantity = %quantity, "Stock quantity overridden");

        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, stock_id: Uuid) -> Result<kitchen_stock::Model, ServiceError> {
        let key = CacheNamespace::KitchenStock.id_key(stock_id);
        self.ctx
            .cache
            .remember(&key, self.ctx.cache.default_ttl(), || {
                find_active(self.ctx.db.as_ref(), stock_id)
            })
            .await
    }

    /// Active batches, newest first, optionally for one item.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        query: &ListQuery,
        kitchen_item_id: Option<Uuid>,
    ) -> Result<Paginated<kitchen_stock::Model>, ServiceError> {
        let query = self.ctx.normalize(query);
        let mut params = query.cache_params();
        params.push((
            "item",
            kitchen_item_id.map(|id| id.to_string()).unwrap_or_default(),
        ));
        let key = CacheNamespace::KitchenStock.list_key(&params);

        self.ctx
            .cache
            .remember(&key, self.ctx.cache.list_ttl(), || async {
                let mut select =
                    KitchenStock::find().filter(kitchen_stock::Column::DeletedAt.is_null());
                if let Some(item_id) = kitchen_item_id {
                    select = select.filter(kitchen_stock::Column::KitchenItemId.eq(item_id));
                }
                if let Some(pattern) = query.like_pattern() {
                    select = select.filter(kitchen_stock::Column::Description.like(pattern));
                }
                let select = select
                    .order_by_desc(kitchen_stock::Column::CreatedAt)
                    .order_by_asc(kitchen_stock::Column::Id);
                fetch_page(self.ctx.db.as_ref(), select, &query).await
            })
            .await
    }
}
