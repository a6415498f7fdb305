//! Kitchen orders and the approval engine.
//!
//! An order moves `PENDING -> APPROVED` exactly once. Approval validates
//! every line against the batches it references, then deducts all of them
//! and flips the flag inside one transaction. Each deduction is guarded by
//! the batch's version, so an approval racing another one for the same
//! batch fails with `InsufficientStock` instead of driving it negative, and
//! the whole transaction rolls back. Nothing about an approved order can be
//! edited afterwards; trashing it does not give the stock back.

use super::{
    kitchen_stock::{self as ledger},
    soft_delete::TrashService,
    validate_positive_decimal, ServiceContext,
};
use crate::{
    cache::CacheNamespace,
    db::with_transaction,
    entities::{
        kitchen_order::{self, Entity as KitchenOrder},
        kitchen_order_item::{self, Entity as KitchenOrderItem},
        kitchen_stock,
    },
    errors::{ServiceError, StockShortfall},
    events::Event,
    queries::{fetch_page, ListQuery, Paginated},
};
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct KitchenOrderLineInput {
    pub kitchen_stock_id: Uuid,
    #[validate(custom = "validate_positive_decimal")]
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateKitchenOrder {
    pub order_id: Option<Uuid>,
    pub user_id: Uuid,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(min = 1, message = "At least one line is required"))]
    pub items: Vec<KitchenOrderLineInput>,
}

/// Replaces the description and every line of a pending order.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateKitchenOrder {
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(min = 1, message = "At least one line is required"))]
    pub items: Vec<KitchenOrderLineInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitchenOrderWithItems {
    pub order: kitchen_order::Model,
    pub items: Vec<kitchen_order_item::Model>,
}

fn validate_lines(lines: &[KitchenOrderLineInput]) -> Result<(), ServiceError> {
    let mut seen = HashSet::new();
    for line in lines {
        line.validate()?;
        if !seen.insert(line.kitchen_stock_id) {
            return Err(ServiceError::ValidationError(format!(
                "stock {} appears more than once in the order",
                line.kitchen_stock_id
            )));
        }
    }
    Ok(())
}

/// Inserts the lines of `order_id`, pricing each at the batch's current
/// price. Returns the order total.
async fn write_lines(
    txn: &DatabaseTransaction,
    order_id: Uuid,
    lines: &[KitchenOrderLineInput],
) -> Result<Decimal, ServiceError> {
    let mut total = Decimal::ZERO;
    for line in lines {
        let stock = ledger::find_active(txn, line.kitchen_stock_id).await?;
        let line_total = line.quantity * stock.price;
        total += line_total;

        kitchen_order_item::ActiveModel {
            kitchen_order_id: Set(order_id),
            kitchen_stock_id: Set(stock.id),
            quantity: Set(line.quantity),
            unit_price: Set(stock.price),
            total_price: Set(line_total),
            ..Default::default()
        }
        .insert(txn)
        .await?;
    }
    Ok(total)
}

async fn load_items<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<Vec<kitchen_order_item::Model>, ServiceError> {
    Ok(KitchenOrderItem::find()
        .filter(kitchen_order_item::Column::KitchenOrderId.eq(order_id))
        .order_by_asc(kitchen_order_item::Column::CreatedAt)
        .order_by_asc(kitchen_order_item::Column::Id)
        .all(conn)
        .await?)
}

async fn find_active_order<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<kitchen_order::Model, ServiceError> {
    KitchenOrder::find_by_id(order_id)
        .filter(kitchen_order::Column::DeletedAt.is_null())
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("kitchen_order", order_id))
}

/// Sums requested quantity per batch, ordered by batch id.
fn requested_per_stock(items: &[kitchen_order_item::Model]) -> BTreeMap<Uuid, Decimal> {
    let mut requested = BTreeMap::new();
    for item in items {
        *requested.entry(item.kitchen_stock_id).or_insert(Decimal::ZERO) += item.quantity;
    }
    requested
}

#[derive(Clone)]
pub struct KitchenOrderService {
    ctx: ServiceContext,
    trash: TrashService<KitchenOrder>,
}

impl KitchenOrderService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            trash: TrashService::new(ctx.clone()),
            ctx,
        }
    }

    /// Trash lifecycle for orders. Allowed in either approval state and
    /// never reverses a deduction.
    pub fn trash(&self) -> &TrashService<KitchenOrder> {
        &self.trash
    }

    #[instrument(skip(self, input), fields(user_id = %input.user_id, lines = input.items.len()))]
    pub async fn create(&self, input: CreateKitchenOrder) -> Result<KitchenOrderWithItems, ServiceError> {
        input.validate()?;
        validate_lines(&input.items)?;

        let order_id = Uuid::new_v4();
        let CreateKitchenOrder {
            order_id: external_order_id,
            user_id,
            description,
            items,
        } = input;

        with_transaction(self.ctx.db.as_ref(), move |txn| {
            Box::pin(async move {
                kitchen_order::ActiveModel {
                    id: Set(order_id),
                    order_id: Set(external_order_id),
                    user_id: Set(user_id),
                    is_approved: Set(false),
                    description: Set(description),
                    total_amount: Set(Decimal::ZERO),
                    deleted_at: Set(None),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                let total = write_lines(txn, order_id, &items).await?;

                KitchenOrder::update_many()
                    .col_expr(kitchen_order::Column::TotalAmount, Expr::value(total))
                    .filter(kitchen_order::Column::Id.eq(order_id))
                    .exec(txn)
                    .await?;

                Ok::<_, ServiceError>(())
            })
        })
        .await?;

        self.ctx.cache.invalidate(CacheNamespace::KitchenOrders).await;
        self.ctx.events.publish(Event::Created {
            resource: "kitchen_order".into(),
            id: order_id,
        });
        counter!("kitchen_ops.orders.created", 1);
        info!(%order_id, "Kitchen order created");

        self.load_with_items(order_id).await
    }

    /// Rewrites a pending order. Approved orders are immutable.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        order_id: Uuid,
        input: UpdateKitchenOrder,
    ) -> Result<KitchenOrderWithItems, ServiceError> {
        input.validate()?;
        validate_lines(&input.items)?;

        let UpdateKitchenOrder { description, items } = input;

        with_transaction(self.ctx.db.as_ref(), move |txn| {
            Box::pin(async move {
                let order = find_active_order(txn, order_id).await?;
                if order.is_approved {
                    return Err(ServiceError::AlreadyApproved(order_id));
                }

                KitchenOrderItem::delete_many()
                    .filter(kitchen_order_item::Column::KitchenOrderId.eq(order_id))
                    .exec(txn)
                    .await?;
                let total = write_lines(txn, order_id, &items).await?;

                // Guarded on the flag so an approval committed meanwhile wins.
                let res = KitchenOrder::update_many()
                    .col_expr(kitchen_order::Column::Description, Expr::value(description))
                    .col_expr(kitchen_order::Column::TotalAmount, Expr::value(total))
                    .col_expr(kitchen_order::Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter(kitchen_order::Column::Id.eq(order_id))
                    .filter(kitchen_order::Column::IsApproved.eq(false))
                    .exec(txn)
                    .await?;
                if res.rows_affected == 0 {
                    return Err(ServiceError::AlreadyApproved(order_id));
                }

                Ok(())
            })
        })
        .await?;

        self.ctx.cache.invalidate(CacheNamespace::KitchenOrders).await;
        self.ctx.events.publish(Event::Updated {
            resource: "kitchen_order".into(),
            id: order_id,
        });
        info!(%order_id, "Kitchen order updated");

        self.load_with_items(order_id).await
    }

    /// Approves a pending order and consumes its stock.
    ///
    /// # Errors
    /// * `NotFound` if the order is missing or trashed, or a referenced
    ///   batch is
    /// * `AlreadyApproved` on a second approval
    /// * `InsufficientStock` naming every short batch; nothing is deducted
    #[instrument(skip(self))]
    pub async fn approve(&self, order_id: Uuid) -> Result<KitchenOrderWithItems, ServiceError> {
        let db = self.ctx.db.as_ref();

        let order = find_active_order(db, order_id).await?;
        if order.is_approved {
            counter!("kitchen_ops.orders.approval_rejected", 1, "reason" => "already_approved");
            return Err(ServiceError::AlreadyApproved(order_id));
        }

        let items = load_items(db, order_id).await?;
        let requested = requested_per_stock(&items);

        // Validation pass: nothing is written unless every batch covers
        // its lines.
        let stocks: HashMap<Uuid, kitchen_stock::Model> = kitchen_stock::Entity::find()
            .filter(kitchen_stock::Column::Id.is_in(requested.keys().copied().collect::<Vec<_>>()))
            .filter(kitchen_stock::Column::DeletedAt.is_null())
            .all(db)
            .await?
            .into_iter()
            .map(|stock| (stock.id, stock))
            .collect();

        let mut shortfalls = Vec::new();
        for (stock_id, amount) in &requested {
            let stock = stocks
                .get(stock_id)
                .ok_or_else(|| ServiceError::not_found("kitchen_stock", *stock_id))?;
            if *amount > stock.quantity {
                shortfalls.push(StockShortfall::new(*stock_id, *amount, stock.quantity));
            }
        }
        if !shortfalls.is_empty() {
            counter!("kitchen_ops.orders.approval_rejected", 1, "reason" => "insufficient_stock");
            warn!(%order_id, short = shortfalls.len(), "Approval rejected: insufficient stock");
            return Err(ServiceError::InsufficientStock(shortfalls));
        }

        // Deduction pass. Quantities are re-checked by each guarded
        // deduction, not taken from the reads above. The flag flips first so
        // the transaction holds its write lock before reading any batch.
        let deductions: Vec<(Uuid, Decimal)> = requested.into_iter().collect();
        let applied = deductions.clone();

        let result = with_transaction(db, move |txn| {
            Box::pin(async move {
                let res = KitchenOrder::update_many()
                    .col_expr(kitchen_order::Column::IsApproved, Expr::value(true))
                    .col_expr(kitchen_order::Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter(kitchen_order::Column::Id.eq(order_id))
                    .filter(kitchen_order::Column::IsApproved.eq(false))
                    .filter(kitchen_order::Column::DeletedAt.is_null())
                    .exec(txn)
                    .await?;

                if res.rows_affected == 0 {
                    // Lost a race: either approved or trashed meanwhile.
                    return match find_active_order(txn, order_id).await {
                        Ok(_) => Err(ServiceError::AlreadyApproved(order_id)),
                        Err(e) => Err(e),
                    };
                }

                for (stock_id, amount) in &deductions {
                    ledger::deduct(txn, *stock_id, *amount).await?;
                }

                // Read back here, not after commit, where a trash could
                // already have hidden the order.
                let order = find_active_order(txn, order_id).await?;
                let items = load_items(txn, order_id).await?;
                Ok(KitchenOrderWithItems { order, items })
            })
        })
        .await;

        let approved = match result {
            Ok(approved) => approved,
            Err(e) => {
                counter!("kitchen_ops.orders.approval_rejected", 1, "reason" => e.code());
                warn!(%order_id, error = %e, "Approval rolled back");
                return Err(e);
            }
        };

        self.ctx
            .cache
            .invalidate_many(&[CacheNamespace::KitchenOrders, CacheNamespace::KitchenStock])
            .await;
        self.ctx.events.publish(Event::KitchenOrderApproved {
            kitchen_order_id: order_id,
            deductions: applied,
            approved_at: Utc::now(),
        });
        counter!("kitchen_ops.orders.approved", 1);
        info!(%order_id, "Kitchen order approved");

        Ok(approved)
    }

    /// Order with its lines, served from cache when possible.
    #[instrument(skip(self))]
    pub async fn find_with_items(&self, order_id: Uuid) -> Result<KitchenOrderWithItems, ServiceError> {
        let key = CacheNamespace::KitchenOrders.id_key(order_id);
        self.ctx
            .cache
            .remember(&key, self.ctx.cache.default_ttl(), || self.load_with_items(order_id))
            .await
    }

    /// Active orders, newest first, optionally filtered by approval state.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        query: &ListQuery,
        is_approved: Option<bool>,
    ) -> Result<Paginated<kitchen_order::Model>, ServiceError> {
        let query = self.ctx.normalize(query);
        let mut params = query.cache_params();
        params.push((
            "approved",
            is_approved.map(|a| a.to_string()).unwrap_or_default(),
        ));
        let key = CacheNamespace::KitchenOrders.list_key(&params);

        self.ctx
            .cache
            .remember(&key, self.ctx.cache.list_ttl(), || async {
                let mut select =
                    KitchenOrder::find().filter(kitchen_order::Column::DeletedAt.is_null());
                if let Some(approved) = is_approved {
                    select = select.filter(kitchen_order::Column::IsApproved.eq(approved));
                }
                if let Some(pattern) = query.like_pattern() {
                    select = select.filter(kitchen_order::Column::Description.like(pattern));
                }
                let select = select
                    .order_by_desc(kitchen_order::Column::CreatedAt)
                    .order_by_asc(kitchen_order::Column::Id);
                fetch_page(self.ctx.db.as_ref(), select, &query).await
            })
            .await
    }

    async fn load_with_items(&self, order_id: Uuid) -> Result<KitchenOrderWithItems, ServiceError> {
        let db = self.ctx.db.as_ref();
        let order = find_active_order(db, order_id).await?;
        let items = load_items(db, order_id).await?;
        Ok(KitchenOrderWithItems { order, items })
    }
}
