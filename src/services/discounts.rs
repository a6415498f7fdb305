use super::{soft_delete::TrashService, validate_non_negative_decimal, ServiceContext};
use crate::{
    cache::CacheNamespace,
    entities::discount::{self, DiscountType, Entity as Discount},
    errors::ServiceError,
    events::Event,
    queries::{fetch_page, ListQuery, Paginated},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateDiscount {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 64, message = "Code is required"))]
    pub code: String,
    pub discount_type: DiscountType,
    #[validate(custom = "validate_non_negative_decimal")]
    pub amount: Decimal,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateDiscount {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub code: Option<String>,
    pub discount_type: Option<DiscountType>,
    #[validate(custom = "validate_non_negative_decimal")]
    pub amount: Option<Decimal>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// Percentages cap at 100 and a window must not end before it starts.
fn check_terms(
    discount_type: DiscountType,
    amount: Decimal,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
) -> Result<(), ServiceError> {
    if discount_type == DiscountType::Percentage && amount > Decimal::ONE_HUNDRED {
        return Err(ServiceError::ValidationError(format!(
            "percentage discount cannot exceed 100 (got {})",
            amount
        )));
    }
    if let (Some(start), Some(end)) = (starts_at, ends_at) {
        if end < start {
            return Err(ServiceError::ValidationError(
                "discount window ends before it starts".to_string(),
            ));
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct DiscountService {
    ctx: ServiceContext,
    trash: TrashService<Discount>,
}

impl DiscountService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            trash: TrashService::new(ctx.clone()),
            ctx,
        }
    }

    pub fn trash(&self) -> &TrashService<Discount> {
        &self.trash
    }

    async fn ensure_code_free(&self, code: &str, exclude: Option<Uuid>) -> Result<(), ServiceError> {
        let mut select = Discount::find().filter(discount::Column::Code.eq(code));
        if let Some(id) = exclude {
            select = select.filter(discount::Column::Id.ne(id));
        }
        if select.count(self.ctx.db.as_ref()).await? > 0 {
            return Err(ServiceError::ValidationError(format!(
                "discount code {} is already in use",
                code
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create(&self, input: CreateDiscount) -> Result<discount::Model, ServiceError> {
        input.validate()?;
        let code = input.code.trim().to_uppercase();
        check_terms(input.discount_type, input.amount, input.starts_at, input.ends_at)?;
        self.ensure_code_free(&code, None).await?;

        let discount = discount::ActiveModel {
            name: Set(input.name),
            code: Set(code),
            discount_type: Set(input.discount_type.to_string()),
            amount: Set(input.amount),
            starts_at: Set(input.starts_at),
            ends_at: Set(input.ends_at),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(self.ctx.db.as_ref())
        .await?;

        self.ctx.cache.invalidate(CacheNamespace::Discounts).await;
        self.ctx.events.publish(Event::Created {
            resource: "discount".into(),
            id: discount.id,
        });
        info!(discount_id = %discount.id, "Discount created");

        Ok(discount)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        discount_id: Uuid,
        input: UpdateDiscount,
    ) -> Result<discount::Model, ServiceError> {
        input.validate()?;
        let db = self.ctx.db.as_ref();

        let current = Discount::find_by_id(discount_id)
            .filter(discount::Column::DeletedAt.is_null())
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("discount", discount_id))?;

        let discount_type = match input.discount_type {
            Some(t) => t,
            None => current.kind().ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "discount {} has unknown type {}",
                    discount_id, current.discount_type
                ))
            })?,
        };
        let amount = input.amount.unwrap_or(current.amount);
        let starts_at = input.starts_at.or(current.starts_at);
        let ends_at = input.ends_at.or(current.ends_at);
        check_terms(discount_type, amount, starts_at, ends_at)?;

        let mut active: discount::ActiveModel = current.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(code) = input.code {
            let code = code.trim().to_uppercase();
            self.ensure_code_free(&code, Some(discount_id)).await?;
            active.code = Set(code);
        }
        active.discount_type = Set(discount_type.to_string());
        active.amount = Set(amount);
        active.starts_at = Set(starts_at);
        active.ends_at = Set(ends_at);
        let updated = active.update(db).await?;

        self.ctx.cache.invalidate(CacheNamespace::Discounts).await;
        self.ctx.events.publish(Event::Updated {
            resource: "discount".into(),
            id: discount_id,
        });

        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, discount_id: Uuid) -> Result<discount::Model, ServiceError> {
        let key = CacheNamespace::Discounts.id_key(discount_id);
        self.ctx
            .cache
            .remember(&key, self.ctx.cache.default_ttl(), || async {
                Discount::find_by_id(discount_id)
                    .filter(discount::Column::DeletedAt.is_null())
                    .one(self.ctx.db.as_ref())
                    .await?
                    .ok_or_else(|| ServiceError::not_found("discount", discount_id))
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<discount::Model>, ServiceError> {
        let query = self.ctx.normalize(query);
        let key = CacheNamespace::Discounts.list_key(&query.cache_params());

        self.ctx
            .cache
            .remember(&key, self.ctx.cache.list_ttl(), || async {
                let mut select = Discount::find().filter(discount::Column::DeletedAt.is_null());
                if let Some(pattern) = query.like_pattern() {
                    select = select.filter(
                        Condition::any()
                            .add(discount::Column::Name.like(pattern.as_str()))
                            .add(discount::Column::Code.like(pattern.as_str())),
                    );
                }
                let select = select
                    .order_by_desc(discount::Column::CreatedAt)
                    .order_by_asc(discount::Column::Id);
                fetch_page(self.ctx.db.as_ref(), select, &query).await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn percentages_above_one_hundred_are_rejected() {
        assert!(check_terms(DiscountType::Percentage, dec!(100), None, None).is_ok());
        assert!(check_terms(DiscountType::Percentage, dec!(100.5), None, None).is_err());
        assert!(check_terms(DiscountType::Fixed, dec!(250), None, None).is_ok());
    }

    #[test]
    fn window_must_be_ordered() {
        let now = Utc::now();
        assert!(check_terms(DiscountType::Fixed, dec!(5), Some(now), Some(now - Duration::days(1))).is_err());
        assert!(check_terms(DiscountType::Fixed, dec!(5), Some(now), Some(now + Duration::days(1))).is_ok());
    }
}
