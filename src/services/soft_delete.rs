//! Trash lifecycle shared by every soft-deletable entity.
//!
//! A record is *active* while `deleted_at IS NULL` and *trashed* once it is
//! set. Trashed records can be restored (timestamp cleared) or permanently
//! removed. Permanent removal of an active record is refused with
//! [`ServiceError::NotInTrash`].
//!
//! Single-id operations fail fast. Bulk operations handle each id on its own
//! and report a [`BulkResult`] partition instead of aborting on the first
//! failure. Every successful write invalidates the entity's cache namespace
//! after it has been applied.

use super::ServiceContext;
use crate::{
    cache::CacheNamespace,
    entities::{category, discount, kitchen_item, kitchen_order, kitchen_stock},
    errors::ServiceError,
    events::Event,
    queries::{fetch_page, ListQuery, Paginated},
};
use chrono::{DateTime, Utc};
use sea_orm::{sea_query::Expr, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// An entity with a UUID key and a nullable deletion timestamp.
pub trait SoftDeletable: EntityTrait {
    /// Label used in error messages and activity logs.
    const RESOURCE: &'static str;

    fn namespace() -> CacheNamespace;
    fn id_column() -> Self::Column;
    fn deleted_at_column() -> Self::Column;
    fn model_id(model: &Self::Model) -> Uuid;
    fn model_deleted_at(model: &Self::Model) -> Option<DateTime<Utc>>;

    /// Filter applied to the trash listing when a search term is given.
    fn search_condition(_like_pattern: &str) -> Option<Condition> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub id: Uuid,
    pub reason: String,
}

/// Outcome of a bulk trash operation, one entry per requested id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResult {
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<BulkFailure>,
}

impl BulkResult {
    fn record(&mut self, id: Uuid, outcome: Result<(), ServiceError>) {
        match outcome {
            Ok(()) => self.succeeded.push(id),
            Err(e) => {
                debug!(%id, error = %e, "bulk item failed");
                self.failed.push(BulkFailure {
                    id,
                    reason: e.reason().to_string(),
                })
            }
        }
    }

    /// Number of records the operation affected.
    pub fn count(&self) -> usize {
        self.succeeded.len()
    }
}

pub struct TrashService<E: SoftDeletable> {
    ctx: ServiceContext,
    _entity: PhantomData<E>,
}

impl<E: SoftDeletable> Clone for TrashService<E> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> TrashService<E>
where
    E: SoftDeletable,
    E::Model: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            ctx,
            _entity: PhantomData,
        }
    }

    /// Moves an active record to the trash.
    #[instrument(skip(self), fields(resource = E::RESOURCE))]
    pub async fn soft_delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.trash_one(id).await?;
        self.after_write(Event::Trashed {
            resource: E::RESOURCE.to_string(),
            ids: vec![id],
        })
        .await;
        info!(%id, "{} moved to trash", E::RESOURCE);
        Ok(())
    }

    #[instrument(skip(self, ids), fields(resource = E::RESOURCE, count = ids.len()))]
    pub async fn bulk_soft_delete(&self, ids: &[Uuid]) -> Result<BulkResult, ServiceError> {
        let mut result = BulkResult::default();
        for id in ids {
            result.record(*id, self.trash_one(*id).await);
        }
        if !result.succeeded.is_empty() {
            self.after_write(Event::Trashed {
                resource: E::RESOURCE.to_string(),
                ids: result.succeeded.clone(),
            })
            .await;
        }
        info!(
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            "bulk trash finished"
        );
        Ok(result)
    }

    /// Trashed records, most recently deleted first.
    #[instrument(skip(self), fields(resource = E::RESOURCE))]
    pub async fn list_trashed(&self, query: &ListQuery) -> Result<Paginated<E::Model>, ServiceError> {
        let query = self.ctx.normalize(query);
        let mut params = vec![("view", "trash".to_string())];
        params.extend(query.cache_params());
        let key = E::namespace().list_key(&params);

        self.ctx
            .cache
            .remember(&key, self.ctx.cache.list_ttl(), || async {
                let mut select = E::find().filter(E::deleted_at_column().is_not_null());
                if let Some(condition) = query.like_pattern().as_deref().and_then(E::search_condition) {
                    select = select.filter(condition);
                }
                let select = select
                    .order_by_desc(E::deleted_at_column())
                    .order_by_asc(E::id_column());
                fetch_page(self.ctx.db.as_ref(), select, &query).await
            })
            .await
    }

    /// Clears the deletion timestamp. Fails with `NotFound` unless the
    /// record exists and is in the trash.
    #[instrument(skip(self), fields(resource = E::RESOURCE))]
    pub async fn restore(&self, id: Uuid) -> Result<(), ServiceError> {
        self.restore_one(id).await?;
        self.after_write(Event::Restored {
            resource: E::RESOURCE.to_string(),
            ids: vec![id],
        })
        .await;
        info!(%id, "{} restored", E::RESOURCE);
        Ok(())
    }

    #[instrument(skip(self, ids), fields(resource = E::RESOURCE, count = ids.len()))]
    pub async fn bulk_restore(&self, ids: &[Uuid]) -> Result<BulkResult, ServiceError> {
        let mut result = BulkResult::default();
        for id in ids {
            result.record(*id, self.restore_one(*id).await);
        }
        if !result.succeeded.is_empty() {
            self.after_write(Event::Restored {
                resource: E::RESOURCE.to_string(),
                ids: result.succeeded.clone(),
            })
            .await;
        }
        Ok(result)
    }

    /// Erases a trashed record.
    #[instrument(skip(self), fields(resource = E::RESOURCE))]
    pub async fn permanent_delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.erase_one(id).await?;
        self.after_write(Event::PermanentlyDeleted {
            resource: E::RESOURCE.to_string(),
            ids: vec![id],
        })
        .await;
        info!(%id, "{} permanently deleted", E::RESOURCE);
        Ok(())
    }

    #[instrument(skip(self, ids), fields(resource = E::RESOURCE, count = ids.len()))]
    pub async fn bulk_permanent_delete(&self, ids: &[Uuid]) -> Result<BulkResult, ServiceError> {
        let mut result = BulkResult::default();
        for id in ids {
            result.record(*id, self.erase_one(*id).await);
        }
        if !result.succeeded.is_empty() {
            self.after_write(Event::PermanentlyDeleted {
                resource: E::RESOURCE.to_string(),
                ids: result.succeeded.clone(),
            })
            .await;
        }
        Ok(result)
    }

    async fn trash_one(&self, id: Uuid) -> Result<(), ServiceError> {
        let now: DateTime<Utc> = Utc::now();
        let res = E::update_many()
            .col_expr(E::deleted_at_column(), Expr::value(now))
            .filter(E::id_column().eq(id))
            .filter(E::deleted_at_column().is_null())
            .exec(self.ctx.db.as_ref())
            .await?;

        if res.rows_affected == 0 {
            return Err(ServiceError::not_found(E::RESOURCE, id));
        }
        Ok(())
    }

    async fn restore_one(&self, id: Uuid) -> Result<(), ServiceError> {
        let res = E::update_many()
            .col_expr(E::deleted_at_column(), Expr::value(Option::<DateTime<Utc>>::None))
            .filter(E::id_column().eq(id))
            .filter(E::deleted_at_column().is_not_null())
            .exec(self.ctx.db.as_ref())
            .await?;

        if res.rows_affected == 0 {
            return Err(ServiceError::not_found(E::RESOURCE, id));
        }
        Ok(())
    }

    async fn erase_one(&self, id: Uuid) -> Result<(), ServiceError> {
        let model = E::find()
            .filter(E::id_column().eq(id))
            .one(self.ctx.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found(E::RESOURCE, id))?;

        if E::model_deleted_at(&model).is_none() {
            return Err(ServiceError::not_in_trash(E::RESOURCE, E::model_id(&model)));
        }

        // Guarded again so a concurrent restore wins over the delete.
        let res = E::delete_many()
            .filter(E::id_column().eq(id))
            .filter(E::deleted_at_column().is_not_null())
            .exec(self.ctx.db.as_ref())
            .await?;

        if res.rows_affected == 0 {
            warn!(%id, "{} left the trash before it could be erased", E::RESOURCE);
            return Err(ServiceError::not_in_trash(E::RESOURCE, id));
        }
        Ok(())
    }

    async fn after_write(&self, event: Event) {
        self.ctx.cache.invalidate(E::namespace()).await;
        self.ctx.events.publish(event);
    }
}

impl SoftDeletable for category::Entity {
    const RESOURCE: &'static str = "category";

    fn namespace() -> CacheNamespace {
        CacheNamespace::Categories
    }
    fn id_column() -> Self::Column {
        category::Column::Id
    }
    fn deleted_at_column() -> Self::Column {
        category::Column::DeletedAt
    }
    fn model_id(model: &Self::Model) -> Uuid {
        model.id
    }
    fn model_deleted_at(model: &Self::Model) -> Option<DateTime<Utc>> {
        model.deleted_at
    }
    fn search_condition(like_pattern: &str) -> Option<Condition> {
        Some(
            Condition::any()
                .add(category::Column::Name.like(like_pattern))
                .add(category::Column::Slug.like(like_pattern)),
        )
    }
}

impl SoftDeletable for discount::Entity {
    const RESOURCE: &'static str = "discount";

    fn namespace() -> CacheNamespace {
        CacheNamespace::Discounts
    }
    fn id_column() -> Self::Column {
        discount::Column::Id
    }
    fn deleted_at_column() -> Self::Column {
        discount::Column::DeletedAt
    }
    fn model_id(model: &Self::Model) -> Uuid {
        model.id
    }
    fn model_deleted_at(model: &Self::Model) -> Option<DateTime<Utc>> {
        model.deleted_at
    }
    fn search_condition(like_pattern: &str) -> Option<Condition> {
        Some(
            Condition::any()
                .add(discount::Column::Name.like(like_pattern))
                .add(discount::Column::Code.like(like_pattern)),
        )
    }
}

impl SoftDeletable for kitchen_item::Entity {
    const RESOURCE: &'static str = "kitchen_item";

    fn namespace() -> CacheNamespace {
        CacheNamespace::KitchenItems
    }
    fn id_column() -> Self::Column {
        kitchen_item::Column::Id
    }
    fn deleted_at_column() -> Self::Column {
        kitchen_item::Column::DeletedAt
    }
    fn model_id(model: &Self::Model) -> Uuid {
        model.id
    }
    fn model_deleted_at(model: &Self::Model) -> Option<DateTime<Utc>> {
        model.deleted_at
    }
    fn search_condition(like_pattern: &str) -> Option<Condition> {
        Some(
            Condition::any()
                .add(kitchen_item::Column::Name.like(like_pattern))
                .add(kitchen_item::Column::NameBn.like(like_pattern))
                .add(kitchen_item::Column::Slug.like(like_pattern)),
        )
    }
}

impl SoftDeletable for kitchen_stock::Entity {
    const RESOURCE: &'static str = "kitchen_stock";

    fn namespace() -> CacheNamespace {
        CacheNamespace::KitchenStock
    }
    fn id_column() -> Self::Column {
        kitchen_stock::Column::Id
    }
    fn deleted_at_column() -> Self::Column {
        kitchen_stock::Column::DeletedAt
    }
    fn model_id(model: &Self::Model) -> Uuid {
        model.id
    }
    fn model_deleted_at(model: &Self::Model) -> Option<DateTime<Utc>> {
        model.deleted_at
    }
    fn search_condition(like_pattern: &str) -> Option<Condition> {
        Some(Condition::all().add(kitchen_stock::Column::Description.like(like_pattern)))
    }
}

impl SoftDeletable for kitchen_order::Entity {
    const RESOURCE: &'static str = "kitchen_order";

    fn namespace() -> CacheNamespace {
        CacheNamespace::KitchenOrders
    }
    fn id_column() -> Self::Column {
        kitchen_order::Column::Id
    }
    fn deleted_at_column() -> Self::Column {
        kitchen_order::Column::DeletedAt
    }
    fn model_id(model: &Self::Model) -> Uuid {
        model.id
    }
    fn model_deleted_at(model: &Self::Model) -> Option<DateTime<Utc>> {
        model.deleted_at
    }
    fn search_condition(like_pattern: &str) -> Option<Condition> {
        Some(Condition::all().add(kitchen_order::Column::Description.like(like_pattern)))
    }
}
