use super::{slugs::unique_slug, soft_delete::TrashService, ServiceContext};
use crate::{
    cache::CacheNamespace,
    entities::kitchen_item::{self, Entity as KitchenItem, ItemType},
    errors::ServiceError,
    events::Event,
    queries::{fetch_page, ListQuery, Paginated},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateKitchenItem {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(length(max = 255))]
    pub name_bn: Option<String>,
    /// Reference to an already-uploaded image
    #[validate(length(max = 2048))]
    pub image: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub item_type: ItemType,
}

/// Fields left as `None` keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateKitchenItem {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 255))]
    pub name_bn: Option<String>,
    #[validate(length(max = 2048))]
    pub image: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub item_type: Option<ItemType>,
}

#[derive(Clone)]
pub struct KitchenItemService {
    ctx: ServiceContext,
    trash: TrashService<KitchenItem>,
}

impl KitchenItemService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            trash: TrashService::new(ctx.clone()),
            ctx,
        }
    }

    pub fn trash(&self) -> &TrashService<KitchenItem> {
        &self.trash
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: CreateKitchenItem) -> Result<kitchen_item::Model, ServiceError> {
        input.validate()?;
        let db = self.ctx.db.as_ref();

        let slug = unique_slug::<KitchenItem, _>(
            db,
            &input.name,
            kitchen_item::Column::Slug,
            kitchen_item::Column::Id,
            None,
        )
        .await?;

        let item = kitchen_item::ActiveModel {
            name: Set(input.name),
            name_bn: Set(input.name_bn),
            slug: Set(slug),
            image: Set(input.image),
            description: Set(input.description),
            item_type: Set(input.item_type.to_string()),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;

        self.ctx.cache.invalidate(CacheNamespace::KitchenItems).await;
        self.ctx.events.publish(Event::Created {
            resource: "kitchen_item".into(),
            id: item.id,
        });
        info!(item_id = %item.id, slug = %item.slug, "Kitchen item created");

        Ok(item)
    }

    /// Applies the given changes. A new name regenerates the slug.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        item_id: Uuid,
        input: UpdateKitchenItem,
    ) -> Result<kitchen_item::Model, ServiceError> {
        input.validate()?;
        let db = self.ctx.db.as_ref();

        let current = KitchenItem::find_by_id(item_id)
            .filter(kitchen_item::Column::DeletedAt.is_null())
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("kitchen_item", item_id))?;

        let mut active: kitchen_item::ActiveModel = current.clone().into();
        if let Some(name) = input.name {
            if name != current.name {
                let slug = unique_slug::<KitchenItem, _>(
                    db,
                    &name,
                    kitchen_item::Column::Slug,
                    kitchen_item::Column::Id,
                    Some(item_id),
                )
                .await?;
                active.slug = Set(slug);
            }
            active.name = Set(name);
        }
        if let Some(name_bn) = input.name_bn {
            active.name_bn = Set(Some(name_bn));
        }
        if let Some(image) = input.image {
            active.image = Set(Some(image));
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(item_type) = input.item_type {
            active.item_type = Set(item_type.to_string());
        }

        let updated = active.update(db).await?;

        self.ctx.cache.invalidate(CacheNamespace::KitchenItems).await;
        self.ctx.events.publish(Event::Updated {
            resource: "kitchen_item".into(),
            id: item_id,
        });
        info!(%item_id, "Kitchen item updated");

        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, item_id: Uuid) -> Result<kitchen_item::Model, ServiceError> {
        let key = CacheNamespace::KitchenItems.id_key(item_id);
        self.ctx
            .cache
            .remember(&key, self.ctx.cache.default_ttl(), || async {
                KitchenItem::find_by_id(item_id)
                    .filter(kitchen_item::Column::DeletedAt.is_null())
                    .one(self.ctx.db.as_ref())
                    .await?
                    .ok_or_else(|| ServiceError::not_found("kitchen_item", item_id))
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn find_by_slug(&self, slug: &str) -> Result<kitchen_item::Model, ServiceError> {
        let key = CacheNamespace::KitchenItems.slug_key(slug);
        self.ctx
            .cache
            .remember(&key, self.ctx.cache.default_ttl(), || async {
                KitchenItem::find()
                    .filter(kitchen_item::Column::Slug.eq(slug))
                    .filter(kitchen_item::Column::DeletedAt.is_null())
                    .one(self.ctx.db.as_ref())
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("kitchen_item with slug {} not found", slug)))
            })
            .await
    }

    /// Active items ordered by name.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        query: &ListQuery,
        item_type: Option<ItemType>,
    ) -> Result<Paginated<kitchen_item::Model>, ServiceError> {
        let query = self.ctx.normalize(query);
        let mut params = query.cache_params();
        params.push((
            "type",
            item_type.map(|t| t.to_string()).unwrap_or_default(),
        ));
        let key = CacheNamespace::KitchenItems.list_key(&params);

        self.ctx
            .cache
            .remember(&key, self.ctx.cache.list_ttl(), || async {
                let mut select =
                    KitchenItem::find().filter(kitchen_item::Column::DeletedAt.is_null());
                if let Some(item_type) = item_type {
                    select = select.filter(kitchen_item::Column::ItemType.eq(item_type.to_string()));
                }
                if let Some(pattern) = query.like_pattern() {
                    select = select.filter(
                        Condition::any()
                            .add(kitchen_item::Column::Name.like(pattern.as_str()))
                            .add(kitchen_item::Column::NameBn.like(pattern.as_str()))
                            .add(kitchen_item::Column::Slug.like(pattern.as_str())),
                    );
                }
                let select = select
                    .order_by_asc(kitchen_item::Column::Name)
                    .order_by_asc(kitchen_item::Column::Id);
                fetch_page(self.ctx.db.as_ref(), select, &query).await
            })
            .await
    }
}
