use super::{slugs::unique_slug, soft_delete::TrashService, ServiceContext};
use crate::{
    cache::CacheNamespace,
    entities::category::{self, Entity as Category},
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
pub struct CreateCategory {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateCategory {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct CategoryService {
    ctx: ServiceContext,
    trash: TrashService<Category>,
}

impl CategoryService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            trash: TrashService::new(ctx.clone()),
            ctx,
        }
    }

    pub fn trash(&self) -> &TrashService<Category> {
        &self.trash
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: CreateCategory) -> Result<category::Model, ServiceError> {
        input.validate()?;
        let db = self.ctx.db.as_ref();

        let slug =
            unique_slug::<Category, _>(db, &input.name, category::Column::Slug, category::Column::Id, None)
                .await?;

        let category = category::ActiveModel {
            name: Set(input.name),
            slug: Set(slug),
            description: Set(input.description),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;

        self.ctx.cache.invalidate(CacheNamespace::Categories).await;
        self.ctx.events.publish(Event::Created {
            resource: "category".into(),
            id: category.id,
        });
        info!(category_id = %category.id, "Category created");

        Ok(category)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        category_id: Uuid,
        input: UpdateCategory,
    ) -> Result<category::Model, ServiceError> {
        input.validate()?;
        let db = self.ctx.db.as_ref();

        let current = Category::find_by_id(category_id)
            .filter(category::Column::DeletedAt.is_null())
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("category", category_id))?;

        let mut active: category::ActiveModel = current.clone().into();
        if let Some(name) = input.name {
            if name != current.name {
                let slug = unique_slug::<Category, _>(
                    db,
                    &name,
                    category::Column::Slug,
                    category::Column::Id,
                    Some(category_id),
                )
                .await?;
                active.slug = Set(slug);
            }
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        let updated = active.update(db).await?;

        self.ctx.cache.invalidate(CacheNamespace::Categories).await;
        self.ctx.events.publish(Event::Updated {
            resource: "category".into(),
            id: category_id,
        });

        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, category_id: Uuid) -> Result<category::Model, ServiceError> {
        let key = CacheNamespace::Categories.id_key(category_id);
        self.ctx
            .cache
            .remember(&key, self.ctx.cache.default_ttl(), || async {
                Category::find_by_id(category_id)
                    .filter(category::Column::DeletedAt.is_null())
                    .one(self.ctx.db.as_ref())
                    .await?
                    .ok_or_else(|| ServiceError::not_found("category", category_id))
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<category::Model>, ServiceError> {
        let query = self.ctx.normalize(query);
        let key = CacheNamespace::Categories.list_key(&query.cache_params());

        self.ctx
            .cache
            .remember(&key, self.ctx.cache.list_ttl(), || async {
                let mut select = Category::find().filter(category::Column::DeletedAt.is_null());
                if let Some(pattern) = query.like_pattern() {
                    select = select.filter(
                        Condition::any()
                            .add(category::Column::Name.like(pattern.as_str()))
                            .add(category::Column::Slug.like(pattern.as_str())),
                    );
                }
                let select = select
                    .order_by_asc(category::Column::Name)
                    .order_by_asc(category::Column::Id);
                fetch_page(self.ctx.db.as_ref(), select, &query).await
            })
            .await
    }
}
