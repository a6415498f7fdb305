#![allow(dead_code)]

use std::sync::Arc;

use kitchen_ops::{
    cache::Cache,
    config::AppConfig,
    db,
    entities::{kitchen_item, kitchen_stock},
    events::{self, Event},
    services::{
        kitchen_items::CreateKitchenItem,
        kitchen_orders::{CreateKitchenOrder, KitchenOrderLineInput, KitchenOrderWithItems},
        AppServices, ServiceContext,
    },
};
use kitchen_ops::entities::kitchen_item::ItemType;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Services wired against a private SQLite database.
pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub cache: Cache,
    pub services: AppServices,
    pub events: mpsc::Receiver<Event>,
}

impl TestApp {
    pub async fn new() -> Self {
        // One connection keeps every query on the same in-memory database.
        Self::with_database("sqlite::memory:", 1).await
    }

    /// A fresh database file shared by `connections` pooled connections, so
    /// concurrent calls really run on separate connections.
    pub async fn file_backed(connections: u32) -> Self {
        let path = std::env::temp_dir().join(format!("kitchen-ops-{}.db", Uuid::new_v4()));
        Self::with_database(&format!("sqlite://{}?mode=rwc", path.display()), connections).await
    }

    pub async fn with_database(url: &str, connections: u32) -> Self {
        let mut cfg = AppConfig::new(url.to_string(), "test".to_string());
        cfg.db_max_connections = connections;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let db = Arc::new(pool);
        let cache = Cache::in_memory();
        let (sender, events) = events::channel(events::DEFAULT_CHANNEL_CAPACITY);
        let ctx = ServiceContext::new(db.clone(), cache.clone(), sender);

        Self {
            db,
            cache,
            services: AppServices::new(ctx),
            events,
        }
    }

    /// Every event published so far.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub async fn seed_item(&self, name: &str) -> kitchen_item::Model {
        self.services
            .kitchen_items
            .create(CreateKitchenItem {
                name: name.to_string(),
                name_bn: None,
                image: None,
                description: None,
                item_type: ItemType::Kitchen,
            })
            .await
            .expect("seed item")
    }

    pub async fn seed_stock(&self, quantity: Decimal, price: Decimal) -> kitchen_stock::Model {
        let item = self.seed_item(&format!("Item {}", Uuid::new_v4())).await;
        self.services
            .kitchen_stock
            .adjust_stock(item.id, quantity, price)
            .await
            .expect("seed stock")
    }

    pub async fn seed_order(&self, lines: &[(Uuid, Decimal)]) -> KitchenOrderWithItems {
        self.services
            .kitchen_orders
            .create(CreateKitchenOrder {
                order_id: None,
                user_id: Uuid::new_v4(),
                description: Some("prep for dinner service".to_string()),
                items: lines
                    .iter()
                    .map(|(kitchen_stock_id, quantity)| KitchenOrderLineInput {
                        kitchen_stock_id: *kitchen_stock_id,
                        quantity: *quantity,
                    })
                    .collect(),
            })
            .await
            .expect("seed order")
    }

    /// Reads the batch straight from the database, bypassing the cache.
    pub async fn stock_row(&self, stock_id: Uuid) -> Option<kitchen_stock::Model> {
        use sea_orm::EntityTrait;
        kitchen_stock::Entity::find_by_id(stock_id)
            .one(self.db.as_ref())
            .await
            .expect("load stock")
    }
}
