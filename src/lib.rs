//! Kitchen operations core
//!
//! Stock ledger, kitchen-order approval, the trash lifecycle shared by every
//! catalogue entity, and the cache-aside layer in front of them.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod queries;
pub mod services;

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::sync::mpsc;

pub use errors::ServiceError;

/// Everything a caller needs to drive the core.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: services::AppServices,
}

impl AppState {
    /// Connects, verifies the pool answers, migrates when configured, and
    /// wires the services. The
    /// returned receiver must be drained, usually by
    /// [`events::process_events`].
    pub async fn build(
        config: config::AppConfig,
    ) -> Result<(Self, mpsc::Receiver<events::Event>), ServiceError> {
        let pool = db::establish_connection_from_app_config(&config).await?;
        db::check_connection(&pool).await?;
        if config.auto_migrate {
            db::run_migrations(&pool).await?;
        }

        let db = Arc::new(pool);
        let (event_sender, event_rx) = events::channel(events::DEFAULT_CHANNEL_CAPACITY);
        let ctx = services::ServiceContext::from_config(db.clone(), &config, event_sender.clone());

        Ok((
            Self {
                db,
                config,
                event_sender,
                services: services::AppServices::new(ctx),
            },
            event_rx,
        ))
    }
}
