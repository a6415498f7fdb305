use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use uuid::Uuid;

use kitchen_ops::{
    config,
    db,
    events,
    services::{activity_log::ActivityLogService, housekeeping::HousekeepingWorker},
    AppState,
};

#[derive(Parser, Debug)]
#[command(name = "kitchen-ops", version, about = "Kitchen stock and order operations")]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Run one activity-log retention sweep
    PurgeActivity {
        /// Override the configured retention window
        #[arg(long)]
        retention_days: Option<i64>,
    },
    /// Approve a pending kitchen order and deduct its stock
    Approve {
        order_id: Uuid,
    },
    /// Consume events and run housekeeping until interrupted
    Worker,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    match cli.command {
        Commands::Migrate => {
            let pool = db::establish_connection_from_app_config(&cfg).await?;
            db::run_migrations(&pool).await?;
            db::close_pool(pool).await?;
            println!("migrations applied");
        }
        Commands::PurgeActivity { retention_days } => {
            let (state, _events) = AppState::build(cfg).await?;
            let retention = retention_days
                .map(chrono::Duration::days)
                .unwrap_or_else(|| state.config.activity_log_retention());
            let removed = state.services.activity_log.purge_older_than(retention).await?;
            if cli.json {
                println!("{}", serde_json::json!({ "removed": removed }));
            } else {
                println!("removed {} activity log entries", removed);
            }
        }
        Commands::Approve { order_id } => {
            let (state, event_rx) = AppState::build(cfg).await?;
            let consumer = tokio::spawn(events::process_events(event_rx, state.db.clone()));

            let approved = state.services.kitchen_orders.approve(order_id).await;
            // Dropping the last sender lets the consumer drain and exit.
            drop(state);
            if let Err(e) = tokio::time::timeout(Duration::from_secs(5), consumer).await {
                warn!("event consumer did not finish: {}", e);
            }

            let approved = approved?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&approved)?);
            } else {
                println!(
                    "order {} approved ({} lines, total {})",
                    approved.order.id,
                    approved.items.len(),
                    approved.order.total_amount
                );
            }
        }
        Commands::Worker => {
            let (state, event_rx) = AppState::build(cfg).await?;
            let consumer = tokio::spawn(events::process_events(event_rx, state.db.clone()));

            let housekeeping = HousekeepingWorker::new(
                ActivityLogService::new(state.db.clone()),
                state.config.activity_log_retention(),
                state.config.housekeeping_interval(),
            )
            .start();

            info!("worker running; press Ctrl-C to stop");
            signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
            info!("shutting down");

            housekeeping.abort();
            consumer.abort();
        }
    }

    Ok(())
}
