use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::services::activity_log::ActivityLogService;

/// Default capacity for the event channel built by [`channel`].
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Publishes after a commit without blocking the caller. A full or
    /// closed channel only loses the audit entry, never the business write.
    pub fn publish(&self, event: Event) {
        if let Err(e) = self.sender.try_send(event) {
            warn!("Dropping domain event: {}", e);
        }
    }
}

/// Builds a bounded channel and the sender half services hold.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Things that happened after a successful commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Created {
        resource: String,
        id: Uuid,
    },
    Updated {
        resource: String,
        id: Uuid,
    },
    Trashed {
        resource: String,
        ids: Vec<Uuid>,
    },
    Restored {
        resource: String,
        ids: Vec<Uuid>,
    },
    PermanentlyDeleted {
        resource: String,
        ids: Vec<Uuid>,
    },
    StockReceived {
        kitchen_stock_id: Uuid,
        kitchen_item_id: Uuid,
        quantity: Decimal,
        price: Decimal,
    },
    StockQuantityOverridden {
        kitchen_stock_id: Uuid,
        old_quantity: Decimal,
        new_quantity: Decimal,
    },
    KitchenOrderApproved {
        kitchen_order_id: Uuid,
        /// (stock batch, quantity deducted)
        deductions: Vec<(Uuid, Decimal)>,
        approved_at: DateTime<Utc>,
    },
}

impl Event {
    pub fn action(&self) -> &'static str {
        match self {
            Event::Created { .. } => "created",
            Event::Updated { .. } => "updated",
            Event::Trashed { .. } => "trashed",
            Event::Restored { .. } => "restored",
            Event::PermanentlyDeleted { .. } => "permanently_deleted",
            Event::StockReceived { .. } => "stock_received",
            Event::StockQuantityOverridden { .. } => "stock_quantity_overridden",
            Event::KitchenOrderApproved { .. } => "approved",
        }
    }

    pub fn subject_type(&self) -> &str {
        match self {
            Event::Created { resource, .. }
            | Event::Updated { resource, .. }
            | Event::Trashed { resource, .. }
            | Event::Restored { resource, .. }
            | Event::PermanentlyDeleted { resource, .. } => resource,
            Event::StockReceived { .. } | Event::StockQuantityOverridden { .. } => "kitchen_stock",
            Event::KitchenOrderApproved { .. } => "kitchen_order",
        }
    }

    pub fn subject_ids(&self) -> Vec<Uuid> {
        match self {
            Event::Created { id, .. } | Event::Updated { id, .. } => vec![*id],
            Event::Trashed { ids, .. }
            | Event::Restored { ids, .. }
            | Event::PermanentlyDeleted { ids, .. } => ids.clone(),
            Event::StockReceived {
                kitchen_stock_id, ..
            }
            | Event::StockQuantityOverridden {
                kitchen_stock_id, ..
            } => vec![*kitchen_stock_id],
            Event::KitchenOrderApproved {
                kitchen_order_id, ..
            } => vec![*kitchen_order_id],
        }
    }

    /// Human-readable line for the activity log.
    pub fn describe(&self) -> String {
        match self {
            Event::Created { resource, id } => format!("{} {} created", resource, id),
            Event::Updated { resource, id } => format!("{} {} updated", resource, id),
            Event::Trashed { resource, .. } => format!("{} moved to trash", resource),
            Event::Restored { resource, .. } => format!("{} restored from trash", resource),
            Event::PermanentlyDeleted { resource, .. } => {
                format!("{} permanently deleted", resource)
            }
            Event::StockReceived {
                quantity, price, ..
            } => format!("received {} at {} each", quantity, price),
            Event::StockQuantityOverridden {
                old_quantity,
                new_quantity,
                ..
            } => format!("quantity corrected from {} to {}", old_quantity, new_quantity),
            Event::KitchenOrderApproved { deductions, .. } => {
                let lines = deductions
                    .iter()
                    .map(|(stock_id, qty)| format!("{} from {}", qty, stock_id))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("approved; deducted {}", lines)
            }
        }
    }
}

/// Consumes events until every sender is dropped, writing each one to the
/// activity log.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, db: Arc<DatabaseConnection>) {
    info!("Starting event processing loop");
    let activity = ActivityLogService::new(db);

    while let Some(event) = rx.recv().await {
        debug!("Received event: {:?}", event);

        if let Err(e) = activity.record(&event).await {
            error!(
                "Failed to record activity: action={}, subject_type={}, error={}",
                event.action(),
                event.subject_type(),
                e
            );
        }
    }

    info!("Event channel closed; processing loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn publish_never_blocks_on_a_full_channel() {
        let (sender, mut rx) = channel(1);
        let id = Uuid::new_v4();

        sender.publish(Event::Created {
            resource: "category".into(),
            id,
        });
        sender.publish(Event::Updated {
            resource: "category".into(),
            id,
        });

        assert_eq!(rx.recv().await.map(|e| e.action()), Some("created"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn approval_events_describe_each_deduction() {
        let stock = Uuid::new_v4();
        let event = Event::KitchenOrderApproved {
            kitchen_order_id: Uuid::new_v4(),
            deductions: vec![(stock, dec!(4))],
            approved_at: Utc::now(),
        };

        assert_eq!(event.subject_type(), "kitchen_order");
        assert!(event.describe().contains(&format!("4 from {}", stock)));
    }
}
