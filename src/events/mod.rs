use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event; a closed channel is logged, never surfaced to the caller.
    pub async fn send_or_log(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            warn!(event = name, error = %e, "Dropping domain event");
        }
    }
}

/// Things that happened in the restaurant, published after the owning
/// transaction commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        total: Decimal,
    },
    OrderItemsAdded {
        order_id: Uuid,
        added_lines: usize,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    InventoryDeducted {
        order_id: Uuid,
        ingredients: usize,
    },
    StockAdjusted {
        ingredient_id: Uuid,
        adjustment: Decimal,
        new_stock: Decimal,
    },
    LowStock {
        ingredient_id: Uuid,
        name: String,
        current_stock: Decimal,
        minimum_stock: Decimal,
    },
    SmartBatchStarted {
        batch_id: Uuid,
        ingredient_id: Uuid,
    },
    SmartBatchFinished {
        batch_id: Uuid,
        total_items: i64,
        ended_at: DateTime<Utc>,
    },
    PaymentRecorded {
        payment_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::OrderCreated { .. } => "order_created",
            Event::OrderItemsAdded { .. } => "order_items_added",
            Event::OrderStatusChanged { .. } => "order_status_changed",
            Event::InventoryDeducted { .. } => "inventory_deducted",
            Event::StockAdjusted { .. } => "stock_adjusted",
            Event::LowStock { .. } => "low_stock",
            Event::SmartBatchStarted { .. } => "smart_batch_started",
            Event::SmartBatchFinished { .. } => "smart_batch_finished",
            Event::PaymentRecorded { .. } => "payment_recorded",
        }
    }
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        counter!("tesorito_events_total", 1, "event" => event.name());

        match &event {
            Event::LowStock {
                ingredient_id,
                name,
                current_stock,
                minimum_stock,
            } => {
                warn!(
                    %ingredient_id,
                    ingredient = %name,
                    %current_stock,
                    %minimum_stock,
                    "Ingredient at or below minimum stock"
                );
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(%order_id, %old_status, %new_status, "Order status changed");
            }
            other => {
                info!(event = other.name(), payload = ?other, "Domain event");
            }
        }
    }

    info!("Event processing loop stopped");
}
