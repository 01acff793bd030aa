use crate::{
    db::DbPool,
    entities::order::{self, Entity as Order, OrderStatus},
    errors::ServiceError,
    services::orders::{load_details, OrderDetails, OrderLineView},
};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KitchenTicket {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<OrderLineView>,
    pub elapsed_minutes: i64,
    pub is_overdue: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct KitchenBoard {
    pub pending: Vec<KitchenTicket>,
    pub preparing: Vec<KitchenTicket>,
    pub ready: Vec<KitchenTicket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BatchOrderRef {
    pub order_id: Uuid,
    pub order_number: String,
    pub quantity: i64,
}

/// One menu item to cook in bulk across the open tickets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BatchGroup {
    pub menu_item_id: Uuid,
    pub menu_item_name: String,
    pub total_quantity: i64,
    pub orders: Vec<BatchOrderRef>,
}

/// Minutes a ticket has waited and whether it passed the alert threshold.
/// READY tickets are never overdue.
pub fn ticket_timing(
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    status: OrderStatus,
    alert_minutes: i64,
) -> (i64, bool) {
    let elapsed = (now - created_at).num_minutes().max(0);
    (elapsed, status != OrderStatus::Ready && elapsed >= alert_minutes)
}

/// Groups identical menu items across orders, largest total first.
pub fn group_for_batching(orders: &[OrderDetails]) -> Vec<BatchGroup> {
    let mut groups: Vec<BatchGroup> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for details in orders {
        for line in &details.items {
            let slot = *index.entry(line.item.menu_item_id).or_insert_with(|| {
                groups.push(BatchGroup {
                    menu_item_id: line.item.menu_item_id,
                    menu_item_name: line.menu_item_name.clone(),
                    total_quantity: 0,
                    orders: Vec::new(),
                });
                groups.len() - 1
            });
            let group = &mut groups[slot];
            let quantity = i64::from(line.item.quantity);
            group.total_quantity += quantity;

            match group
                .orders
                .iter_mut()
                .find(|o| o.order_id == details.order.id)
            {
                Some(existing) => existing.quantity += quantity,
                None => group.orders.push(BatchOrderRef {
                    order_id: details.order.id,
                    order_number: details.order.order_number.clone(),
                    quantity,
                }),
            }
        }
    }

    groups.sort_by(|a, b| {
        b.total_quantity
            .cmp(&a.total_quantity)
            .then_with(|| a.menu_item_name.cmp(&b.menu_item_name))
    });
    groups
}

/// Read models for the kitchen display, refreshed by client polling.
pub struct KitchenService {
    db_pool: Arc<DbPool>,
    alert_minutes: i64,
}

impl KitchenService {
    pub fn new(db_pool: Arc<DbPool>, alert_minutes: i64) -> Self {
        Self {
            db_pool,
            alert_minutes,
        }
    }

    async fn active_orders(&self) -> Result<Vec<OrderDetails>, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::Status.is_in(OrderStatus::ACTIVE))
            .order_by_asc(order::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        load_details(self.db_pool.as_ref(), orders).await
    }

    #[instrument(skip(self))]
    pub async fn board(&self) -> Result<KitchenBoard, ServiceError> {
        let now = Utc::now();
        let mut board = KitchenBoard::default();

        for details in self.active_orders().await? {
            let (elapsed_minutes, is_overdue) = ticket_timing(
                details.order.created_at,
                now,
                details.order.status,
                self.alert_minutes,
            );
            let column = match details.order.status {
                OrderStatus::Pending => &mut board.pending,
                OrderStatus::Preparing => &mut board.preparing,
                _ => &mut board.ready,
            };
            column.push(KitchenTicket {
                order: details.order,
                items: details.items,
                elapsed_minutes,
                is_overdue,
            });
        }
        Ok(board)
    }

    #[instrument(skip(self))]
    pub async fn batching(&self) -> Result<Vec<BatchGroup>, ServiceError> {
        Ok(group_for_batching(&self.active_orders().await?))
    }
}
