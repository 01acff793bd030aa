use crate::{
    db::{self, DbPool},
    entities::{
        order::{self, Entity as Order, OrderStatus},
        payment::{self, Entity as Payment, PaymentMethod},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        inventory::InventoryService,
        orders::{apply_status, deduct_after_completion, InventoryOutcome},
    },
};
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RecordPaymentInput {
    pub order_id: Uuid,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub received_amount: Option<Decimal>,
    pub change: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentReceipt {
    pub payment: payment::Model,
    pub order: order::Model,
    #[serde(flatten)]
    pub inventory: InventoryOutcome,
}

/// Change owed for a payment, or an error when the cash handed over is short.
pub fn settle(
    amount: Decimal,
    received: Option<Decimal>,
    change: Option<Decimal>,
) -> Result<Option<Decimal>, ServiceError> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "amount must be greater than 0".to_string(),
        ));
    }
    match received {
        Some(received) if received < amount => Err(ServiceError::ValidationError(format!(
            "received amount {} does not cover {}",
            received.normalize(),
            amount.normalize()
        ))),
        Some(received) => Ok(Some(change.unwrap_or(received - amount))),
        None => Ok(change),
    }
}

pub struct PaymentService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    inventory: Arc<InventoryService>,
    auto_deduct_inventory: bool,
}

impl PaymentService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        inventory: Arc<InventoryService>,
        auto_deduct_inventory: bool,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            inventory,
            auto_deduct_inventory,
        }
    }

    /// Stores the payment and closes the order as PAID in one transaction.
    #[instrument(skip(self, input), fields(order_id = %input.order_id, method = %input.method))]
    pub async fn record(
        &self,
        input: RecordPaymentInput,
        performed_by: Option<Uuid>,
    ) -> Result<PaymentReceipt, ServiceError> {
        let change = settle(input.amount, input.received_amount, input.change)?;

        let txn = db::begin(&self.db_pool).await?;

        let order = Order::find_by_id(input.order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", input.order_id)))?;

        match order.status {
            OrderStatus::Cancelled => {
                return Err(ServiceError::InvalidStatus(format!(
                    "Order #{} is cancelled",
                    order.order_number
                )))
            }
            OrderStatus::Paid => {
                return Err(ServiceError::InvalidStatus(format!(
                    "Order #{} is already paid",
                    order.order_number
                )))
            }
            _ => {}
        }
        let old_status = order.status;

        let payment = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            method: Set(input.method),
            amount: Set(input.amount),
            received_amount: Set(input.received_amount),
            change: Set(change),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        let order = apply_status(&txn, order, OrderStatus::Paid).await?;

        db::commit(txn).await?;

        counter!("tesorito_payments_recorded", 1, "method" => payment.method.to_string());
        info!(payment_id = %payment.id, amount = %payment.amount, "Payment recorded");

        self.event_sender
            .send_or_log(Event::PaymentRecorded {
                payment_id: payment.id,
                order_id: order.id,
                amount: payment.amount,
            })
            .await;
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id: order.id,
                old_status: old_status.to_string(),
                new_status: OrderStatus::Paid.to_string(),
            })
            .await;

        let inventory = if self.auto_deduct_inventory {
            deduct_after_completion(&self.inventory, &order, performed_by).await
        } else {
            InventoryOutcome::default()
        };

        let order = if inventory.deduction.is_some() {
            Order::find_by_id(order.id)
                .one(self.db_pool.as_ref())
                .await
                .map_err(ServiceError::db_error)?
                .unwrap_or(order)
        } else {
            order
        };

        Ok(PaymentReceipt {
            payment,
            order,
            inventory,
        })
    }

    #[instrument(skip(self))]
    pub async fn for_order(&self, order_id: Uuid) -> Result<Vec<payment::Model>, ServiceError> {
        Payment::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .order_by_asc(payment::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    #[test]
    fn change_defaults_to_the_difference() {
        assert_eq!(
            settle(dec!(87.50), Some(dec!(100)), None).unwrap(),
            Some(dec!(12.50))
        );
        assert_eq!(settle(dec!(87.50), None, None).unwrap(), None);
    }

    #[test]
    fn short_or_non_positive_payments_are_rejected() {
        assert_matches!(
            settle(dec!(50), Some(dec!(20)), None),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            settle(Decimal::ZERO, None, None),
            Err(ServiceError::ValidationError(_))
        );
    }
}
