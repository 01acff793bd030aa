use crate::{
    db::{self, DbPool},
    entities::{
        customer::{self, Entity as Customer},
        menu_item::{self, Entity as MenuItem},
        order::{self, Entity as Order, OrderStatus},
        order_item::{self, Entity as OrderItem},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::inventory::{DeductionAttempt, DeductionResult, InventoryService},
};
use chrono::Utc;
use metrics::counter;
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Money amounts are kept to cents.
const MONEY_DP: u32 = 2;

/// Settings that shape order totals and side effects.
#[derive(Debug, Clone, Copy)]
pub struct OrderPolicy {
    pub tax_rate: Decimal,
    pub loyalty_point_value: Decimal,
    pub auto_deduct_inventory: bool,
}

/// Subtotal, tax and total of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Totals for a given subtotal; tax is rounded half-up to cents.
    pub fn from_subtotal(subtotal: Decimal, tax_rate: Decimal) -> Self {
        let tax = (subtotal * tax_rate)
            .round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero);
        Self {
            subtotal,
            tax,
            total: subtotal + tax,
        }
    }
}

/// Sum of `unit_price * quantity` over all lines.
pub fn subtotal<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    lines
        .into_iter()
        .map(|(unit_price, quantity)| unit_price * Decimal::from(quantity))
        .sum()
}

/// Whole loyalty points earned by spending `total`.
pub fn loyalty_points_for(total: Decimal, point_value: Decimal) -> i32 {
    if point_value <= Decimal::ZERO || total <= Decimal::ZERO {
        return 0;
    }
    (total / point_value).floor().to_i32().unwrap_or(i32::MAX)
}

/// Adds points and spend to the stored values in one UPDATE.
///
/// Points stop at `i32::MAX` instead of overflowing the column.
async fn credit_customer<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
    points: i32,
    spend: Decimal,
) -> Result<(), ServiceError> {
    let loyalty = Expr::case(
        Condition::all().add(Expr::col(customer::Column::LoyaltyPoints).gt(i32::MAX - points)),
        i32::MAX,
    )
    .finally(Expr::col(customer::Column::LoyaltyPoints).add(points));

    Customer::update_many()
        .col_expr(customer::Column::LoyaltyPoints, loyalty.into())
        .col_expr(
            customer::Column::TotalSpend,
            Expr::col(customer::Column::TotalSpend).add(spend),
        )
        .col_expr(customer::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(customer::Column::Id.eq(customer_id))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(())
}

/// Zero-padded display number for a sequence value.
pub fn format_order_number(sequence: i32) -> String {
    format!("{:03}", sequence)
}

#[derive(Debug, Clone)]
pub struct OrderLineInput {
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateOrderInput {
    pub customer_id: Option<Uuid>,
    pub source: String,
    pub table_label: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<OrderLineInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderLineView {
    #[serde(flatten)]
    pub item: order_item::Model,
    pub menu_item_name: String,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<OrderLineView>,
    pub customer: Option<customer::Model>,
}

/// What happened to inventory when an order was completed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct InventoryOutcome {
    pub deduction: Option<DeductionResult>,
    pub inventory_errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusChange {
    pub order: order::Model,
    #[serde(flatten)]
    pub inventory: InventoryOutcome,
}

/// Runs the recipe deduction for a freshly completed order.
///
/// The status change is already committed; failures are reported, not raised.
pub async fn deduct_after_completion(
    inventory: &InventoryService,
    order: &order::Model,
    performed_by: Option<Uuid>,
) -> InventoryOutcome {
    if order.inventory_deducted_at.is_some() {
        return InventoryOutcome::default();
    }
    match inventory.deduct_if_pending(order.id, performed_by).await {
        Ok(DeductionAttempt::AlreadyDeducted { .. }) => InventoryOutcome::default(),
        Ok(DeductionAttempt::Applied(deduction)) => InventoryOutcome {
            deduction: Some(deduction),
            inventory_errors: Vec::new(),
        },
        Err(ServiceError::InsufficientStock(shortfalls)) => {
            warn!(
                order_id = %order.id,
                shortfalls = shortfalls.len(),
                "Order completed without inventory deduction"
            );
            InventoryOutcome {
                deduction: None,
                inventory_errors: shortfalls,
            }
        }
        Err(e) => {
            warn!(order_id = %order.id, error = %e, "Automatic inventory deduction failed");
            InventoryOutcome {
                deduction: None,
                inventory_errors: vec![e.response_message()],
            }
        }
    }
}

/// Order intake and lifecycle.
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    inventory: Arc<InventoryService>,
    policy: OrderPolicy,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        inventory: Arc<InventoryService>,
        policy: OrderPolicy,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            inventory,
            policy,
        }
    }

    /// Orders newest first, optionally restricted to some statuses.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        statuses: &[OrderStatus],
    ) -> Result<Vec<OrderDetails>, ServiceError> {
        let mut query = Order::find();
        if !statuses.is_empty() {
            query = query.filter(order::Column::Status.is_in(statuses.iter().copied()));
        }
        let orders = query
            .order_by_desc(order::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        load_details(self.db_pool.as_ref(), orders).await
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let order = self.find_order(order_id).await?;
        let mut details = load_details(self.db_pool.as_ref(), vec![order]).await?;
        details
            .pop()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    #[instrument(skip(self))]
    pub async fn get_by_number(&self, order_number: &str) -> Result<OrderDetails, ServiceError> {
        let order = Order::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order #{} not found", order_number)))?;
        let mut details = load_details(self.db_pool.as_ref(), vec![order]).await?;
        details
            .pop()
            .ok_or_else(|| ServiceError::NotFound(format!("Order #{} not found", order_number)))
    }

    /// Prices the lines, stores the order and credits the customer, atomically.
    #[instrument(skip(self, input), fields(source = %input.source, lines = input.items.len()))]
    pub async fn create_order(&self, input: CreateOrderInput) -> Result<OrderDetails, ServiceError> {
        let source = input.source.trim().to_string();
        if source.is_empty() {
            return Err(ServiceError::ValidationError(
                "source is required".to_string(),
            ));
        }
        validate_lines(&input.items)?;

        let txn = db::begin(&self.db_pool).await?;

        let prices = price_lines(&txn, &input.items).await?;

        let customer = match input.customer_id {
            Some(customer_id) => Some(
                Customer::find_by_id(customer_id)
                    .one(&txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Customer {} not found", customer_id))
                    })?,
            ),
            None => None,
        };

        let totals = OrderTotals::from_subtotal(
            subtotal(input.items.iter().map(|l| (prices[&l.menu_item_id], l.quantity))),
            self.policy.tax_rate,
        );

        let sequence = Order::find()
            .order_by_desc(order::Column::SequenceNumber)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .map(|o| o.sequence_number + 1)
            .unwrap_or(1);

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(format_order_number(sequence)),
            sequence_number: Set(sequence),
            customer_id: Set(input.customer_id),
            source: Set(source),
            status: Set(OrderStatus::Pending),
            table_label: Set(clean(input.table_label)),
            notes: Set(clean(input.notes)),
            subtotal: Set(totals.subtotal),
            tax: Set(totals.tax),
            total: Set(totals.total),
            inventory_deducted_at: Set(None),
            completed_at: Set(None),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        insert_lines(&txn, order_id, &input.items, &prices).await?;

        if let Some(customer) = customer {
            let points = loyalty_points_for(totals.total, self.policy.loyalty_point_value);
            credit_customer(&txn, customer.id, points, totals.total).await?;
        }

        db::commit(txn).await?;

        counter!("tesorito_orders_created", 1, "source" => order.source.clone());
        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "Order created"
        );
        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id: order.id,
                order_number: order.order_number.clone(),
                total: order.total,
            })
            .await;

        self.get_order(order_id).await
    }

    /// Appends lines to an open order and grows its totals.
    #[instrument(skip(self, items), fields(lines = items.len()))]
    pub async fn add_items(
        &self,
        order_id: Uuid,
        items: Vec<OrderLineInput>,
    ) -> Result<OrderDetails, ServiceError> {
        validate_lines(&items)?;

        let txn = db::begin(&self.db_pool).await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if matches!(order.status, OrderStatus::Cancelled | OrderStatus::Paid) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot add items to a {} order",
                order.status
            )));
        }
        // lines added after the deduction would never reach inventory
        if order.inventory_deducted_at.is_some() {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot add items to order #{}: inventory already deducted",
                order.order_number
            )));
        }

        let prices = price_lines(&txn, &items).await?;
        let added = subtotal(items.iter().map(|l| (prices[&l.menu_item_id], l.quantity)));
        let totals = OrderTotals::from_subtotal(order.subtotal + added, self.policy.tax_rate);

        insert_lines(&txn, order_id, &items, &prices).await?;

        let mut active: order::ActiveModel = order.into();
        active.subtotal = Set(totals.subtotal);
        active.tax = Set(totals.tax);
        active.total = Set(totals.total);
        active.update(&txn).await.map_err(ServiceError::db_error)?;

        db::commit(txn).await?;

        info!(%order_id, added = %added, "Items added to order");
        self.event_sender
            .send_or_log(Event::OrderItemsAdded {
                order_id,
                added_lines: items.len(),
            })
            .await;

        self.get_order(order_id).await
    }

    /// Moves an order to `status`; completing it triggers the inventory deduction.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        performed_by: Option<Uuid>,
    ) -> Result<StatusChange, ServiceError> {
        let order = self.find_order(order_id).await?;
        let old_status = order.status;

        let order = self.set_status(order, status).await?;

        let inventory = if status.is_completed() && self.policy.auto_deduct_inventory {
            deduct_after_completion(&self.inventory, &order, performed_by).await
        } else {
            InventoryOutcome::default()
        };

        if old_status != status {
            self.event_sender
                .send_or_log(Event::OrderStatusChanged {
                    order_id,
                    old_status: old_status.to_string(),
                    new_status: status.to_string(),
                })
                .await;
        }

        // reload to pick up inventory_deducted_at
        let order = if inventory.deduction.is_some() {
            self.find_order(order_id).await?
        } else {
            order
        };

        Ok(StatusChange { order, inventory })
    }

    /// Applies a status change to a loaded order and persists it.
    async fn set_status(
        &self,
        order: order::Model,
        status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        if order.status == OrderStatus::Cancelled && status != OrderStatus::Cancelled {
            return Err(ServiceError::InvalidStatus(format!(
                "Order #{} is cancelled",
                order.order_number
            )));
        }
        if order.status == status {
            return Ok(order);
        }

        apply_status(self.db_pool.as_ref(), order, status).await
    }

    pub(crate) async fn find_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        Order::find_by_id(order_id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }
}

/// Writes the new status, stamping `completed_at` the first time the order completes.
pub(crate) async fn apply_status<C: ConnectionTrait>(
    conn: &C,
    order: order::Model,
    status: OrderStatus,
) -> Result<order::Model, ServiceError> {
    let from = order.status;
    let stamp_completion = status.is_completed() && order.completed_at.is_none();

    let mut active: order::ActiveModel = order.into();
    active.status = Set(status);
    if stamp_completion {
        active.completed_at = Set(Some(Utc::now()));
    }
    let updated = active.update(conn).await.map_err(ServiceError::db_error)?;

    info!(
        order_id = %updated.id,
        from = %from,
        to = %status,
        "Order status updated"
    );
    Ok(updated)
}

fn validate_lines(items: &[OrderLineInput]) -> Result<(), ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::ValidationError(
            "at least one order item is required".to_string(),
        ));
    }
    if let Some(bad) = items.iter().find(|l| l.quantity <= 0) {
        return Err(ServiceError::ValidationError(format!(
            "quantity for menu item {} must be greater than 0",
            bad.menu_item_id
        )));
    }
    Ok(())
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Current price of every menu item referenced by `items`.
async fn price_lines<C: ConnectionTrait>(
    conn: &C,
    items: &[OrderLineInput],
) -> Result<HashMap<Uuid, Decimal>, ServiceError> {
    let ids: HashSet<Uuid> = items.iter().map(|l| l.menu_item_id).collect();
    let menu: HashMap<Uuid, menu_item::Model> = MenuItem::find()
        .filter(menu_item::Column::Id.is_in(ids.iter().copied()))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|m| (m.id, m))
        .collect();

    let mut prices = HashMap::with_capacity(ids.len());
    for id in ids {
        let item = menu
            .get(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("Menu item {} not found", id)))?;
        if !item.is_available {
            return Err(ServiceError::InvalidOperation(format!(
                "{} is not available",
                item.name
            )));
        }
        prices.insert(id, item.price);
    }
    Ok(prices)
}

async fn insert_lines<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    items: &[OrderLineInput],
    prices: &HashMap<Uuid, Decimal>,
) -> Result<(), ServiceError> {
    let now = Utc::now();
    for line in items {
        order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            menu_item_id: Set(line.menu_item_id),
            quantity: Set(line.quantity),
            unit_price: Set(prices[&line.menu_item_id]),
            notes: Set(clean(line.notes.clone())),
            created_at: Set(now),
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)?;
    }
    Ok(())
}

/// Attaches lines, menu names and customers to a page of orders.
pub(crate) async fn load_details<C: ConnectionTrait>(
    conn: &C,
    orders: Vec<order::Model>,
) -> Result<Vec<OrderDetails>, ServiceError> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.is_in(order_ids))
        .order_by_asc(order_item::Column::CreatedAt)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let menu_ids: HashSet<Uuid> = items.iter().map(|i| i.menu_item_id).collect();
    let menu_names: HashMap<Uuid, String> = if menu_ids.is_empty() {
        HashMap::new()
    } else {
        MenuItem::find()
            .filter(menu_item::Column::Id.is_in(menu_ids))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|m| (m.id, m.name))
            .collect()
    };

    let customer_ids: HashSet<Uuid> = orders.iter().filter_map(|o| o.customer_id).collect();
    let customers: HashMap<Uuid, customer::Model> = if customer_ids.is_empty() {
        HashMap::new()
    } else {
        Customer::find()
            .filter(customer::Column::Id.is_in(customer_ids))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|c| (c.id, c))
            .collect()
    };

    let mut lines_by_order: HashMap<Uuid, Vec<OrderLineView>> = HashMap::new();
    for item in items {
        let menu_item_name = menu_names
            .get(&item.menu_item_id)
            .cloned()
            .unwrap_or_default();
        lines_by_order
            .entry(item.order_id)
            .or_default()
            .push(OrderLineView {
                line_total: item.line_total(),
                menu_item_name,
                item,
            });
    }

    Ok(orders
        .into_iter()
        .map(|order| OrderDetails {
            items: lines_by_order.remove(&order.id).unwrap_or_default(),
            customer: order.customer_id.and_then(|id| customers.get(&id).cloned()),
            order,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[test]
    fn subtotal_multiplies_captured_prices() {
        let sum = subtotal([(dec!(45.00), 2), (dec!(12.50), 3)]);
        assert_eq!(sum, dec!(127.50));
    }

    #[test]
    fn zero_tax_rate_keeps_total_equal_to_subtotal() {
        let totals = OrderTotals::from_subtotal(dec!(35), Decimal::ZERO);
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.total, dec!(35));
    }

    #[test]
    fn tax_is_rounded_to_cents() {
        let totals = OrderTotals::from_subtotal(dec!(10.05), dec!(0.16));
        assert_eq!(totals.tax, dec!(1.61));
        assert_eq!(totals.total, dec!(11.66));
    }

    #[rstest]
    #[case(dec!(35), 3)]
    #[case(dec!(9.99), 0)]
    #[case(dec!(10), 1)]
    #[case(dec!(0), 0)]
    #[case(dec!(129.50), 12)]
    fn loyalty_points_round_down(#[case] total: Decimal, #[case] expected: i32) {
        assert_eq!(loyalty_points_for(total, dec!(10)), expected);
    }

    #[rstest]
    #[case(1, "001")]
    #[case(42, "042")]
    #[case(1000, "1000")]
    fn order_numbers_are_zero_padded(#[case] sequence: i32, #[case] expected: &str) {
        assert_eq!(format_order_number(sequence), expected);
    }

    #[test]
    fn empty_or_zero_quantity_lines_are_rejected() {
        assert!(validate_lines(&[]).is_err());
        let line = OrderLineInput {
            menu_item_id: Uuid::new_v4(),
            quantity: 0,
            notes: None,
        };
        assert!(validate_lines(&[line]).is_err());
    }
}
