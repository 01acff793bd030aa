use crate::{
    db::DbPool,
    entities::{
        customer::{self, Entity as Customer},
        ingredient::{self, Entity as Ingredient},
        menu_item::{self, Entity as MenuItem},
        order::{self, Entity as Order, OrderStatus},
        order_item::{self, Entity as OrderItem},
    },
    errors::ServiceError,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

pub const DEFAULT_REPORT_DAYS: i64 = 7;
const MAX_REPORT_DAYS: i64 = 366;
const TOP_N: usize = 5;
const UNKNOWN_SOURCE: &str = "Unknown";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SalesSummary {
    pub total_sales: Decimal,
    pub total_orders: u64,
    pub average_ticket: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SourceSales {
    pub count: u64,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TopItem {
    pub menu_item_id: Uuid,
    pub name: String,
    pub quantity: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InventorySnapshot {
    pub low_stock_count: usize,
    pub total_stock_value: Decimal,
    pub low_stock_items: Vec<ingredient::Model>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomerSnapshot {
    pub top_customers: Vec<customer::Model>,
    pub new_customers: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SalesReport {
    pub days: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub summary: SalesSummary,
    pub sales_by_day: BTreeMap<String, Decimal>,
    pub sales_by_source: BTreeMap<String, SourceSales>,
    pub top_items: Vec<TopItem>,
    pub inventory: InventorySnapshot,
    pub customers: CustomerSnapshot,
}

/// Sales figures for the completed orders of a window.
#[derive(Debug, Default)]
pub struct SalesBreakdown {
    pub summary: SalesSummary,
    pub by_day: BTreeMap<String, Decimal>,
    pub by_source: BTreeMap<String, SourceSales>,
}

pub fn sales_breakdown(orders: &[order::Model]) -> SalesBreakdown {
    let mut breakdown = SalesBreakdown::default();

    for order in orders {
        breakdown.summary.total_sales += order.total;
        breakdown.summary.total_orders += 1;

        *breakdown
            .by_day
            .entry(order.created_at.format("%Y-%m-%d").to_string())
            .or_default() += order.total;

        let source = match order.source.trim() {
            "" => UNKNOWN_SOURCE.to_string(),
            s => s.to_string(),
        };
        let entry = breakdown.by_source.entry(source).or_default();
        entry.count += 1;
        entry.total += order.total;
    }

    if breakdown.summary.total_orders > 0 {
        breakdown.summary.average_ticket = (breakdown.summary.total_sales
            / Decimal::from(breakdown.summary.total_orders))
        .round_dp(2);
    }
    breakdown
}

/// Best sellers by units, ties broken by revenue then name.
pub fn top_items(lines: &[order_item::Model], names: &HashMap<Uuid, String>, n: usize) -> Vec<TopItem> {
    let mut by_item: HashMap<Uuid, (i64, Decimal)> = HashMap::new();
    for line in lines {
        let entry = by_item.entry(line.menu_item_id).or_default();
        entry.0 += i64::from(line.quantity);
        entry.1 += line.line_total();
    }

    let mut ranked: Vec<TopItem> = by_item
        .into_iter()
        .map(|(menu_item_id, (quantity, revenue))| TopItem {
            menu_item_id,
            name: names.get(&menu_item_id).cloned().unwrap_or_default(),
            quantity,
            revenue,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.quantity
            .cmp(&a.quantity)
            .then(b.revenue.cmp(&a.revenue))
            .then(a.name.cmp(&b.name))
    });
    ranked.truncate(n);
    ranked
}

pub fn stock_value(ingredients: &[ingredient::Model]) -> Decimal {
    ingredients
        .iter()
        .filter_map(|i| i.cost_per_unit.map(|cost| i.current_stock * cost))
        .sum()
}

pub struct ReportService {
    db_pool: Arc<DbPool>,
}

impl ReportService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Sales, inventory and customer report for the last `days` days.
    #[instrument(skip(self))]
    pub async fn sales_report(&self, days: i64) -> Result<SalesReport, ServiceError> {
        if !(1..=MAX_REPORT_DAYS).contains(&days) {
            return Err(ServiceError::ValidationError(format!(
                "days must be between 1 and {}",
                MAX_REPORT_DAYS
            )));
        }
        let db = self.db_pool.as_ref();
        let end = Utc::now();
        let start = end - Duration::days(days);

        let orders = Order::find()
            .filter(order::Column::CreatedAt.gte(start))
            .filter(order::Column::Status.is_in([OrderStatus::Delivered, OrderStatus::Paid]))
            .order_by_asc(order::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let breakdown = sales_breakdown(&orders);

        let lines = if orders.is_empty() {
            Vec::new()
        } else {
            OrderItem::find()
                .filter(order_item::Column::OrderId.is_in(orders.iter().map(|o| o.id)))
                .all(db)
                .await
                .map_err(ServiceError::db_error)?
        };
        let names: HashMap<Uuid, String> = MenuItem::find()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|m: menu_item::Model| (m.id, m.name))
            .collect();

        let ingredients = Ingredient::find()
            .order_by_asc(ingredient::Column::CurrentStock)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let total_stock_value = stock_value(&ingredients);
        let low_stock_items: Vec<_> = ingredients
            .into_iter()
            .filter(ingredient::Model::is_low_stock)
            .collect();

        let top_customers = Customer::find()
            .order_by_desc(customer::Column::TotalSpend)
            .limit(TOP_N as u64)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let new_customers = Customer::find()
            .filter(customer::Column::CreatedAt.gte(start))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(SalesReport {
            days,
            start,
            end,
            summary: breakdown.summary,
            sales_by_day: breakdown.by_day,
            sales_by_source: breakdown.by_source,
            top_items: top_items(&lines, &names, TOP_N),
            inventory: InventorySnapshot {
                low_stock_count: low_stock_items.len(),
                total_stock_value,
                low_stock_items,
            },
            customers: CustomerSnapshot {
                top_customers,
                new_customers,
            },
        })
    }
}
