use crate::{
    config::StockPolicy,
    db::{self, DbPool},
    entities::{
        ingredient::{self, Entity as Ingredient},
        order::{self, Entity as Order, OrderStatus},
        order_item::{self, Entity as OrderItem},
        recipe_item::{self, Entity as RecipeItem},
        stock_adjustment::{self, Entity as StockAdjustment},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Number of recent adjustments shown next to each ingredient in listings.
const RECENT_ADJUSTMENTS: u64 = 5;

/// One ingredient a menu item consumes per unit sold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeComponent {
    pub ingredient_id: Uuid,
    pub quantity_required: Decimal,
}

impl From<&recipe_item::Model> for RecipeComponent {
    fn from(item: &recipe_item::Model) -> Self {
        Self {
            ingredient_id: item.ingredient_id,
            quantity_required: item.quantity_required,
        }
    }
}

/// Sums `quantity_sold * quantity_required` per ingredient across all lines.
///
/// A menu item sold on two lines, or two menu items sharing an ingredient,
/// contribute to the same total.
pub fn aggregate_requirements<'a, I>(lines: I) -> BTreeMap<Uuid, Decimal>
where
    I: IntoIterator<Item = (i32, &'a [RecipeComponent])>,
{
    let mut totals: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    for (quantity_sold, recipe) in lines {
        let sold = Decimal::from(quantity_sold);
        for component in recipe {
            *totals.entry(component.ingredient_id).or_default() +=
                sold * component.quantity_required;
        }
    }
    totals
}

/// Per-ingredient outcome of a deduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeductionLine {
    pub ingredient_id: Uuid,
    pub ingredient_name: String,
    pub quantity_deducted: Decimal,
    pub previous_stock: Decimal,
    pub new_stock: Decimal,
}

/// Applies `policy` to the aggregated requirements.
///
/// Strict returns every shortfall as a message and plans nothing; permissive
/// always plans every line. Lines come back sorted by ingredient name.
pub fn plan_deductions(
    requirements: &BTreeMap<Uuid, Decimal>,
    ingredients: &HashMap<Uuid, ingredient::Model>,
    policy: StockPolicy,
) -> Result<Vec<DeductionLine>, Vec<String>> {
    let mut lines = Vec::with_capacity(requirements.len());
    let mut shortfalls = Vec::new();

    for (ingredient_id, required) in requirements {
        let Some(ingredient) = ingredients.get(ingredient_id) else {
            continue;
        };
        let new_stock = ingredient.current_stock - *required;
        if new_stock < Decimal::ZERO {
            shortfalls.push(shortfall_message(ingredient, *required));
        }
        lines.push(DeductionLine {
            ingredient_id: *ingredient_id,
            ingredient_name: ingredient.name.clone(),
            quantity_deducted: *required,
            previous_stock: ingredient.current_stock,
            new_stock,
        });
    }

    if policy == StockPolicy::Strict && !shortfalls.is_empty() {
        shortfalls.sort();
        return Err(shortfalls);
    }

    lines.sort_by(|a, b| a.ingredient_name.cmp(&b.ingredient_name));
    Ok(lines)
}

fn shortfall_message(ingredient: &ingredient::Model, required: Decimal) -> String {
    format!(
        "Insufficient stock for {}. Required: {}, Available: {}",
        ingredient.name,
        required.normalize(),
        ingredient.current_stock.normalize()
    )
}

/// Adds `delta` to the stored stock in a single UPDATE and returns the fresh row.
///
/// With `keep_non_negative` the update only matches while the result stays at
/// or above zero; `None` means it did not match.
async fn apply_stock_delta<C: ConnectionTrait>(
    conn: &C,
    ingredient_id: Uuid,
    delta: Decimal,
    keep_non_negative: bool,
) -> Result<Option<ingredient::Model>, ServiceError> {
    let mut update = Ingredient::update_many()
        .col_expr(
            ingredient::Column::CurrentStock,
            Expr::col(ingredient::Column::CurrentStock).add(delta),
        )
        .col_expr(ingredient::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(ingredient::Column::Id.eq(ingredient_id));
    if keep_non_negative {
        update = update.filter(ingredient::Column::CurrentStock.gte(-delta));
    }
    let result = update.exec(conn).await.map_err(ServiceError::db_error)?;
    if result.rows_affected == 0 {
        return Ok(None);
    }

    Ingredient::find_by_id(ingredient_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeductionResult {
    pub order_id: Uuid,
    pub order_number: String,
    pub message: String,
    pub deductions: Vec<DeductionLine>,
}

#[derive(Debug, Clone)]
pub enum DeductionAttempt {
    Applied(DeductionResult),
    AlreadyDeducted { order_number: String },
}

#[derive(Debug, Clone)]
pub struct AdjustStockInput {
    pub ingredient_id: Uuid,
    pub adjustment: Decimal,
    pub reason: Option<String>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockAdjustmentResult {
    pub ingredient: ingredient::Model,
    pub adjustment: stock_adjustment::Model,
    pub previous_stock: Decimal,
    pub new_stock: Decimal,
}

#[derive(Debug, Clone)]
pub struct CreateIngredientInput {
    pub name: String,
    pub unit: String,
    pub current_stock: Decimal,
    pub minimum_stock: Decimal,
    pub cost_per_unit: Option<Decimal>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateIngredientInput {
    pub name: Option<String>,
    pub unit: Option<String>,
    pub minimum_stock: Option<Decimal>,
    pub cost_per_unit: Option<Decimal>,
}

/// Ingredient with its most recent stock movements.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IngredientWithAdjustments {
    #[serde(flatten)]
    pub ingredient: ingredient::Model,
    pub is_low_stock: bool,
    pub recent_adjustments: Vec<stock_adjustment::Model>,
}

/// Stock levels, manual adjustments and recipe-driven deductions.
pub struct InventoryService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    stock_policy: StockPolicy,
}

impl InventoryService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        stock_policy: StockPolicy,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            stock_policy,
        }
    }

    pub fn stock_policy(&self) -> StockPolicy {
        self.stock_policy
    }

    /// Deducts every ingredient the order's recipes consume, in one transaction.
    ///
    /// A second deduction for the same order is rejected.
    pub async fn deduct_for_order(
        &self,
        order_id: Uuid,
        performed_by: Option<Uuid>,
    ) -> Result<DeductionResult, ServiceError> {
        match self.deduct_if_pending(order_id, performed_by).await? {
            DeductionAttempt::Applied(result) => Ok(result),
            DeductionAttempt::AlreadyDeducted { order_number } => {
                Err(ServiceError::InvalidOperation(format!(
                    "Inventory already deducted for order #{}",
                    order_number
                )))
            }
        }
    }

    /// Like [`Self::deduct_for_order`], but an order that was already deducted
    /// is reported instead of rejected.
    #[instrument(skip(self), fields(policy = %self.stock_policy))]
    pub async fn deduct_if_pending(
        &self,
        order_id: Uuid,
        performed_by: Option<Uuid>,
    ) -> Result<DeductionAttempt, ServiceError> {
        let txn = db::begin(&self.db_pool).await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.status == OrderStatus::Cancelled {
            return Err(ServiceError::InvalidOperation(format!(
                "Order #{} is cancelled",
                order.order_number
            )));
        }
        if order.inventory_deducted_at.is_some() {
            return Ok(DeductionAttempt::AlreadyDeducted {
                order_number: order.order_number,
            });
        }

        // claim the order; only one deduction can match
        let now = Utc::now();
        let claimed = Order::update_many()
            .col_expr(order::Column::InventoryDeductedAt, Expr::value(now))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::InventoryDeductedAt.is_null())
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if claimed.rows_affected != 1 {
            return Ok(DeductionAttempt::AlreadyDeducted {
                order_number: order.order_number,
            });
        }

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let requirements = requirements_for_items(&txn, &items).await?;

        let ingredients: HashMap<Uuid, ingredient::Model> = if requirements.is_empty() {
            HashMap::new()
        } else {
            Ingredient::find()
                .filter(ingredient::Column::Id.is_in(requirements.keys().copied()))
                .all(&txn)
                .await
                .map_err(ServiceError::db_error)?
                .into_iter()
                .map(|i| (i.id, i))
                .collect()
        };

        let mut lines = match plan_deductions(&requirements, &ingredients, self.stock_policy) {
            Ok(lines) => lines,
            Err(shortfalls) => {
                warn!(
                    %order_id,
                    order_number = %order.order_number,
                    shortfalls = shortfalls.len(),
                    "Rejecting deduction: insufficient stock"
                );
                counter!("tesorito_inventory_deductions_rejected", 1);
                return Err(ServiceError::InsufficientStock(shortfalls));
            }
        };

        let reason = format!("Order #{}", order.order_number);
        let strict = self.stock_policy == StockPolicy::Strict;
        for line in lines.iter_mut() {
            let Some(updated) =
                apply_stock_delta(&txn, line.ingredient_id, -line.quantity_deducted, strict)
                    .await?
            else {
                // stock moved between planning and the update
                let current = Ingredient::find_by_id(line.ingredient_id)
                    .one(&txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "Ingredient {} not found",
                            line.ingredient_id
                        ))
                    })?;
                counter!("tesorito_inventory_deductions_rejected", 1);
                return Err(ServiceError::InsufficientStock(vec![shortfall_message(
                    &current,
                    line.quantity_deducted,
                )]));
            };
            line.new_stock = updated.current_stock;
            line.previous_stock = updated.current_stock + line.quantity_deducted;

            stock_adjustment::ActiveModel {
                id: Set(Uuid::new_v4()),
                ingredient_id: Set(line.ingredient_id),
                adjustment: Set(-line.quantity_deducted),
                reason: Set(Some(reason.clone())),
                user_id: Set(performed_by),
                order_id: Set(Some(order_id)),
                created_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        }

        let order_number = order.order_number.clone();

        db::commit(txn).await?;

        counter!("tesorito_inventory_deductions", 1);
        info!(
            %order_id,
            %order_number,
            ingredients = lines.len(),
            "Inventory deducted for order"
        );

        self.event_sender
            .send_or_log(Event::InventoryDeducted {
                order_id,
                ingredients: lines.len(),
            })
            .await;
        for line in &lines {
            if let Some(ingredient) = ingredients.get(&line.ingredient_id) {
                if line.new_stock <= ingredient.minimum_stock {
                    self.publish_low_stock(ingredient, line.new_stock).await;
                }
            }
        }

        Ok(DeductionAttempt::Applied(DeductionResult {
            order_id,
            message: format!("Inventory deducted for order #{}", order_number),
            order_number,
            deductions: lines,
        }))
    }

    /// Adds a signed delta to an ingredient and logs it, atomically.
    #[instrument(skip(self, input), fields(ingredient_id = %input.ingredient_id))]
    pub async fn adjust_stock(
        &self,
        input: AdjustStockInput,
    ) -> Result<StockAdjustmentResult, ServiceError> {
        if input.adjustment.is_zero() {
            return Err(ServiceError::ValidationError(
                "adjustment must be non-zero".to_string(),
            ));
        }

        let txn = db::begin(&self.db_pool).await?;

        let current = Ingredient::find_by_id(input.ingredient_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Ingredient {} not found", input.ingredient_id))
            })?;

        let updated = apply_stock_delta(&txn, current.id, input.adjustment, false)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Ingredient {} not found", input.ingredient_id))
            })?;
        let new_stock = updated.current_stock;
        let previous_stock = new_stock - input.adjustment;

        let adjustment = stock_adjustment::ActiveModel {
            id: Set(Uuid::new_v4()),
            ingredient_id: Set(input.ingredient_id),
            adjustment: Set(input.adjustment),
            reason: Set(input.reason.clone()),
            user_id: Set(input.user_id),
            order_id: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        db::commit(txn).await?;

        counter!("tesorito_stock_adjustments", 1);
        info!(
            ingredient = %updated.name,
            adjustment = %input.adjustment,
            %previous_stock,
            %new_stock,
            "Stock adjusted"
        );

        self.event_sender
            .send_or_log(Event::StockAdjusted {
                ingredient_id: updated.id,
                adjustment: input.adjustment,
                new_stock,
            })
            .await;
        if updated.is_low_stock() {
            self.publish_low_stock(&updated, new_stock).await;
        }

        Ok(StockAdjustmentResult {
            ingredient: updated,
            adjustment,
            previous_stock,
            new_stock,
        })
    }

    /// Ingredients at or below their minimum, lowest stock first.
    #[instrument(skip(self))]
    pub async fn low_stock(&self) -> Result<Vec<ingredient::Model>, ServiceError> {
        Ingredient::find()
            .filter(
                Expr::col(ingredient::Column::CurrentStock)
                    .lte(Expr::col(ingredient::Column::MinimumStock)),
            )
            .order_by_asc(ingredient::Column::CurrentStock)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// All ingredients by name, each with its latest adjustments.
    #[instrument(skip(self))]
    pub async fn list_ingredients(&self) -> Result<Vec<IngredientWithAdjustments>, ServiceError> {
        let db = self.db_pool.as_ref();
        let ingredients = Ingredient::find()
            .order_by_asc(ingredient::Column::Name)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut listing = Vec::with_capacity(ingredients.len());
        for ingredient in ingredients {
            let recent_adjustments = StockAdjustment::find()
                .filter(stock_adjustment::Column::IngredientId.eq(ingredient.id))
                .order_by_desc(stock_adjustment::Column::CreatedAt)
                .limit(RECENT_ADJUSTMENTS)
                .all(db)
                .await
                .map_err(ServiceError::db_error)?;
            listing.push(IngredientWithAdjustments {
                is_low_stock: ingredient.is_low_stock(),
                ingredient,
                recent_adjustments,
            });
        }
        Ok(listing)
    }

    pub async fn get_ingredient(&self, id: Uuid) -> Result<ingredient::Model, ServiceError> {
        Ingredient::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Ingredient {} not found", id)))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_ingredient(
        &self,
        input: CreateIngredientInput,
    ) -> Result<ingredient::Model, ServiceError> {
        let ingredient = ingredient::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            unit: Set(input.unit.trim().to_string()),
            current_stock: Set(input.current_stock),
            minimum_stock: Set(input.minimum_stock),
            cost_per_unit: Set(input.cost_per_unit),
            ..Default::default()
        }
        .insert(self.db_pool.as_ref())
        .await
        .map_err(ServiceError::db_error)?;

        info!(ingredient_id = %ingredient.id, "Ingredient created");
        Ok(ingredient)
    }

    /// Updates descriptive fields. Stock itself only moves through adjustments.
    #[instrument(skip(self, input))]
    pub async fn update_ingredient(
        &self,
        id: Uuid,
        input: UpdateIngredientInput,
    ) -> Result<ingredient::Model, ServiceError> {
        let existing = self.get_ingredient(id).await?;
        let mut active: ingredient::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(unit) = input.unit {
            active.unit = Set(unit.trim().to_string());
        }
        if let Some(minimum) = input.minimum_stock {
            active.minimum_stock = Set(minimum);
        }
        if let Some(cost) = input.cost_per_unit {
            active.cost_per_unit = Set(Some(cost));
        }
        active
            .update(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Stock movements for one ingredient, newest first, optionally bounded in time.
    #[instrument(skip(self))]
    pub async fn usage_history(
        &self,
        ingredient_id: Uuid,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<stock_adjustment::Model>, ServiceError> {
        self.get_ingredient(ingredient_id).await?;

        let mut query = StockAdjustment::find()
            .filter(stock_adjustment::Column::IngredientId.eq(ingredient_id));
        if let Some(start) = start {
            query = query.filter(stock_adjustment::Column::CreatedAt.gte(start));
        }
        if let Some(end) = end {
            query = query.filter(stock_adjustment::Column::CreatedAt.lte(end));
        }
        query
            .order_by_desc(stock_adjustment::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    async fn publish_low_stock(&self, ingredient: &ingredient::Model, current_stock: Decimal) {
        self.event_sender
            .send_or_log(Event::LowStock {
                ingredient_id: ingredient.id,
                name: ingredient.name.clone(),
                current_stock,
                minimum_stock: ingredient.minimum_stock,
            })
            .await;
    }
}

/// Loads the recipes behind `items` and aggregates their requirements.
async fn requirements_for_items<C: ConnectionTrait>(
    conn: &C,
    items: &[order_item::Model],
) -> Result<BTreeMap<Uuid, Decimal>, ServiceError> {
    let menu_item_ids: HashSet<Uuid> = items.iter().map(|i| i.menu_item_id).collect();
    if menu_item_ids.is_empty() {
        return Ok(BTreeMap::new());
    }

    let mut recipes: HashMap<Uuid, Vec<RecipeComponent>> = HashMap::new();
    for recipe_item in RecipeItem::find()
        .filter(recipe_item::Column::MenuItemId.is_in(menu_item_ids))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
    {
        recipes
            .entry(recipe_item.menu_item_id)
            .or_default()
            .push(RecipeComponent::from(&recipe_item));
    }

    Ok(aggregate_requirements(items.iter().map(|item| {
        let recipe = recipes
            .get(&item.menu_item_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        (item.quantity, recipe)
    })))
}
