use crate::{
    db::{self, DbPool},
    entities::{
        ingredient::Entity as Ingredient,
        menu_item::{self, Entity as MenuItem},
        order::{self, Entity as Order, OrderStatus},
        order_item::{self, Entity as OrderItem},
        recipe_item::{self, Entity as RecipeItem},
        smart_batch::{self, Entity as SmartBatch},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

pub const DEFAULT_BATCH_NAME: &str = "Topper Standard";

/// Outcome of closing a batch: units produced per menu item.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchYield {
    pub batch: smart_batch::Model,
    pub summary: BTreeMap<String, i64>,
    pub total_items: i64,
}

/// Counts units sold per menu item name.
///
/// `lines` yields `(menu_item_id, quantity)`; only ids present in
/// `qualifying` are counted.
pub fn summarize_yield<I>(lines: I, qualifying: &HashMap<Uuid, String>) -> BTreeMap<String, i64>
where
    I: IntoIterator<Item = (Uuid, i32)>,
{
    let mut summary: BTreeMap<String, i64> = BTreeMap::new();
    for (menu_item_id, quantity) in lines {
        if let Some(name) = qualifying.get(&menu_item_id) {
            *summary.entry(name.clone()).or_default() += i64::from(quantity);
        }
    }
    summary
}

/// Tracks how many menu items one opened container of an ingredient produced.
pub struct SmartBatchService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl SmartBatchService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// The open batch for an ingredient, if any.
    #[instrument(skip(self))]
    pub async fn active_batch(
        &self,
        ingredient_id: Uuid,
    ) -> Result<Option<smart_batch::Model>, ServiceError> {
        SmartBatch::find()
            .filter(smart_batch::Column::IngredientId.eq(ingredient_id))
            .filter(smart_batch::Column::IsActive.eq(true))
            .order_by_desc(smart_batch::Column::StartedAt)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Every batch recorded for an ingredient, newest first.
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        ingredient_id: Uuid,
    ) -> Result<Vec<smart_batch::Model>, ServiceError> {
        SmartBatch::find()
            .filter(smart_batch::Column::IngredientId.eq(ingredient_id))
            .order_by_desc(smart_batch::Column::StartedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Opens a batch, closing any batch still open for the same ingredient.
    #[instrument(skip(self))]
    pub async fn start_batch(
        &self,
        ingredient_id: Uuid,
        name: Option<String>,
    ) -> Result<smart_batch::Model, ServiceError> {
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_BATCH_NAME.to_string());

        let txn = db::begin(&self.db_pool).await?;

        Ingredient::find_by_id(ingredient_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Ingredient {} not found", ingredient_id)))?;

        // one instant closes the old window and opens the new one
        let now = Utc::now();

        let closed = SmartBatch::update_many()
            .col_expr(smart_batch::Column::IsActive, Expr::value(false))
            .col_expr(smart_batch::Column::EndedAt, Expr::value(Some(now)))
            .filter(smart_batch::Column::IngredientId.eq(ingredient_id))
            .filter(smart_batch::Column::IsActive.eq(true))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let batch = smart_batch::ActiveModel {
            id: Set(Uuid::new_v4()),
            ingredient_id: Set(ingredient_id),
            name: Set(name),
            started_at: Set(now),
            ended_at: Set(None),
            final_yield: Set(None),
            is_active: Set(true),
            created_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        db::commit(txn).await?;

        info!(
            batch_id = %batch.id,
            %ingredient_id,
            closed_batches = closed.rows_affected,
            "Smart batch started"
        );
        self.event_sender
            .send_or_log(Event::SmartBatchStarted {
                batch_id: batch.id,
                ingredient_id,
            })
            .await;

        Ok(batch)
    }

    /// Closes a batch and records how many items each menu item consumed from it.
    #[instrument(skip(self))]
    pub async fn finish_batch(&self, batch_id: Uuid) -> Result<BatchYield, ServiceError> {
        let txn = db::begin(&self.db_pool).await?;

        let batch = SmartBatch::find_by_id(batch_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Batch {} not found", batch_id)))?;

        if !batch.is_active {
            return Err(ServiceError::InvalidOperation(
                "Batch is already closed".to_string(),
            ));
        }

        let ended_at = Utc::now();

        // Menu items whose recipe uses the batch ingredient
        let qualifying_ids: HashSet<Uuid> = RecipeItem::find()
            .filter(recipe_item::Column::IngredientId.eq(batch.ingredient_id))
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|r| r.menu_item_id)
            .collect();

        let mut summary = BTreeMap::new();
        if !qualifying_ids.is_empty() {
            let qualifying: HashMap<Uuid, String> = MenuItem::find()
                .filter(menu_item::Column::Id.is_in(qualifying_ids.iter().copied()))
                .all(&txn)
                .await
                .map_err(ServiceError::db_error)?
                .into_iter()
                .map(|m| (m.id, m.name))
                .collect();

            let order_ids: Vec<Uuid> = Order::find()
                .filter(order::Column::CreatedAt.gte(batch.started_at))
                .filter(order::Column::CreatedAt.lte(ended_at))
                .filter(order::Column::Status.ne(OrderStatus::Cancelled))
                .all(&txn)
                .await
                .map_err(ServiceError::db_error)?
                .into_iter()
                .map(|o| o.id)
                .collect();

            if !order_ids.is_empty() {
                let lines = OrderItem::find()
                    .filter(order_item::Column::OrderId.is_in(order_ids))
                    .filter(order_item::Column::MenuItemId.is_in(qualifying_ids))
                    .all(&txn)
                    .await
                    .map_err(ServiceError::db_error)?;
                summary = summarize_yield(
                    lines.iter().map(|l| (l.menu_item_id, l.quantity)),
                    &qualifying,
                );
            }
        }
        let total_items: i64 = summary.values().sum();

        let mut active: smart_batch::ActiveModel = batch.into();
        active.ended_at = Set(Some(ended_at));
        active.is_active = Set(false);
        active.final_yield = Set(Some(serde_json::to_value(&summary)?));
        let batch = active.update(&txn).await.map_err(ServiceError::db_error)?;

        db::commit(txn).await?;

        info!(%batch_id, total_items, "Smart batch finished");
        self.event_sender
            .send_or_log(Event::SmartBatchFinished {
                batch_id,
                total_items,
                ended_at,
            })
            .await;

        Ok(BatchYield {
            batch,
            summary,
            total_items,
        })
    }
}
