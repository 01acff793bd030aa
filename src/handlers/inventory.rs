use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::{validate_non_negative, validate_non_zero};
use crate::{
    auth::AuthUser,
    entities::{ingredient, smart_batch, stock_adjustment},
    errors::ServiceError,
    services::{
        inventory::{
            AdjustStockInput, CreateIngredientInput, DeductionResult, IngredientWithAdjustments,
            StockAdjustmentResult, UpdateIngredientInput,
        },
        smart_batch::BatchYield,
    },
    ApiResponse, AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateIngredientRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,

    /// kg, l, pz...
    #[validate(length(min = 1, max = 20))]
    pub unit: String,

    #[serde(default)]
    #[validate(custom = "validate_non_negative")]
    pub current_stock: Decimal,

    #[serde(default)]
    #[validate(custom = "validate_non_negative")]
    pub minimum_stock: Decimal,

    #[validate(custom = "validate_non_negative")]
    pub cost_per_unit: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateIngredientRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,

    #[validate(custom = "validate_non_negative")]
    pub minimum_stock: Option<Decimal>,

    #[validate(custom = "validate_non_negative")]
    pub cost_per_unit: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AdjustStockRequest {
    pub ingredient_id: Uuid,

    /// Signed change, e.g. `5` after a delivery or `-0.25` for waste
    #[validate(custom = "validate_non_zero")]
    pub adjustment: Decimal,

    #[validate(length(max = 255))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct DeductRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct StartBatchRequest {
    pub ingredient_id: Uuid,

    #[validate(length(max = 120))]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct InventoryListQuery {
    /// Only ingredients at or below their minimum stock
    pub low_stock: Option<bool>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct HistoryQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct IngredientQuery {
    pub ingredient_id: Uuid,
}

/// Listing payload: the full inventory, or only the low-stock part.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum InventoryListing {
    All(Vec<IngredientWithAdjustments>),
    LowStock(Vec<ingredient::Model>),
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory",
    summary = "List ingredients",
    description = "Ingredients by name with their five most recent stock movements; \
                   `low_stock=true` returns only ingredients at or below minimum",
    params(InventoryListQuery),
    responses(
        (status = 200, description = "Inventory returned", body = ApiResponse<InventoryListing>,
            headers(("X-Request-Id" = String, description = "Unique request id for tracing"))
        ),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn list_inventory(
    State(state): State<AppState>,
    Query(query): Query<InventoryListQuery>,
) -> Result<Json<ApiResponse<InventoryListing>>, ServiceError> {
    let inventory = &state.services.inventory;
    let listing = if query.low_stock.unwrap_or(false) {
        InventoryListing::LowStock(inventory.low_stock().await?)
    } else {
        InventoryListing::All(inventory.list_ingredients().await?)
    };
    Ok(Json(ApiResponse::success(listing)))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/low-stock",
    summary = "Low-stock ingredients",
    description = "Ingredients with current stock at or below minimum, lowest stock first",
    responses(
        (status = 200, description = "Low-stock ingredients", body = ApiResponse<Vec<ingredient::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn get_low_stock(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ingredient::Model>>>, ServiceError> {
    let items = state.services.inventory.low_stock().await?;
    Ok(Json(ApiResponse::success(items)))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory",
    summary = "Create ingredient",
    request_body = CreateIngredientRequest,
    responses(
        (status = 201, description = "Ingredient created", body = ApiResponse<ingredient::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn create_ingredient(
    State(state): State<AppState>,
    Json(request): Json<CreateIngredientRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ingredient::Model>>), ServiceError> {
    request.validate()?;
    let ingredient = state
        .services
        .inventory
        .create_ingredient(CreateIngredientInput {
            name: request.name,
            unit: request.unit,
            current_stock: request.current_stock,
            minimum_stock: request.minimum_stock,
            cost_per_unit: request.cost_per_unit,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(ingredient))))
}

#[utoipa::path(
    put,
    path = "/api/v1/inventory/{id}",
    summary = "Update ingredient",
    description = "Updates descriptive fields; stock only changes through adjustments and deductions",
    params(("id" = Uuid, Path, description = "Ingredient ID")),
    request_body = UpdateIngredientRequest,
    responses(
        (status = 200, description = "Ingredient updated", body = ApiResponse<ingredient::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Ingredient not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn update_ingredient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateIngredientRequest>,
) -> Result<Json<ApiResponse<ingredient::Model>>, ServiceError> {
    request.validate()?;
    let ingredient = state
        .services
        .inventory
        .update_ingredient(
            id,
            UpdateIngredientInput {
                name: request.name,
                unit: request.unit,
                minimum_stock: request.minimum_stock,
                cost_per_unit: request.cost_per_unit,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(ingredient)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/inventory/adjust",
    summary = "Adjust stock",
    description = "Adds a signed delta to current stock and records it in the adjustment ledger",
    request_body = AdjustStockRequest,
    responses(
        (status = 200, description = "Stock adjusted", body = ApiResponse<StockAdjustmentResult>),
        (status = 400, description = "Zero or invalid adjustment", body = crate::errors::ErrorResponse),
        (status = 404, description = "Ingredient not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<AdjustStockRequest>,
) -> Result<Json<ApiResponse<StockAdjustmentResult>>, ServiceError> {
    request.validate()?;
    let result = state
        .services
        .inventory
        .adjust_stock(AdjustStockInput {
            ingredient_id: request.ingredient_id,
            adjustment: request.adjustment,
            reason: request.reason,
            user_id: Some(auth_user.user_id),
        })
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/deduct",
    summary = "Deduct inventory for an order",
    description = "Deducts every recipe ingredient the order consumes in one transaction. \
                   Under the strict policy a shortfall rejects the whole deduction and lists \
                   each short ingredient in `details`",
    request_body = DeductRequest,
    responses(
        (status = 200, description = "Inventory deducted", body = ApiResponse<DeductionResult>),
        (status = 400, description = "Insufficient stock, cancelled order or already deducted", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn deduct_for_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<DeductRequest>,
) -> Result<Json<ApiResponse<DeductionResult>>, ServiceError> {
    let result = state
        .services
        .inventory
        .deduct_for_order(request.order_id, Some(auth_user.user_id))
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/{id}/history",
    summary = "Ingredient usage history",
    params(("id" = Uuid, Path, description = "Ingredient ID"), HistoryQuery),
    responses(
        (status = 200, description = "Stock movements, newest first", body = ApiResponse<Vec<stock_adjustment::Model>>),
        (status = 404, description = "Ingredient not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn usage_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<stock_adjustment::Model>>>, ServiceError> {
    let history = state
        .services
        .inventory
        .usage_history(id, query.start, query.end)
        .await?;
    Ok(Json(ApiResponse::success(history)))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/smart-batch",
    summary = "Active smart batch",
    description = "The open batch for an ingredient, or null",
    params(IngredientQuery),
    responses(
        (status = 200, description = "Active batch", body = ApiResponse<Option<smart_batch::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "smart-batches"
)]
pub async fn active_batch(
    State(state): State<AppState>,
    Query(query): Query<IngredientQuery>,
) -> Result<Json<ApiResponse<Option<smart_batch::Model>>>, ServiceError> {
    let batch = state
        .services
        .smart_batches
        .active_batch(query.ingredient_id)
        .await?;
    Ok(Json(ApiResponse::success(batch)))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/smart-batch/history",
    summary = "Smart batch history",
    params(IngredientQuery),
    responses(
        (status = 200, description = "Batches newest first", body = ApiResponse<Vec<smart_batch::Model>>),
    ),
    security(("Bearer" = [])),
    tag = "smart-batches"
)]
pub async fn batch_history(
    State(state): State<AppState>,
    Query(query): Query<IngredientQuery>,
) -> Result<Json<ApiResponse<Vec<smart_batch::Model>>>, ServiceError> {
    let batches = state
        .services
        .smart_batches
        .history(query.ingredient_id)
        .await?;
    Ok(Json(ApiResponse::success(batches)))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/smart-batch",
    summary = "Start smart batch",
    description = "Opens a new batch for the ingredient, closing any batch still open",
    request_body = StartBatchRequest,
    responses(
        (status = 201, description = "Batch started", body = ApiResponse<smart_batch::Model>),
        (status = 404, description = "Ingredient not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "smart-batches"
)]
pub async fn start_batch(
    State(state): State<AppState>,
    Json(request): Json<StartBatchRequest>,
) -> Result<(StatusCode, Json<ApiResponse<smart_batch::Model>>), ServiceError> {
    request.validate()?;
    let batch = state
        .services
        .smart_batches
        .start_batch(request.ingredient_id, request.name)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(batch))))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/smart-batch/{id}/finish",
    summary = "Finish smart batch",
    description = "Closes the batch and counts menu items sold from it while it was open",
    params(("id" = Uuid, Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Batch closed with its yield", body = ApiResponse<BatchYield>),
        (status = 400, description = "Batch already closed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Batch not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "smart-batches"
)]
pub async fn finish_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BatchYield>>, ServiceError> {
    let result = state.services.smart_batches.finish_batch(id).await?;
    Ok(Json(ApiResponse::success(result)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn negative_stock_levels_fail_validation() {
        let request = CreateIngredientRequest {
            name: "Tortilla".into(),
            unit: "pz".into(),
            current_stock: dec!(-1),
            minimum_stock: dec!(10),
            cost_per_unit: Some(dec!(-0.5)),
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("current_stock"));
        assert!(errors.field_errors().contains_key("cost_per_unit"));
    }

    #[test]
    fn zero_adjustment_fails_validation() {
        let request = AdjustStockRequest {
            ingredient_id: Uuid::new_v4(),
            adjustment: Decimal::ZERO,
            reason: None,
        };
        assert!(request.validate().is_err());
    }
}
