use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::validate_positive;
use crate::{
    entities::recipe_item, errors::ServiceError, services::recipes::RecipeLine, ApiResponse,
    AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateRecipeItemRequest {
    pub menu_item_id: Uuid,
    pub ingredient_id: Uuid,

    /// Amount of the ingredient consumed by one unit of the menu item
    #[validate(custom = "validate_positive")]
    #[schema(example = "0.150")]
    pub quantity_required: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateRecipeItemRequest {
    #[validate(custom = "validate_positive")]
    pub quantity_required: Decimal,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RecipeQuery {
    pub menu_item_id: Uuid,
}

#[utoipa::path(
    get,
    path = "/api/v1/recipes",
    summary = "Recipe of a menu item",
    params(RecipeQuery),
    responses(
        (status = 200, description = "Recipe lines with their ingredients", body = ApiResponse<Vec<RecipeLine>>),
        (status = 400, description = "Missing menu_item_id", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "recipes"
)]
pub async fn get_recipe(
    State(state): State<AppState>,
    Query(query): Query<RecipeQuery>,
) -> Result<Json<ApiResponse<Vec<RecipeLine>>>, ServiceError> {
    let lines = state.services.recipes.for_menu_item(query.menu_item_id).await?;
    Ok(Json(ApiResponse::success(lines)))
}

#[utoipa::path(
    post,
    path = "/api/v1/recipes",
    summary = "Add recipe line",
    request_body = CreateRecipeItemRequest,
    responses(
        (status = 201, description = "Recipe line added", body = ApiResponse<recipe_item::Model>),
        (status = 400, description = "Quantity must be positive", body = crate::errors::ErrorResponse),
        (status = 404, description = "Menu item or ingredient not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "recipes"
)]
pub async fn add_recipe_item(
    State(state): State<AppState>,
    Json(request): Json<CreateRecipeItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<recipe_item::Model>>), ServiceError> {
    request.validate()?;
    let item = state
        .services
        .recipes
        .add(
            request.menu_item_id,
            request.ingredient_id,
            request.quantity_required,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(item))))
}

#[utoipa::path(
    put,
    path = "/api/v1/recipes/{id}",
    summary = "Change recipe quantity",
    params(("id" = Uuid, Path, description = "Recipe line ID")),
    request_body = UpdateRecipeItemRequest,
    responses(
        (status = 200, description = "Recipe line updated", body = ApiResponse<recipe_item::Model>),
        (status = 400, description = "Quantity must be positive", body = crate::errors::ErrorResponse),
        (status = 404, description = "Recipe line not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "recipes"
)]
pub async fn update_recipe_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRecipeItemRequest>,
) -> Result<Json<ApiResponse<recipe_item::Model>>, ServiceError> {
    request.validate()?;
    let item = state
        .services
        .recipes
        .update_quantity(id, request.quantity_required)
        .await?;
    Ok(Json(ApiResponse::success(item)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/recipes/{id}",
    summary = "Remove recipe line",
    params(("id" = Uuid, Path, description = "Recipe line ID")),
    responses(
        (status = 204, description = "Recipe line removed"),
        (status = 404, description = "Recipe line not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "recipes"
)]
pub async fn delete_recipe_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.recipes.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
