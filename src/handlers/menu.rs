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

use super::validate_non_negative;
use crate::{
    entities::menu_item,
    errors::ServiceError,
    services::menu::{CreateMenuItemInput, MenuFilter, UpdateMenuItemInput},
    ApiResponse, AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateMenuItemRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    #[validate(custom = "validate_non_negative")]
    #[schema(example = "85.00")]
    pub price: Decimal,

    #[validate(length(max = 60))]
    pub category: Option<String>,

    #[validate(url)]
    pub image_url: Option<String>,

    /// Defaults to true
    pub is_available: Option<bool>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateMenuItemRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    #[validate(custom = "validate_non_negative")]
    pub price: Option<Decimal>,

    #[validate(length(max = 60))]
    pub category: Option<String>,

    #[validate(url)]
    pub image_url: Option<String>,

    pub is_available: Option<bool>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct MenuQuery {
    pub category: Option<String>,
    /// Hide items that are switched off
    pub available: Option<bool>,
}

#[utoipa::path(
    get,
    path = "/api/v1/menu",
    summary = "List menu items",
    params(MenuQuery),
    responses(
        (status = 200, description = "Menu ordered by name", body = ApiResponse<Vec<menu_item::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "menu"
)]
pub async fn list_menu(
    State(state): State<AppState>,
    Query(query): Query<MenuQuery>,
) -> Result<Json<ApiResponse<Vec<menu_item::Model>>>, ServiceError> {
    let items = state
        .services
        .menu
        .list(MenuFilter {
            category: query.category,
            available_only: query.available.unwrap_or(false),
        })
        .await?;
    Ok(Json(ApiResponse::success(items)))
}

#[utoipa::path(
    get,
    path = "/api/v1/menu/{id}",
    summary = "Get menu item",
    params(("id" = Uuid, Path, description = "Menu item ID")),
    responses(
        (status = 200, description = "Menu item", body = ApiResponse<menu_item::Model>),
        (status = 404, description = "Menu item not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "menu"
)]
pub async fn get_menu_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<menu_item::Model>>, ServiceError> {
    let item = state.services.menu.get(id).await?;
    Ok(Json(ApiResponse::success(item)))
}

#[utoipa::path(
    post,
    path = "/api/v1/menu",
    summary = "Create menu item",
    request_body = CreateMenuItemRequest,
    responses(
        (status = 201, description = "Menu item created", body = ApiResponse<menu_item::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "menu"
)]
pub async fn create_menu_item(
    State(state): State<AppState>,
    Json(request): Json<CreateMenuItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<menu_item::Model>>), ServiceError> {
    request.validate()?;
    let item = state
        .services
        .menu
        .create(CreateMenuItemInput {
            name: request.name,
            description: request.description,
            price: request.price,
            category: request.category,
            image_url: request.image_url,
            is_available: request.is_available,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(item))))
}

#[utoipa::path(
    put,
    path = "/api/v1/menu/{id}",
    summary = "Update menu item",
    description = "Price changes apply to new order lines only; existing lines keep the price they were sold at",
    params(("id" = Uuid, Path, description = "Menu item ID")),
    request_body = UpdateMenuItemRequest,
    responses(
        (status = 200, description = "Menu item updated", body = ApiResponse<menu_item::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Menu item not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "menu"
)]
pub async fn update_menu_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateMenuItemRequest>,
) -> Result<Json<ApiResponse<menu_item::Model>>, ServiceError> {
    request.validate()?;
    let item = state
        .services
        .menu
        .update(
            id,
            UpdateMenuItemInput {
                name: request.name,
                description: request.description,
                price: request.price,
                category: request.category,
                image_url: request.image_url,
                is_available: request.is_available,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(item)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/menu/{id}",
    summary = "Delete menu item",
    description = "Items that already appear on orders cannot be deleted; switch them off instead",
    params(("id" = Uuid, Path, description = "Menu item ID")),
    responses(
        (status = 204, description = "Menu item deleted"),
        (status = 404, description = "Menu item not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Menu item has sales", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "menu"
)]
pub async fn delete_menu_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.menu.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
