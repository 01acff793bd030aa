use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    entities::OrderStatus,
    errors::ServiceError,
    services::orders::{CreateOrderInput, OrderDetails, OrderLineInput, StatusChange},
    ApiResponse, AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct OrderLineRequest {
    pub menu_item_id: Uuid,

    #[validate(range(min = 1, max = 999))]
    pub quantity: i32,

    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

impl From<OrderLineRequest> for OrderLineInput {
    fn from(line: OrderLineRequest) -> Self {
        Self {
            menu_item_id: line.menu_item_id,
            quantity: line.quantity,
            notes: line.notes,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateOrderRequest {
    pub customer_id: Option<Uuid>,

    /// Counter, table, delivery platform...
    #[validate(length(min = 1, max = 50))]
    pub source: String,

    #[validate(length(max = 50))]
    pub table_label: Option<String>,

    #[validate(length(max = 500))]
    pub notes: Option<String>,

    #[validate(length(min = 1))]
    #[validate]
    pub items: Vec<OrderLineRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AddItemsRequest {
    #[validate(length(min = 1))]
    #[validate]
    pub items: Vec<OrderLineRequest>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusRequest {
    #[schema(example = "PREPARING")]
    pub status: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct OrderListQuery {
    /// Comma-separated statuses, e.g. `PENDING,PREPARING`
    pub status: Option<String>,
}

fn parse_statuses(raw: Option<&str>) -> Result<Vec<OrderStatus>, ServiceError> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_status)
        .collect()
}

fn parse_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    OrderStatus::from_str(raw.trim())
        .map_err(|_| ServiceError::InvalidStatus(format!("Unknown order status: {}", raw)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    description = "Orders newest first with their items and customer, optionally filtered by status",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders retrieved successfully", body = ApiResponse<Vec<OrderDetails>>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Unknown status in filter", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<ApiResponse<Vec<OrderDetails>>>, ServiceError> {
    let statuses = parse_statuses(query.status.as_deref())?;
    let orders = state.services.orders.list_orders(&statuses).await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order retrieved successfully", body = ApiResponse<OrderDetails>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderDetails>>, ServiceError> {
    let order = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/by-number/{order_number}",
    summary = "Get order by number",
    description = "Retrieve an order by its display number (e.g., 007)",
    params(("order_number" = String, Path, description = "Display order number")),
    responses(
        (status = 200, description = "Order retrieved successfully", body = ApiResponse<OrderDetails>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn get_order_by_number(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Json<ApiResponse<OrderDetails>>, ServiceError> {
    let order = state.services.orders.get_by_number(&order_number).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    description = "Price the lines at current menu prices and open a new PENDING order",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = ApiResponse<OrderDetails>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Menu item or customer not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetails>>), ServiceError> {
    request.validate()?;

    let order = state
        .services
        .orders
        .create_order(CreateOrderInput {
            customer_id: request.customer_id,
            source: request.source,
            table_label: request.table_label,
            notes: request.notes,
            items: request.items.into_iter().map(Into::into).collect(),
        })
        .await?;

    let message = format!("Order #{} created", order.order.order_number);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(order).with_message(message)),
    ))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/items",
    summary = "Add items to order",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = AddItemsRequest,
    responses(
        (status = 200, description = "Items added", body = ApiResponse<OrderDetails>),
        (status = 400, description = "Order is closed or request invalid", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or menu item not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn add_order_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddItemsRequest>,
) -> Result<Json<ApiResponse<OrderDetails>>, ServiceError> {
    request.validate()?;
    let order = state
        .services
        .orders
        .add_items(id, request.items.into_iter().map(Into::into).collect())
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/status",
    summary = "Update order status",
    description = "Moving an order to DELIVERED or PAID deducts its recipe ingredients from stock; \
                   deduction problems are reported in `inventory_errors` without undoing the status change",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<StatusChange>),
        (status = 400, description = "Unknown status or order cancelled", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<StatusChange>>, ServiceError> {
    let status = parse_status(&request.status)?;
    let change = state
        .services
        .orders
        .update_status(id, status, Some(auth_user.user_id))
        .await?;
    Ok(Json(ApiResponse::success(change)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn status_filter_accepts_comma_separated_values() {
        let parsed = parse_statuses(Some("PENDING, preparing,")).unwrap();
        assert_eq!(parsed, vec![OrderStatus::Pending, OrderStatus::Preparing]);
        assert!(parse_statuses(None).unwrap().is_empty());
        assert_matches!(
            parse_statuses(Some("PENDING,LOST")),
            Err(ServiceError::InvalidStatus(_))
        );
    }

    #[test]
    fn create_request_requires_items_and_source() {
        let request = CreateOrderRequest {
            customer_id: None,
            source: String::new(),
            table_label: None,
            notes: None,
            items: vec![],
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("source"));
        assert!(fields.contains_key("items"));
    }
}
