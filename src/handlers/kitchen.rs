use axum::{extract::State, response::Json};

use crate::{
    errors::ServiceError,
    services::kitchen::{BatchGroup, KitchenBoard},
    ApiResponse, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/kitchen/board",
    summary = "Kitchen board",
    description = "Active orders oldest first in PENDING, PREPARING and READY columns. \
                   Tickets waiting at least the configured alert time are flagged overdue",
    responses(
        (status = 200, description = "Board", body = ApiResponse<KitchenBoard>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "kitchen"
)]
pub async fn board(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<KitchenBoard>>, ServiceError> {
    let board = state.services.kitchen.board().await?;
    Ok(Json(ApiResponse::success(board)))
}

#[utoipa::path(
    get,
    path = "/api/v1/kitchen/batching",
    summary = "Batch cooking suggestions",
    description = "Identical menu items summed across active orders, largest first",
    responses(
        (status = 200, description = "Groups", body = ApiResponse<Vec<BatchGroup>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "kitchen"
)]
pub async fn batching(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<BatchGroup>>>, ServiceError> {
    let groups = state.services.kitchen.batching().await?;
    Ok(Json(ApiResponse::success(groups)))
}
