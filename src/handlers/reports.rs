use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    errors::ServiceError,
    services::reports::{SalesReport, DEFAULT_REPORT_DAYS},
    ApiResponse, AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ReportQuery {
    /// Window length in days, 1 to 366 (default 7)
    pub days: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/reports",
    summary = "Sales report",
    description = "Delivered and paid orders created in the last `days` days: totals, \
                   sales by day and by source, top items, inventory value and customer activity",
    params(ReportQuery),
    responses(
        (status = 200, description = "Report generated", body = ApiResponse<SalesReport>),
        (status = 400, description = "days out of range", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "reports"
)]
pub async fn sales_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ApiResponse<SalesReport>>, ServiceError> {
    let report = state
        .services
        .reports
        .sales_report(query.days.unwrap_or(DEFAULT_REPORT_DAYS))
        .await?;
    Ok(Json(ApiResponse::success(report)))
}
