use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::{validate_non_negative, validate_positive};
use crate::{
    auth::AuthUser,
    entities::{payment, PaymentMethod},
    errors::ServiceError,
    services::payments::{PaymentReceipt, RecordPaymentInput},
    ApiResponse, AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RecordPaymentRequest {
    pub order_id: Uuid,

    #[schema(example = "CASH")]
    pub method: PaymentMethod,

    #[validate(custom = "validate_positive")]
    pub amount: Decimal,

    /// Cash handed over by the customer
    #[validate(custom = "validate_non_negative")]
    pub received_amount: Option<Decimal>,

    /// Defaults to `received_amount - amount`
    #[validate(custom = "validate_non_negative")]
    pub change: Option<Decimal>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PaymentQuery {
    pub order_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/api/v1/payments",
    summary = "Record payment",
    description = "Stores the payment and marks the order PAID, which deducts its \
                   ingredients when automatic deduction is enabled",
    request_body = RecordPaymentRequest,
    responses(
        (status = 201, description = "Payment recorded", body = ApiResponse<PaymentReceipt>),
        (status = 400, description = "Invalid amount, or order cancelled or already paid", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "payments"
)]
pub async fn record_payment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentReceipt>>), ServiceError> {
    request.validate()?;
    let receipt = state
        .services
        .payments
        .record(
            RecordPaymentInput {
                order_id: request.order_id,
                method: request.method,
                amount: request.amount,
                received_amount: request.received_amount,
                change: request.change,
            },
            Some(auth_user.user_id),
        )
        .await?;
    let message = format!("Order #{} paid", receipt.order.order_number);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(receipt).with_message(message)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/payments",
    summary = "Payments of an order",
    params(PaymentQuery),
    responses(
        (status = 200, description = "Payments, oldest first", body = ApiResponse<Vec<payment::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "payments"
)]
pub async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<PaymentQuery>,
) -> Result<Json<ApiResponse<Vec<payment::Model>>>, ServiceError> {
    let payments = state.services.payments.for_order(query.order_id).await?;
    Ok(Json(ApiResponse::success(payments)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_is_read_in_upper_case() {
        let request: RecordPaymentRequest = serde_json::from_str(&format!(
            r#"{{"order_id":"{}","method":"CARD","amount":"120.00"}}"#,
            Uuid::new_v4()
        ))
        .unwrap();
        assert_eq!(request.method, PaymentMethod::Card);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn zero_amount_is_rejected() {
        let request = RecordPaymentRequest {
            order_id: Uuid::new_v4(),
            method: PaymentMethod::Cash,
            amount: Decimal::ZERO,
            received_amount: None,
            change: None,
        };
        assert!(request.validate().is_err());
    }
}
