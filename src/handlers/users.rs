use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    entities::{user, UserRole},
    errors::ServiceError,
    services::users::CreateUserInput,
    ApiResponse, AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1, max = 120))]
    pub name: String,

    /// ADMIN, MANAGER, WAITER or CHEF
    #[schema(example = "WAITER")]
    pub role: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    summary = "List staff accounts",
    responses(
        (status = 200, description = "Users, newest first", body = ApiResponse<Vec<user::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<user::Model>>>, ServiceError> {
    let users = state.services.users.list().await?;
    Ok(Json(ApiResponse::success(users)))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    summary = "Create staff account",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse<user::Model>),
        (status = 400, description = "Invalid data or email already registered", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<user::Model>>), ServiceError> {
    request.validate()?;
    let role = UserRole::from_str(request.role.trim())
        .map_err(|_| ServiceError::ValidationError(format!("Unknown role: {}", request.role)))?;

    let user = state
        .services
        .users
        .create(CreateUserInput {
            email: request.email,
            name: request.name,
            role,
            password: request.password,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    summary = "Delete staff account",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Cannot delete your own account", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> Result<StatusCode, ServiceError> {
    state.services.users.delete(id, auth_user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::users::MIN_PASSWORD_LEN;

    #[test]
    fn short_password_is_rejected() {
        let request = CreateUserRequest {
            email: "mesero@tesorito.mx".into(),
            name: "Mesero".into(),
            role: "waiter".into(),
            password: "x".repeat(MIN_PASSWORD_LEN - 1),
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));
    }
}
