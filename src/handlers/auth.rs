use axum::{extract::State, response::Json};
use tracing::{info, warn};

use crate::{
    auth::{AuthUser, LoginCredentials, TokenResponse},
    errors::ServiceError,
    services::users::UserService,
    ApiResponse, AppState,
};

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    summary = "Sign in",
    description = "Exchanges email and password for a bearer token carrying the user's role and permissions",
    request_body = LoginCredentials,
    responses(
        (status = 200, description = "Signed in", body = ApiResponse<TokenResponse>),
        (status = 400, description = "Email or password missing", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid email or password", body = crate::errors::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<LoginCredentials>,
) -> Result<Json<ApiResponse<TokenResponse>>, ServiceError> {
    if credentials.email.trim().is_empty() || credentials.password.is_empty() {
        return Err(ServiceError::ValidationError(
            "Email and password are required".to_string(),
        ));
    }

    let user = authenticate(&state.services.users, &credentials).await?;
    let token = state.auth.issue_token(&user)?;
    info!(user_id = %user.id, role = %user.role, "User signed in");
    Ok(Json(ApiResponse::success(token)))
}

async fn authenticate(
    users: &UserService,
    credentials: &LoginCredentials,
) -> Result<crate::entities::user::Model, ServiceError> {
    users
        .authenticate(&credentials.email, &credentials.password)
        .await
        .map_err(|err| {
            if matches!(err, ServiceError::Unauthorized(_)) {
                warn!(email = %credentials.email, "Failed sign-in attempt");
            }
            err
        })
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    summary = "Current user",
    description = "The identity and permissions carried by the presented token",
    responses(
        (status = 200, description = "Token identity", body = ApiResponse<AuthUser>),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn me(auth_user: AuthUser) -> Json<ApiResponse<AuthUser>> {
    Json(ApiResponse::success(auth_user))
}
