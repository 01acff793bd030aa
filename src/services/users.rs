use crate::{
    db::DbPool,
    entities::user::{self, Entity as User, UserRole},
    errors::ServiceError,
    services::customers::EMAIL_PATTERN,
};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tokio::task;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub async fn hash_password(password: &str) -> Result<String, ServiceError> {
    let password = password.to_string();
    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ServiceError::HashError(e.to_string()))
    })
    .await
    .map_err(|e| ServiceError::HashError(e.to_string()))?
}

pub async fn verify_password(password: &str, hash: &str) -> Result<bool, ServiceError> {
    let password = password.to_string();
    let hash = hash.to_string();
    task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash).map_err(|e| ServiceError::HashError(e.to_string()))?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(ServiceError::HashError(e.to_string())),
        }
    })
    .await
    .map_err(|e| ServiceError::HashError(e.to_string()))?
}

#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub password: String,
}

fn validate_new_user(input: &CreateUserInput) -> Result<(String, String), ServiceError> {
    let email = input.email.trim().to_lowercase();
    if !EMAIL_PATTERN.is_match(&email) {
        return Err(ServiceError::ValidationError(
            "a valid email is required".to_string(),
        ));
    }
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(ServiceError::ValidationError("name is required".to_string()));
    }
    if input.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::ValidationError(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok((email, name))
}

/// Staff accounts and credential checks.
pub struct UserService {
    db_pool: Arc<DbPool>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<user::Model>, ServiceError> {
        User::find()
            .order_by_desc(user::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self, input), fields(email = %input.email, role = %input.role))]
    pub async fn create(&self, input: CreateUserInput) -> Result<user::Model, ServiceError> {
        let (email, name) = validate_new_user(&input)?;

        let taken = User::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        if taken.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "A user with email {} already exists",
                email
            )));
        }

        let password_hash = hash_password(&input.password).await?;

        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            name: Set(name),
            role: Set(input.role),
            password_hash: Set(password_hash),
            ..Default::default()
        }
        .insert(self.db_pool.as_ref())
        .await
        .map_err(ServiceError::db_error)?;

        info!(user_id = %user.id, role = %user.role, "User created");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid, acting_user: Uuid) -> Result<(), ServiceError> {
        if id == acting_user {
            return Err(ServiceError::InvalidOperation(
                "You cannot delete your own account".to_string(),
            ));
        }
        let user = User::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))?;

        user.delete(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// Checks credentials; unknown email and wrong password look the same to the caller.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<user::Model, ServiceError> {
        let email = email.trim().to_lowercase();
        let user = User::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let Some(user) = user else {
            warn!(%email, "Login attempt for unknown user");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        };

        if !verify_password(password, &user.password_hash).await? {
            warn!(user_id = %user.id, "Login attempt with wrong password");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
        Ok(user)
    }

    /// Creates an ADMIN account when the user table is empty.
    #[instrument(skip(self, password))]
    pub async fn ensure_admin(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<user::Model>, ServiceError> {
        let existing = User::find()
            .count(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        if existing > 0 {
            return Ok(None);
        }
        let admin = self
            .create(CreateUserInput {
                email: email.to_string(),
                name: "Administrator".to_string(),
                role: UserRole::Admin,
                password: password.to_string(),
            })
            .await?;
        info!(user_id = %admin.id, "Bootstrap administrator created");
        Ok(Some(admin))
    }
}
