use crate::{
    db::DbPool,
    entities::customer::{self, Entity as Customer},
    errors::ServiceError,
};
use chrono::{DateTime, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, ModelTrait, QueryOrder, Set};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

lazy_static! {
    pub static ref EMAIL_PATTERN: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern");
    pub static ref PHONE_PATTERN: Regex =
        Regex::new(r"^[0-9+\-()\s]{7,20}$").expect("valid phone pattern");
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn parse_birthday(raw: &str) -> Result<NaiveDate, ServiceError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map_err(|_| {
            ServiceError::ValidationError(format!(
                "birthday '{}' must be YYYY-MM-DD or an RFC 3339 timestamp",
                raw
            ))
        })
}

#[derive(Debug, Clone, Default)]
pub struct CustomerInput {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub birthday: Option<String>,
}

#[derive(Debug)]
struct CleanContact {
    phone: Option<String>,
    email: Option<String>,
    birthday: Option<NaiveDate>,
}

fn clean_contact(input: &CustomerInput) -> Result<CleanContact, ServiceError> {
    let phone = non_blank(input.phone.as_deref());
    if let Some(phone) = &phone {
        if !PHONE_PATTERN.is_match(phone) {
            return Err(ServiceError::ValidationError(format!(
                "phone '{}' is not a valid phone number",
                phone
            )));
        }
    }

    let email = non_blank(input.email.as_deref()).map(|e| e.to_lowercase());
    if let Some(email) = &email {
        if !EMAIL_PATTERN.is_match(email) {
            return Err(ServiceError::ValidationError(format!(
                "email '{}' is not a valid address",
                email
            )));
        }
    }

    let birthday = non_blank(input.birthday.as_deref())
        .map(|b| parse_birthday(&b))
        .transpose()?;

    Ok(CleanContact {
        phone,
        email,
        birthday,
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Customer records and loyalty balances.
pub struct CustomerService {
    db_pool: Arc<DbPool>,
}

impl CustomerService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<customer::Model>, ServiceError> {
        Customer::find()
            .order_by_desc(customer::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<customer::Model, ServiceError> {
        Customer::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", id)))
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CustomerInput) -> Result<customer::Model, ServiceError> {
        let name = non_blank(input.name.as_deref())
            .ok_or_else(|| ServiceError::ValidationError("name is required".to_string()))?;
        let contact = clean_contact(&input)?;

        let customer = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            phone: Set(contact.phone),
            email: Set(contact.email),
            birthday: Set(contact.birthday),
            loyalty_points: Set(0),
            total_spend: Set(Decimal::ZERO),
            ..Default::default()
        }
        .insert(self.db_pool.as_ref())
        .await
        .map_err(ServiceError::db_error)?;

        info!(customer_id = %customer.id, "Customer created");
        Ok(customer)
    }

    /// Updates contact details; loyalty and spend only change through orders.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: CustomerInput,
    ) -> Result<customer::Model, ServiceError> {
        let existing = self.get(id).await?;
        let contact = clean_contact(&input)?;
        let mut active: customer::ActiveModel = existing.into();

        if let Some(name) = input.name.as_deref() {
            let name = non_blank(Some(name))
                .ok_or_else(|| ServiceError::ValidationError("name is required".to_string()))?;
            active.name = Set(name);
        }
        if input.phone.is_some() {
            active.phone = Set(contact.phone);
        }
        if input.email.is_some() {
            active.email = Set(contact.email);
        }
        if input.birthday.is_some() {
            active.birthday = Set(contact.birthday);
        }

        active
            .update(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get(id)
            .await?
            .delete(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        info!(customer_id = %id, "Customer deleted");
        Ok(())
    }
}
