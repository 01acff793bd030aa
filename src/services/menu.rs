use crate::{
    db::DbPool,
    entities::{
        menu_item::{self, Entity as MenuItem},
        order_item::{self, Entity as OrderItem},
    },
    errors::ServiceError,
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CreateMenuItemInput {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateMenuItemInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct MenuFilter {
    pub category: Option<String>,
    pub available_only: bool,
}

pub struct MenuService {
    db_pool: Arc<DbPool>,
}

impl MenuService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Menu ordered by name.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: MenuFilter) -> Result<Vec<menu_item::Model>, ServiceError> {
        let mut query = MenuItem::find();
        if let Some(category) = filter.category {
            query = query.filter(menu_item::Column::Category.eq(category));
        }
        if filter.available_only {
            query = query.filter(menu_item::Column::IsAvailable.eq(true));
        }
        query
            .order_by_asc(menu_item::Column::Name)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<menu_item::Model, ServiceError> {
        MenuItem::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Menu item {} not found", id)))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(
        &self,
        input: CreateMenuItemInput,
    ) -> Result<menu_item::Model, ServiceError> {
        let name = required_name(&input.name)?;
        check_price(input.price)?;

        let item = menu_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            description: Set(input.description),
            price: Set(input.price),
            category: Set(input.category),
            image_url: Set(input.image_url),
            is_available: Set(input.is_available.unwrap_or(true)),
            ..Default::default()
        }
        .insert(self.db_pool.as_ref())
        .await
        .map_err(ServiceError::db_error)?;

        info!(menu_item_id = %item.id, price = %item.price, "Menu item created");
        Ok(item)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateMenuItemInput,
    ) -> Result<menu_item::Model, ServiceError> {
        let mut active: menu_item::ActiveModel = self.get(id).await?.into();

        if let Some(name) = input.name {
            active.name = Set(required_name(&name)?);
        }
        if let Some(price) = input.price {
            check_price(price)?;
            active.price = Set(price);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(category) = input.category {
            active.category = Set(Some(category));
        }
        if let Some(image_url) = input.image_url {
            active.image_url = Set(Some(image_url));
        }
        if let Some(is_available) = input.is_available {
            active.is_available = Set(is_available);
        }

        let item = active
            .update(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        info!(menu_item_id = %id, "Menu item updated");
        Ok(item)
    }

    /// Removes a menu item and its recipe. Items already sold are kept for history.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let item = self.get(id).await?;

        let sold = OrderItem::find()
            .filter(order_item::Column::MenuItemId.eq(id))
            .count(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        if sold > 0 {
            return Err(ServiceError::Conflict(format!(
                "{} appears on {} order line(s); mark it unavailable instead",
                item.name, sold
            )));
        }

        item.delete(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        info!(menu_item_id = %id, "Menu item deleted");
        Ok(())
    }
}

fn required_name(name: &str) -> Result<String, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::ValidationError("name is required".to_string()));
    }
    Ok(name.to_string())
}

fn check_price(price: Decimal) -> Result<(), ServiceError> {
    if price < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "price must not be negative".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    #[test]
    fn blank_names_and_negative_prices_are_rejected() {
        assert_matches!(required_name("   "), Err(ServiceError::ValidationError(_)));
        assert_eq!(required_name(" Tacos al pastor ").unwrap(), "Tacos al pastor");
        assert_matches!(check_price(dec!(-1)), Err(ServiceError::ValidationError(_)));
        assert!(check_price(Decimal::ZERO).is_ok());
    }
}
