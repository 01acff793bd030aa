use crate::{
    db::DbPool,
    entities::{
        ingredient::{self, Entity as Ingredient},
        menu_item::Entity as MenuItem,
        recipe_item::{self, Entity as RecipeItem},
    },
    errors::ServiceError,
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// A recipe line together with the ingredient it consumes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeLine {
    #[serde(flatten)]
    pub recipe_item: recipe_item::Model,
    pub ingredient: Option<ingredient::Model>,
}

pub struct RecipeService {
    db_pool: Arc<DbPool>,
}

impl RecipeService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Recipe of one menu item.
    #[instrument(skip(self))]
    pub async fn for_menu_item(&self, menu_item_id: Uuid) -> Result<Vec<RecipeLine>, ServiceError> {
        let items = RecipeItem::find()
            .filter(recipe_item::Column::MenuItemId.eq(menu_item_id))
            .order_by_asc(recipe_item::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let ingredients: HashMap<_, _> = Ingredient::find()
            .filter(ingredient::Column::Id.is_in(items.iter().map(|i| i.ingredient_id)))
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|i| (i.id, i))
            .collect();

        Ok(items
            .into_iter()
            .map(|recipe_item| RecipeLine {
                ingredient: ingredients.get(&recipe_item.ingredient_id).cloned(),
                recipe_item,
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn add(
        &self,
        menu_item_id: Uuid,
        ingredient_id: Uuid,
        quantity_required: Decimal,
    ) -> Result<recipe_item::Model, ServiceError> {
        check_quantity(quantity_required)?;

        MenuItem::find_by_id(menu_item_id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Menu item {} not found", menu_item_id)))?;
        Ingredient::find_by_id(ingredient_id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Ingredient {} not found", ingredient_id))
            })?;

        let item = recipe_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            menu_item_id: Set(menu_item_id),
            ingredient_id: Set(ingredient_id),
            quantity_required: Set(quantity_required),
            created_at: Set(chrono::Utc::now()),
        }
        .insert(self.db_pool.as_ref())
        .await
        .map_err(ServiceError::db_error)?;

        info!(recipe_item_id = %item.id, %menu_item_id, %ingredient_id, "Recipe line added");
        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        id: Uuid,
        quantity_required: Decimal,
    ) -> Result<recipe_item::Model, ServiceError> {
        check_quantity(quantity_required)?;
        let mut active: recipe_item::ActiveModel = self.find(id).await?.into();
        active.quantity_required = Set(quantity_required);
        active
            .update(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, id: Uuid) -> Result<(), ServiceError> {
        self.find(id)
            .await?
            .delete(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        info!(recipe_item_id = %id, "Recipe line removed");
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<recipe_item::Model, ServiceError> {
        RecipeItem::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Recipe line {} not found", id)))
    }
}

fn check_quantity(quantity_required: Decimal) -> Result<(), ServiceError> {
    if quantity_required <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "quantity_required must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(0), false)]
    #[case(dec!(-0.1), false)]
    #[case(dec!(0.001), true)]
    #[case(dec!(2), true)]
    fn recipe_quantities_must_be_positive(#[case] quantity: Decimal, #[case] ok: bool) {
        assert_eq!(check_quantity(quantity).is_ok(), ok);
    }
}
