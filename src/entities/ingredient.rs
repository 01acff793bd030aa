use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A stocked raw material, measured in `unit` (kg, l, pz, ...).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "ingredients")]
#[schema(as = Ingredient)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub unit: String,
    pub current_stock: Decimal,
    pub minimum_stock: Decimal,
    #[sea_orm(nullable)]
    pub cost_per_unit: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.minimum_stock
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::recipe_item::Entity")]
    RecipeItems,
    #[sea_orm(has_many = "super::stock_adjustment::Entity")]
    StockAdjustments,
    #[sea_orm(has_many = "super::smart_batch::Entity")]
    SmartBatches,
}

impl Related<super::recipe_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecipeItems.def()
    }
}

impl Related<super::stock_adjustment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockAdjustments.def()
    }
}

impl Related<super::smart_batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SmartBatches.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }
        active_model.updated_at = Set(now);

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ingredient(current: Decimal, minimum: Decimal) -> Model {
        Model {
            id: Uuid::new_v4(),
            name: "Queso Oaxaca".into(),
            unit: "kg".into(),
            current_stock: current,
            minimum_stock: minimum,
            cost_per_unit: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn stock_at_threshold_counts_as_low() {
        assert!(ingredient(dec!(2), dec!(2)).is_low_stock());
        assert!(ingredient(dec!(-0.5), dec!(0)).is_low_stock());
        assert!(!ingredient(dec!(2.01), dec!(2)).is_low_stock());
    }
}
