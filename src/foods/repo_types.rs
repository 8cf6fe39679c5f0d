use std::hash::{Hash, Hasher};

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::repository::Entity;
use crate::validation::{validate_macro, validate_name, validate_non_negative, Validated};

/// Macro-nutrients in grams.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Nutrition {
    protein: f32,
    fat: f32,
    carbohydrates: f32,
}

impl Nutrition {
    pub fn new(protein: f32, fat: f32, carbohydrates: f32) -> Validated<Self> {
        validate_macro("protein", protein)?;
        validate_macro("fat", fat)?;
        validate_macro("carbohydrates", carbohydrates)?;
        Ok(Self {
            protein,
            fat,
            carbohydrates,
        })
    }

    pub fn protein(&self) -> f32 {
        self.protein
    }

    pub fn fat(&self) -> f32 {
        self.fat
    }

    pub fn carbohydrates(&self) -> f32 {
        self.carbohydrates
    }

    fn bits(&self) -> (u32, u32, u32) {
        (
            self.protein.to_bits(),
            self.fat.to_bits(),
            self.carbohydrates.to_bits(),
        )
    }
}

impl PartialEq for Nutrition {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Nutrition {}

impl Hash for Nutrition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Food {
    id: Option<Uuid>,
    name: String,
    details: String,
    nutrition: Nutrition,
    calories: f64,
}

impl Food {
    pub fn new(
        name: &str,
        details: &str,
        nutrition: Nutrition,
        calories: f64,
    ) -> Validated<Self> {
        validate_name("name", name)?;
        validate_non_negative("calories", calories)?;
        Ok(Self {
            id: None,
            name: name.trim().to_string(),
            details: details.trim().to_string(),
            nutrition,
            calories,
        })
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn nutrition(&self) -> Nutrition {
        self.nutrition
    }

    pub fn calories(&self) -> f64 {
        self.calories
    }

    pub fn set_name(&mut self, name: &str) -> Validated {
        validate_name("name", name)?;
        self.name = name.trim().to_string();
        Ok(())
    }

    pub fn set_details(&mut self, details: &str) {
        self.details = details.trim().to_string();
    }

    pub fn set_nutrition(&mut self, nutrition: Nutrition) {
        self.nutrition = nutrition;
    }

    pub fn set_calories(&mut self, calories: f64) -> Validated {
        validate_non_negative("calories", calories)?;
        self.calories = calories;
        Ok(())
    }

    pub fn validate(&self) -> Validated {
        validate_name("name", &self.name)?;
        validate_non_negative("calories", self.calories)?;
        validate_macro("protein", self.nutrition.protein)?;
        validate_macro("fat", self.nutrition.fat)?;
        validate_macro("carbohydrates", self.nutrition.carbohydrates)?;
        Ok(())
    }

    pub(crate) fn assign_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }
}

impl Entity for Food {
    const NAME: &'static str = "Food";

    fn id(&self) -> Option<Uuid> {
        self.id
    }
}

impl PartialEq for Food {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.details == other.details
            && self.nutrition == other.nutrition
            && self.calories.to_bits() == other.calories.to_bits()
    }
}

impl Eq for Food {}

impl Hash for Food {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.name.hash(state);
        self.details.hash(state);
        self.nutrition.hash(state);
        self.calories.to_bits().hash(state);
    }
}

/// Food record in the database.
#[derive(Debug, FromRow)]
pub struct FoodRow {
    pub id: Uuid,
    pub name: String,
    pub details: String,
    pub protein_g: f32,
    pub fat_g: f32,
    pub carbs_g: f32,
    pub calories_kcal: f64,
}

impl From<FoodRow> for Food {
    fn from(r: FoodRow) -> Self {
        Self {
            id: Some(r.id),
            name: r.name,
            details: r.details,
            nutrition: Nutrition {
                protein: r.protein_g,
                fat: r.fat_g,
                carbohydrates: r.carbs_g,
            },
            calories: r.calories_kcal,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn food(name: &str, calories: f64) -> Food {
        Food::new(name, "", Nutrition::new(1.0, 1.0, 1.0).unwrap(), calories).unwrap()
    }
}
