use std::hash::{Hash, Hasher};

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::foods::Food;
use crate::meals::Meal;
use crate::repository::Entity;
use crate::users::User;
use crate::validation::{Validated, ValidationError};

/// One logged eating event: a user ate a food as part of a meal.
#[derive(Debug, Clone, Serialize)]
pub struct CalorieIntake {
    id: Option<Uuid>,
    meal: Meal,
    user: User,
    food: Food,
    #[serde(with = "time::serde::rfc3339")]
    logged_at: OffsetDateTime,
}

fn require_saved(field: &'static str, id: Option<Uuid>) -> Validated {
    if id.is_none() {
        return Err(ValidationError::new(
            field,
            "must be saved before an intake can reference it",
        ));
    }
    Ok(())
}

impl CalorieIntake {
    /// The timestamp is taken now and never changes afterwards.
    pub fn new(meal: Meal, user: User, food: Food) -> Validated<Self> {
        require_saved("meal", meal.id())?;
        require_saved("user", user.id())?;
        require_saved("food", food.id())?;
        Ok(Self {
            id: None,
            meal,
            user,
            food,
            logged_at: OffsetDateTime::now_utc(),
        })
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn meal(&self) -> &Meal {
        &self.meal
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn food(&self) -> &Food {
        &self.food
    }

    pub fn logged_at(&self) -> OffsetDateTime {
        self.logged_at
    }

    pub fn set_meal(&mut self, meal: Meal) -> Validated {
        require_saved("meal", meal.id())?;
        self.meal = meal;
        Ok(())
    }

    pub fn set_food(&mut self, food: Food) -> Validated {
        require_saved("food", food.id())?;
        self.food = food;
        Ok(())
    }

    pub fn validate(&self) -> Validated {
        require_saved("meal", self.meal.id())?;
        require_saved("user", self.user.id())?;
        require_saved("food", self.food.id())?;
        Ok(())
    }

    pub(crate) fn assign_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    pub(crate) fn from_stored(
        id: Uuid,
        meal: Meal,
        user: User,
        food: Food,
        logged_at: OffsetDateTime,
    ) -> Self {
        Self {
            id: Some(id),
            meal,
            user,
            food,
            logged_at,
        }
    }
}

impl Entity for CalorieIntake {
    const NAME: &'static str = "CalorieIntake";

    fn id(&self) -> Option<Uuid> {
        self.id
    }
}

impl PartialEq for CalorieIntake {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.meal == other.meal
            && self.user == other.user
            && self.food == other.food
    }
}

impl Eq for CalorieIntake {}

impl Hash for CalorieIntake {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.meal.hash(state);
        self.user.hash(state);
        self.food.hash(state);
    }
}

/// Intake record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct IntakeRow {
    pub id: Uuid,
    pub meal_id: Uuid,
    pub user_id: Uuid,
    pub food_id: Uuid,
    pub logged_at: OffsetDateTime,
}
