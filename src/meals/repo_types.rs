use std::hash::{Hash, Hasher};

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::foods::Food;
use crate::meals::calories::compute_total_calories;
use crate::repository::Entity;
use crate::users::User;
use crate::validation::{validate_name, Validated, ValidationError};

/// A named group of foods eaten by one user.
///
/// Equality and hashing look only at the food list; id, name, owner, timestamp and
/// total are informational.
#[derive(Debug, Clone, Serialize)]
pub struct Meal {
    id: Option<Uuid>,
    name: String,
    user: User,
    foods: Vec<Food>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    total_calories: f64,
}

impl Meal {
    /// `total_calories` stays at zero until [`Meal::refresh_total_calories`] runs.
    pub fn new(name: &str, user: User, foods: Vec<Food>) -> Validated<Self> {
        validate_name("name", name)?;
        Ok(Self {
            id: None,
            name: name.trim().to_string(),
            user,
            foods,
            created_at: OffsetDateTime::now_utc(),
            total_calories: 0.0,
        })
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn foods(&self) -> &[Food] {
        &self.foods
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn total_calories(&self) -> f64 {
        self.total_calories
    }

    pub fn set_name(&mut self, name: &str) -> Validated {
        validate_name("name", name)?;
        self.name = name.trim().to_string();
        Ok(())
    }

    pub fn set_user(&mut self, user: User) {
        self.user = user;
    }

    pub fn add_food(&mut self, food: Food) {
        self.foods.push(food);
    }

    /// Removes every entry with this id; returns whether anything was removed.
    pub fn remove_food(&mut self, food_id: Uuid) -> bool {
        let before = self.foods.len();
        self.foods.retain(|f| f.id() != Some(food_id));
        self.foods.len() != before
    }

    pub fn set_foods(&mut self, foods: Vec<Food>) {
        self.foods = foods;
    }

    /// Recomputes the stored total from the current food list.
    pub fn refresh_total_calories(&mut self) -> f64 {
        self.total_calories = compute_total_calories(self);
        self.total_calories
    }

    pub fn validate(&self) -> Validated {
        validate_name("name", &self.name)?;
        if self.user.id().is_none() {
            return Err(ValidationError::new(
                "user",
                "meal owner must be saved before the meal",
            ));
        }
        for food in &self.foods {
            food.validate()?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn assign_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    pub(crate) fn foods_mut(&mut self) -> &mut [Food] {
        &mut self.foods
    }

    pub(crate) fn from_stored(row: MealRow, user: User, foods: Vec<Food>) -> Self {
        Self {
            id: Some(row.id),
            name: row.name,
            user,
            foods,
            created_at: row.created_at,
            total_calories: row.total_calories_kcal,
        }
    }
}

impl Entity for Meal {
    const NAME: &'static str = "Meal";

    fn id(&self) -> Option<Uuid> {
        self.id
    }
}

impl PartialEq for Meal {
    fn eq(&self, other: &Self) -> bool {
        self.foods == other.foods
    }
}

impl Eq for Meal {}

impl Hash for Meal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.foods.hash(state);
    }
}

/// Meal record in the database; foods live in `meal_foods`.
#[derive(Debug, Clone, FromRow)]
pub struct MealRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: OffsetDateTime,
    pub total_calories_kcal: f64,
}

impl MealRow {
    pub(crate) fn of(meal: &Meal, id: Uuid, user_id: Uuid) -> Self {
        Self {
            id,
            user_id,
            name: meal.name.clone(),
            created_at: meal.created_at,
            total_calories_kcal: meal.total_calories,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;

    use super::*;
    use crate::foods::repo_types::fixtures::food;
    use crate::users::repo_types::fixtures::user;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut h = DefaultHasher::new();
        value.hash(&mut h);
        h.finish()
    }

    #[test]
    fn meals_with_same_foods_are_equal_and_hash_equal() {
        let owner = user("john@example.com");
        let foods = vec![food("Egg", 100.0), food("Toast", 50.0)];
        let a = Meal::new("Breakfast", owner.clone(), foods.clone()).unwrap();
        let b = Meal::new("Breakfast", owner, foods).unwrap();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn changing_a_food_breaks_equality() {
        let owner = user("john@example.com");
        let a = Meal::new("Breakfast", owner.clone(), vec![food("Egg", 100.0)]).unwrap();
        let mut b = a.clone();
        b.foods_mut()[0].set_calories(120.0).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn name_and_total_do_not_affect_equality() {
        let owner = user("john@example.com");
        let a = Meal::new("Breakfast", owner.clone(), vec![food("Egg", 100.0)]).unwrap();
        let mut b = a.clone();
        b.set_name("Brunch").unwrap();
        b.refresh_total_calories();
        assert_eq!(a, b);
    }

    #[test]
    fn total_is_not_recomputed_on_mutation() {
        let owner = user("john@example.com");
        let mut meal = Meal::new("Lunch", owner, vec![food("Rice", 200.0)]).unwrap();
        assert_eq!(meal.refresh_total_calories(), 200.0);
        meal.add_food(food("Beans", 120.0));
        assert_eq!(meal.total_calories(), 200.0);
        assert_eq!(meal.refresh_total_calories(), 320.0);
    }

    #[test]
    fn validate_requires_saved_owner() {
        let owner = user("john@example.com");
        let meal = Meal::new("Lunch", owner, vec![]).unwrap();
        assert_eq!(meal.validate().unwrap_err().field, "user");
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(Meal::new(" ", user("john@example.com"), vec![]).is_err());
    }
}
