use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{persistence, Result};
use crate::meals::{Meal, MealRepo};

#[derive(Clone)]
pub struct MealService {
    repo: Arc<dyn MealRepo>,
}

/// Recomputes the stored total, then validates.
fn prepare(meal: &mut Meal) -> Result<()> {
    meal.refresh_total_calories();
    meal.validate().map_err(|e| {
        warn!(field = e.field, name = meal.name(), "meal rejected");
        e.into()
    })
}

impl MealService {
    pub fn new(repo: Arc<dyn MealRepo>) -> Self {
        Self { repo }
    }

    /// Unsaved foods in the meal are stored together with it.
    #[instrument(skip(self, meal), fields(name = meal.name()))]
    pub async fn create(&self, mut meal: Meal) -> Result<Meal> {
        prepare(&mut meal)?;
        let saved = self.repo.save(meal).await.map_err(persistence("save meal"))?;
        info!(
            meal_id = ?saved.id(),
            total_calories = saved.total_calories(),
            "meal created"
        );
        Ok(saved)
    }

    #[instrument(skip(self, meals), fields(count = meals.len()))]
    pub async fn create_all(&self, mut meals: Vec<Meal>) -> Result<Vec<Meal>> {
        for meal in &mut meals {
            prepare(meal)?;
        }
        let saved = self
            .repo
            .save_all(meals)
            .await
            .map_err(persistence("save meals"))?;
        info!(count = saved.len(), "meals created");
        Ok(saved)
    }

    #[instrument(skip(self, meal), fields(meal_id = ?meal.id()))]
    pub async fn update(&self, mut meal: Meal) -> Result<Meal> {
        prepare(&mut meal)?;
        let saved = self.repo.save(meal).await.map_err(persistence("save meal"))?;
        info!(total_calories = saved.total_calories(), "meal updated");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Meal>> {
        self.repo.find_by_id(id).await.map_err(persistence("find meal"))
    }

    #[instrument(skip(self))]
    pub async fn get_all(&self) -> Result<Vec<Meal>> {
        self.repo.find_all().await.map_err(persistence("list meals"))
    }

    /// Foods of the meal are kept; intakes that reference it are removed.
    #[instrument(skip(self))]
    pub async fn delete_by_id(&self, id: Uuid) -> Result<()> {
        self.repo
            .delete_by_id(id)
            .await
            .map_err(persistence("delete meal"))?;
        info!("meal deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_all(&self) -> Result<()> {
        self.repo
            .delete_all()
            .await
            .map_err(persistence("delete meals"))?;
        info!("all meals deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_with_calories_above(&self, threshold: f64) -> Result<Vec<Meal>> {
        self.repo
            .find_with_calories_above(threshold)
            .await
            .map_err(persistence("find meals above calories"))
    }

    #[instrument(skip(self))]
    pub async fn find_with_calories_below(&self, threshold: f64) -> Result<Vec<Meal>> {
        self.repo
            .find_with_calories_below(threshold)
            .await
            .map_err(persistence("find meals below calories"))
    }

    #[instrument(skip(self))]
    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Meal>> {
        self.repo
            .find_by_user(user_id)
            .await
            .map_err(persistence("find meals by user"))
    }

    #[instrument(skip(self))]
    pub async fn find_by_food(&self, food_id: Uuid) -> Result<Vec<Meal>> {
        self.repo
            .find_by_food(food_id)
            .await
            .map_err(persistence("find meals by food"))
    }
}
