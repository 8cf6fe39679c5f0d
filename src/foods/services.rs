use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{persistence, Result};
use crate::foods::{Food, FoodRepo};

#[derive(Clone)]
pub struct FoodService {
    repo: Arc<dyn FoodRepo>,
}

fn check(food: &Food) -> Result<()> {
    food.validate().map_err(|e| {
        warn!(field = e.field, name = food.name(), "food rejected");
        e.into()
    })
}

impl FoodService {
    pub fn new(repo: Arc<dyn FoodRepo>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self, food), fields(name = food.name()))]
    pub async fn create(&self, food: Food) -> Result<Food> {
        check(&food)?;
        let saved = self.repo.save(food).await.map_err(persistence("save food"))?;
        info!(food_id = ?saved.id(), "food created");
        Ok(saved)
    }

    /// Validates every food before writing any of them.
    #[instrument(skip(self, foods), fields(count = foods.len()))]
    pub async fn create_all(&self, foods: Vec<Food>) -> Result<Vec<Food>> {
        for food in &foods {
            check(food)?;
        }
        let saved = self
            .repo
            .save_all(foods)
            .await
            .map_err(persistence("save foods"))?;
        info!(count = saved.len(), "foods created");
        Ok(saved)
    }

    /// Saves over the stored row, or inserts when there is none.
    #[instrument(skip(self, food), fields(food_id = ?food.id()))]
    pub async fn update(&self, food: Food) -> Result<Food> {
        check(&food)?;
        let saved = self.repo.save(food).await.map_err(persistence("save food"))?;
        info!("food updated");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Food>> {
        self.repo.find_by_id(id).await.map_err(persistence("find food"))
    }

    #[instrument(skip(self))]
    pub async fn get_all(&self) -> Result<Vec<Food>> {
        self.repo.find_all().await.map_err(persistence("list foods"))
    }

    /// Also unlinks the food from every meal and drops intakes that logged it.
    #[instrument(skip(self))]
    pub async fn delete_by_id(&self, id: Uuid) -> Result<()> {
        self.repo
            .delete_by_id(id)
            .await
            .map_err(persistence("delete food"))?;
        info!("food deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_all(&self) -> Result<()> {
        self.repo
            .delete_all()
            .await
            .map_err(persistence("delete foods"))?;
        info!("all foods deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_with_calories_above(&self, threshold: f64) -> Result<Vec<Food>> {
        self.repo
            .find_with_calories_above(threshold)
            .await
            .map_err(persistence("find foods above calories"))
    }

    #[instrument(skip(self))]
    pub async fn find_with_calories_below(&self, threshold: f64) -> Result<Vec<Food>> {
        self.repo
            .find_with_calories_below(threshold)
            .await
            .map_err(persistence("find foods below calories"))
    }
}
