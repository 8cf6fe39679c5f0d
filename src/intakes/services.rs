use std::sync::Arc;

use time::{Date, Month};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{persistence, Result};
use crate::intakes::{CalorieIntake, IntakeRepo};
use crate::meals::sum_intake_calories;
use crate::validation::ValidationError;

#[derive(Clone)]
pub struct IntakeService {
    repo: Arc<dyn IntakeRepo>,
}

fn check(intake: &CalorieIntake) -> Result<()> {
    intake.validate().map_err(|e| {
        warn!(field = e.field, "intake rejected");
        e.into()
    })
}

impl IntakeService {
    pub fn new(repo: Arc<dyn IntakeRepo>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self, intake), fields(user_id = ?intake.user().id(), food_id = ?intake.food().id()))]
    pub async fn create(&self, intake: CalorieIntake) -> Result<CalorieIntake> {
        check(&intake)?;
        let saved = self
            .repo
            .save(intake)
            .await
            .map_err(persistence("save intake"))?;
        info!(intake_id = ?saved.id(), "intake logged");
        Ok(saved)
    }

    #[instrument(skip(self, intake), fields(intake_id = ?intake.id()))]
    pub async fn update(&self, intake: CalorieIntake) -> Result<CalorieIntake> {
        check(&intake)?;
        let saved = self
            .repo
            .save(intake)
            .await
            .map_err(persistence("save intake"))?;
        info!("intake updated");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<CalorieIntake>> {
        self.repo
            .find_by_id(id)
            .await
            .map_err(persistence("find intake"))
    }

    #[instrument(skip(self))]
    pub async fn get_all(&self) -> Result<Vec<CalorieIntake>> {
        self.repo.find_all().await.map_err(persistence("list intakes"))
    }

    #[instrument(skip(self))]
    pub async fn delete_by_id(&self, id: Uuid) -> Result<()> {
        self.repo
            .delete_by_id(id)
            .await
            .map_err(persistence("delete intake"))?;
        info!("intake deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_all(&self) -> Result<()> {
        self.repo
            .delete_all()
            .await
            .map_err(persistence("delete intakes"))?;
        info!("all intakes deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<CalorieIntake>> {
        self.repo
            .find_by_user(user_id)
            .await
            .map_err(persistence("find intakes by user"))
    }

    #[instrument(skip(self))]
    pub async fn find_by_date(&self, date: Date) -> Result<Vec<CalorieIntake>> {
        self.repo
            .find_by_date(date)
            .await
            .map_err(persistence("find intakes by date"))
    }

    #[instrument(skip(self))]
    pub async fn find_by_user_and_date(
        &self,
        user_id: Uuid,
        date: Date,
    ) -> Result<Vec<CalorieIntake>> {
        self.repo
            .find_by_user_and_date(user_id, date)
            .await
            .map_err(persistence("find intakes by user and date"))
    }

    /// Intakes logged in `month` of any year.
    #[instrument(skip(self))]
    pub async fn find_by_user_and_month(
        &self,
        user_id: Uuid,
        month: Month,
    ) -> Result<Vec<CalorieIntake>> {
        self.repo
            .find_by_user_and_month(user_id, month)
            .await
            .map_err(persistence("find intakes by user and month"))
    }

    /// Both bounds are inclusive; `start` after `end` is rejected.
    #[instrument(skip(self))]
    pub async fn find_by_user_and_date_range(
        &self,
        user_id: Uuid,
        start: Date,
        end: Date,
    ) -> Result<Vec<CalorieIntake>> {
        if start > end {
            warn!("inverted date range");
            return Err(ValidationError::new("start", "must not be after end").into());
        }
        self.repo
            .find_by_user_and_date_range(user_id, start, end)
            .await
            .map_err(persistence("find intakes by date range"))
    }

    #[instrument(skip(self))]
    pub async fn monthly_calories(&self, user_id: Uuid, month: Month) -> Result<f64> {
        let intakes = self.find_by_user_and_month(user_id, month).await?;
        let total = sum_intake_calories(&intakes);
        info!(count = intakes.len(), total, "monthly calories computed");
        Ok(total)
    }
}
