use std::sync::Arc;

use tracing::info;

use crate::auth::{Argon2Hasher, CredentialHasher};
use crate::config::AppConfig;
use crate::db::PgStore;
use crate::foods::{FoodRepo, FoodService};
use crate::intakes::{IntakeRepo, IntakeService};
use crate::meals::{MealRepo, MealService};
use crate::memory::MemoryStore;
use crate::users::{UserRepo, UserService};

/// Composition root: one gateway shared by every facade.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: UserService,
    pub foods: FoodService,
    pub meals: MealService,
    pub intakes: IntakeService,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let hasher = Arc::new(Argon2Hasher::with_costs(
            config.hashing.m_cost_kib,
            config.hashing.t_cost,
            config.hashing.p_cost,
        )?);

        match config.database_url.clone() {
            Some(url) => {
                let store = PgStore::connect(&config, &url).await?;
                store.migrate().await?;
                Ok(Self::from_parts(config, store, hasher))
            }
            None => {
                info!("DATABASE_URL not set; using in-memory store");
                Ok(Self::from_parts(config, MemoryStore::new(), hasher))
            }
        }
    }

    pub fn from_parts<S>(config: AppConfig, store: S, hasher: Arc<dyn CredentialHasher>) -> Self
    where
        S: UserRepo + FoodRepo + MealRepo + IntakeRepo + Clone + 'static,
    {
        let users = UserService::new(Arc::new(store.clone()), hasher)
            .with_inactive_after(config.inactive_after())
            .with_calorie_goal_threshold(config.calorie_goal_threshold);
        Self {
            users,
            foods: FoodService::new(Arc::new(store.clone())),
            meals: MealService::new(Arc::new(store.clone())),
            intakes: IntakeService::new(Arc::new(store)),
            config: Arc::new(config),
        }
    }

    /// Fresh in-memory state with the given hasher and default settings.
    pub fn in_memory(hasher: Arc<dyn CredentialHasher>) -> Self {
        Self::from_parts(AppConfig::default(), MemoryStore::new(), hasher)
    }
}
