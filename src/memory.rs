use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use time::{Date, Month, OffsetDateTime, UtcOffset};
use uuid::Uuid;

use crate::foods::{Food, FoodRepo};
use crate::intakes::repo_types::IntakeRow;
use crate::intakes::{CalorieIntake, IntakeRepo};
use crate::meals::repo_types::MealRow;
use crate::meals::{Meal, MealRepo};
use crate::repository::Repository;
use crate::users::{Role, User, UserRepo};

/// Process-local gateway used when no database is configured, and by tests.
///
/// Keeps the same referential rules as the Postgres schema: deleting a user
/// removes their meals and intakes, deleting a meal or food removes the intakes
/// that reference it, and stored meal totals follow their foods.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    offline: bool,
}

#[derive(Clone, Default)]
struct Tables {
    users: Vec<User>,
    foods: Vec<Food>,
    meals: Vec<MealRecord>,
    intakes: Vec<IntakeRow>,
}

#[derive(Clone)]
struct MealRecord {
    row: MealRow,
    food_ids: Vec<Uuid>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every operation fails, for exercising storage error paths.
    pub fn unavailable() -> Self {
        Self {
            tables: Arc::default(),
            offline: true,
        }
    }

    fn read(&self) -> anyhow::Result<RwLockReadGuard<'_, Tables>> {
        if self.offline {
            bail!("memory store is unavailable");
        }
        self.tables
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    fn write(&self) -> anyhow::Result<RwLockWriteGuard<'_, Tables>> {
        if self.offline {
            bail!("memory store is unavailable");
        }
        self.tables
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    /// Applies `apply` to a copy of the tables and publishes the copy only if
    /// every step succeeded.
    fn transact<T>(
        &self,
        apply: impl FnOnce(&mut Tables) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let mut tables = self.write()?;
        let mut staged = tables.clone();
        let out = apply(&mut staged)?;
        *tables = staged;
        Ok(out)
    }
}

fn utc_date(at: OffsetDateTime) -> Date {
    at.to_offset(UtcOffset::UTC).date()
}

impl Tables {
    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id() == Some(id))
    }

    fn food(&self, id: Uuid) -> Option<&Food> {
        self.foods.iter().find(|f| f.id() == Some(id))
    }

    fn meal(&self, id: Uuid) -> Option<&MealRecord> {
        self.meals.iter().find(|m| m.row.id == id)
    }

    fn hydrate_meal(&self, record: &MealRecord) -> anyhow::Result<Meal> {
        let user = self.user(record.row.user_id).cloned().with_context(|| {
            format!("meal {} references missing user {}", record.row.id, record.row.user_id)
        })?;
        let foods = record
            .food_ids
            .iter()
            .map(|id| {
                self.food(*id)
                    .cloned()
                    .with_context(|| format!("meal {} references missing food {id}", record.row.id))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Meal::from_stored(record.row.clone(), user, foods))
    }

    fn hydrate_meals<'a>(
        &self,
        records: impl Iterator<Item = &'a MealRecord>,
    ) -> anyhow::Result<Vec<Meal>> {
        let mut meals = records
            .map(|r| self.hydrate_meal(r))
            .collect::<anyhow::Result<Vec<_>>>()?;
        meals.sort_by_key(Meal::created_at);
        Ok(meals)
    }

    fn hydrate_intake(&self, row: &IntakeRow) -> anyhow::Result<CalorieIntake> {
        let meal = self
            .meal(row.meal_id)
            .with_context(|| format!("intake {} references missing meal", row.id))?;
        let meal = self.hydrate_meal(meal)?;
        let user = self
            .user(row.user_id)
            .cloned()
            .with_context(|| format!("intake {} references missing user", row.id))?;
        let food = self
            .food(row.food_id)
            .cloned()
            .with_context(|| format!("intake {} references missing food", row.id))?;
        Ok(CalorieIntake::from_stored(row.id, meal, user, food, row.logged_at))
    }

    fn hydrate_intakes(
        &self,
        keep: impl Fn(&IntakeRow) -> bool,
    ) -> anyhow::Result<Vec<CalorieIntake>> {
        let mut rows: Vec<&IntakeRow> = self.intakes.iter().filter(|&r| keep(r)).collect();
        rows.sort_by_key(|r| r.logged_at);
        rows.into_iter().map(|r| self.hydrate_intake(r)).collect()
    }

    fn sorted_users(&self, keep: impl Fn(&User) -> bool) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().filter(|&u| keep(u)).cloned().collect();
        users.sort_by_key(User::created_at);
        users
    }

    fn refresh_meal_totals(&mut self, meal_ids: &[Uuid]) {
        let foods = &self.foods;
        for record in self.meals.iter_mut().filter(|m| meal_ids.contains(&m.row.id)) {
            record.row.total_calories_kcal = record
                .food_ids
                .iter()
                .filter_map(|id| foods.iter().find(|f| f.id() == Some(*id)))
                .map(Food::calories)
                .sum();
        }
    }

    fn meals_containing(&self, food_id: Uuid) -> Vec<Uuid> {
        self.meals
            .iter()
            .filter(|m| m.food_ids.contains(&food_id))
            .map(|m| m.row.id)
            .collect()
    }

    fn upsert_user(&mut self, mut user: User) -> anyhow::Result<User> {
        let id = user.id().unwrap_or_else(Uuid::new_v4);
        if self
            .users
            .iter()
            .any(|u| u.id() != Some(id) && u.email() == user.email())
        {
            bail!("email {} is already registered", user.email());
        }
        user.assign_id(id);
        match self.users.iter_mut().find(|u| u.id() == Some(id)) {
            Some(slot) => *slot = user.clone(),
            None => self.users.push(user.clone()),
        }
        Ok(user)
    }

    fn upsert_food(&mut self, mut food: Food) -> Food {
        let id = food.id().unwrap_or_else(Uuid::new_v4);
        food.assign_id(id);
        match self.foods.iter_mut().find(|f| f.id() == Some(id)) {
            Some(slot) => *slot = food.clone(),
            None => self.foods.push(food.clone()),
        }
        let meal_ids = self.meals_containing(id);
        self.refresh_meal_totals(&meal_ids);
        food
    }

    fn insert_food_if_absent(&mut self, food: &mut Food) {
        let id = food.id().unwrap_or_else(Uuid::new_v4);
        food.assign_id(id);
        if self.food(id).is_none() {
            self.foods.push(food.clone());
        }
    }

    fn upsert_meal(&mut self, mut meal: Meal) -> anyhow::Result<Meal> {
        let user_id = meal.user().id().context("meal owner has not been saved")?;
        if self.user(user_id).is_none() {
            bail!("meal owner {user_id} does not exist");
        }
        for food in meal.foods_mut() {
            self.insert_food_if_absent(food);
        }
        let id = meal.id().unwrap_or_else(Uuid::new_v4);
        let row = MealRow::of(&meal, id, user_id);
        let food_ids = meal.foods().iter().filter_map(Food::id).collect();
        match self.meals.iter_mut().find(|m| m.row.id == id) {
            Some(slot) => {
                slot.row.user_id = row.user_id;
                slot.row.name = row.name;
                slot.food_ids = food_ids;
            }
            None => self.meals.push(MealRecord { row, food_ids }),
        }
        // Stored food rows win over the caller's copies.
        self.refresh_meal_totals(&[id]);
        let record = self
            .meal(id)
            .with_context(|| format!("meal {id} missing after save"))?;
        self.hydrate_meal(record)
    }

    fn upsert_intake(&mut self, mut intake: CalorieIntake) -> anyhow::Result<CalorieIntake> {
        let meal_id = intake.meal().id().context("intake meal has not been saved")?;
        let user_id = intake.user().id().context("intake user has not been saved")?;
        let food_id = intake.food().id().context("intake food has not been saved")?;
        if self.meal(meal_id).is_none() {
            bail!("meal {meal_id} does not exist");
        }
        if self.user(user_id).is_none() {
            bail!("user {user_id} does not exist");
        }
        if self.food(food_id).is_none() {
            bail!("food {food_id} does not exist");
        }
        let id = intake.id().unwrap_or_else(Uuid::new_v4);
        match self.intakes.iter_mut().find(|r| r.id == id) {
            Some(slot) => {
                slot.meal_id = meal_id;
                slot.user_id = user_id;
                slot.food_id = food_id;
            }
            None => self.intakes.push(IntakeRow {
                id,
                meal_id,
                user_id,
                food_id,
                logged_at: intake.logged_at(),
            }),
        }
        intake.assign_id(id);
        Ok(intake)
    }

    fn delete_meals(&mut self, doomed: impl Fn(&MealRecord) -> bool) {
        let removed: Vec<Uuid> = self
            .meals
            .iter()
            .filter(|&m| doomed(m))
            .map(|m| m.row.id)
            .collect();
        self.meals.retain(|m| !removed.contains(&m.row.id));
        self.intakes.retain(|r| !removed.contains(&r.meal_id));
    }

    fn delete_users(&mut self, doomed: impl Fn(&User) -> bool) -> u64 {
        let removed: Vec<Uuid> = self
            .users
            .iter()
            .filter(|&u| doomed(u))
            .filter_map(User::id)
            .collect();
        self.users.retain(|u| !u.id().is_some_and(|id| removed.contains(&id)));
        self.delete_meals(|m| removed.contains(&m.row.user_id));
        self.intakes.retain(|r| !removed.contains(&r.user_id));
        removed.len() as u64
    }

    fn delete_food(&mut self, id: Uuid) {
        let affected = self.meals_containing(id);
        self.foods.retain(|f| f.id() != Some(id));
        self.intakes.retain(|r| r.food_id != id);
        for record in self.meals.iter_mut() {
            record.food_ids.retain(|f| *f != id);
        }
        self.refresh_meal_totals(&affected);
    }
}

#[async_trait]
impl Repository<User> for MemoryStore {
    async fn save(&self, user: User) -> anyhow::Result<User> {
        self.write()?.upsert_user(user)
    }

    async fn save_all(&self, users: Vec<User>) -> anyhow::Result<Vec<User>> {
        self.transact(|tables| users.into_iter().map(|u| tables.upsert_user(u)).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.read()?.user(id).cloned())
    }

    async fn find_all(&self) -> anyhow::Result<Vec<User>> {
        Ok(self.read()?.sorted_users(|_| true))
    }

    async fn delete_by_id(&self, id: Uuid) -> anyhow::Result<()> {
        self.write()?.delete_users(|u| u.id() == Some(id));
        Ok(())
    }

    async fn delete_all(&self) -> anyhow::Result<()> {
        self.write()?.delete_users(|_| true);
        Ok(())
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .read()?
            .users
            .iter()
            .find(|u| u.email() == email)
            .cloned())
    }

    async fn find_by_role(&self, role: Role) -> anyhow::Result<Vec<User>> {
        Ok(self.read()?.sorted_users(|u| u.role() == role))
    }

    async fn find_with_calorie_goal_above(&self, threshold: i32) -> anyhow::Result<Vec<User>> {
        Ok(self.read()?.sorted_users(|u| u.calorie_goal() > threshold))
    }

    async fn find_with_calorie_goal_below(&self, threshold: i32) -> anyhow::Result<Vec<User>> {
        Ok(self.read()?.sorted_users(|u| u.calorie_goal() < threshold))
    }

    async fn update_last_login(&self, id: Uuid, at: OffsetDateTime) -> anyhow::Result<bool> {
        let mut tables = self.write()?;
        match tables.users.iter_mut().find(|u| u.id() == Some(id)) {
            Some(user) => {
                user.stamp_login(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_inactive_since(&self, cutoff: OffsetDateTime) -> anyhow::Result<u64> {
        Ok(self
            .write()?
            .delete_users(|u| u.last_login().unwrap_or(u.created_at()) < cutoff))
    }
}

#[async_trait]
impl Repository<Food> for MemoryStore {
    async fn save(&self, food: Food) -> anyhow::Result<Food> {
        Ok(self.write()?.upsert_food(food))
    }

    async fn save_all(&self, foods: Vec<Food>) -> anyhow::Result<Vec<Food>> {
        let mut tables = self.write()?;
        Ok(foods.into_iter().map(|f| tables.upsert_food(f)).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Food>> {
        Ok(self.read()?.food(id).cloned())
    }

    async fn find_all(&self) -> anyhow::Result<Vec<Food>> {
        let mut foods = self.read()?.foods.clone();
        foods.sort_by(|a, b| a.name().cmp(b.name()).then(a.id().cmp(&b.id())));
        Ok(foods)
    }

    async fn delete_by_id(&self, id: Uuid) -> anyhow::Result<()> {
        self.write()?.delete_food(id);
        Ok(())
    }

    async fn delete_all(&self) -> anyhow::Result<()> {
        let mut tables = self.write()?;
        tables.foods.clear();
        tables.intakes.clear();
        for record in tables.meals.iter_mut() {
            record.food_ids.clear();
            record.row.total_calories_kcal = 0.0;
        }
        Ok(())
    }
}

#[async_trait]
impl FoodRepo for MemoryStore {
    async fn find_with_calories_above(&self, threshold: f64) -> anyhow::Result<Vec<Food>> {
        let mut foods: Vec<Food> = self
            .read()?
            .foods
            .iter()
            .filter(|f| f.calories() > threshold)
            .cloned()
            .collect();
        foods.sort_by(|a, b| b.calories().total_cmp(&a.calories()));
        Ok(foods)
    }

    async fn find_with_calories_below(&self, threshold: f64) -> anyhow::Result<Vec<Food>> {
        let mut foods: Vec<Food> = self
            .read()?
            .foods
            .iter()
            .filter(|f| f.calories() < threshold)
            .cloned()
            .collect();
        foods.sort_by(|a, b| a.calories().total_cmp(&b.calories()));
        Ok(foods)
    }
}

#[async_trait]
impl Repository<Meal> for MemoryStore {
    async fn save(&self, meal: Meal) -> anyhow::Result<Meal> {
        self.transact(|tables| tables.upsert_meal(meal))
    }

    async fn save_all(&self, meals: Vec<Meal>) -> anyhow::Result<Vec<Meal>> {
        self.transact(|tables| meals.into_iter().map(|m| tables.upsert_meal(m)).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Meal>> {
        let tables = self.read()?;
        tables.meal(id).map(|m| tables.hydrate_meal(m)).transpose()
    }

    async fn find_all(&self) -> anyhow::Result<Vec<Meal>> {
        let tables = self.read()?;
        tables.hydrate_meals(tables.meals.iter())
    }

    async fn delete_by_id(&self, id: Uuid) -> anyhow::Result<()> {
        self.write()?.delete_meals(|m| m.row.id == id);
        Ok(())
    }

    async fn delete_all(&self) -> anyhow::Result<()> {
        self.write()?.delete_meals(|_| true);
        Ok(())
    }
}

#[async_trait]
impl MealRepo for MemoryStore {
    async fn find_with_calories_above(&self, threshold: f64) -> anyhow::Result<Vec<Meal>> {
        let tables = self.read()?;
        let mut meals = tables.hydrate_meals(
            tables
                .meals
                .iter()
                .filter(|m| m.row.total_calories_kcal > threshold),
        )?;
        meals.sort_by(|a, b| b.total_calories().total_cmp(&a.total_calories()));
        Ok(meals)
    }

    async fn find_with_calories_below(&self, threshold: f64) -> anyhow::Result<Vec<Meal>> {
        let tables = self.read()?;
        let mut meals = tables.hydrate_meals(
            tables
                .meals
                .iter()
                .filter(|m| m.row.total_calories_kcal < threshold),
        )?;
        meals.sort_by(|a, b| a.total_calories().total_cmp(&b.total_calories()));
        Ok(meals)
    }

    async fn find_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Meal>> {
        let tables = self.read()?;
        tables.hydrate_meals(tables.meals.iter().filter(|m| m.row.user_id == user_id))
    }

    async fn find_by_food(&self, food_id: Uuid) -> anyhow::Result<Vec<Meal>> {
        let tables = self.read()?;
        tables.hydrate_meals(tables.meals.iter().filter(|m| m.food_ids.contains(&food_id)))
    }
}

#[async_trait]
impl Repository<CalorieIntake> for MemoryStore {
    async fn save(&self, intake: CalorieIntake) -> anyhow::Result<CalorieIntake> {
        self.write()?.upsert_intake(intake)
    }

    async fn save_all(&self, intakes: Vec<CalorieIntake>) -> anyhow::Result<Vec<CalorieIntake>> {
        self.transact(|tables| intakes.into_iter().map(|i| tables.upsert_intake(i)).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<CalorieIntake>> {
        let tables = self.read()?;
        tables
            .intakes
            .iter()
            .find(|r| r.id == id)
            .map(|r| tables.hydrate_intake(r))
            .transpose()
    }

    async fn find_all(&self) -> anyhow::Result<Vec<CalorieIntake>> {
        self.read()?.hydrate_intakes(|_| true)
    }

    async fn delete_by_id(&self, id: Uuid) -> anyhow::Result<()> {
        self.write()?.intakes.retain(|r| r.id != id);
        Ok(())
    }

    async fn delete_all(&self) -> anyhow::Result<()> {
        self.write()?.intakes.clear();
        Ok(())
    }
}

#[async_trait]
impl IntakeRepo for MemoryStore {
    async fn find_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<CalorieIntake>> {
        self.read()?.hydrate_intakes(|r| r.user_id == user_id)
    }

    async fn find_by_date(&self, date: Date) -> anyhow::Result<Vec<CalorieIntake>> {
        self.read()?.hydrate_intakes(|r| utc_date(r.logged_at) == date)
    }

    async fn find_by_user_and_date(
        &self,
        user_id: Uuid,
        date: Date,
    ) -> anyhow::Result<Vec<CalorieIntake>> {
        self.read()?
            .hydrate_intakes(|r| r.user_id == user_id && utc_date(r.logged_at) == date)
    }

    async fn find_by_user_and_date_range(
        &self,
        user_id: Uuid,
        start: Date,
        end: Date,
    ) -> anyhow::Result<Vec<CalorieIntake>> {
        self.read()?.hydrate_intakes(|r| {
            let day = utc_date(r.logged_at);
            r.user_id == user_id && start <= day && day <= end
        })
    }

    async fn find_by_user_and_month(
        &self,
        user_id: Uuid,
        month: Month,
    ) -> anyhow::Result<Vec<CalorieIntake>> {
        self.read()?.hydrate_intakes(|r| {
            r.user_id == user_id && r.logged_at.to_offset(UtcOffset::UTC).month() == month
        })
    }
}
