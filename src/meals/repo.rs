use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::db::PgStore;
use crate::foods::repo::{fetch_meal_foods, insert_food_if_absent, refresh_meal_totals};
use crate::meals::repo_types::{Meal, MealRow};
use crate::repository::Repository;
use crate::users::repo::fetch_user;

#[async_trait]
pub trait MealRepo: Repository<Meal> {
    async fn find_with_calories_above(&self, threshold: f64) -> anyhow::Result<Vec<Meal>>;

    async fn find_with_calories_below(&self, threshold: f64) -> anyhow::Result<Vec<Meal>>;

    async fn find_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Meal>>;

    /// Reverse view of the meal/food relation.
    async fn find_by_food(&self, food_id: Uuid) -> anyhow::Result<Vec<Meal>>;
}

const SELECT_MEAL: &str = r#"
    SELECT id, user_id, name, created_at, total_calories_kcal
    FROM meals
"#;

async fn hydrate(conn: &mut PgConnection, row: MealRow) -> anyhow::Result<Meal> {
    let user = fetch_user(&mut *conn, row.user_id)
        .await?
        .with_context(|| format!("meal {} references missing user {}", row.id, row.user_id))?;
    let foods = fetch_meal_foods(conn, row.id).await?;
    Ok(Meal::from_stored(row, user, foods))
}

async fn hydrate_all(conn: &mut PgConnection, rows: Vec<MealRow>) -> anyhow::Result<Vec<Meal>> {
    let mut meals = Vec::with_capacity(rows.len());
    for row in rows {
        meals.push(hydrate(&mut *conn, row).await?);
    }
    Ok(meals)
}

pub(crate) async fn fetch_meal(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<Option<Meal>> {
    let row = sqlx::query_as::<_, MealRow>(&format!("{SELECT_MEAL} WHERE id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("select meal by id")?;
    match row {
        Some(row) => Ok(Some(hydrate(conn, row).await?)),
        None => Ok(None),
    }
}

/// Writes the meal, any foods it references that are not stored yet, and its
/// ordered food links. Returns the meal as stored.
async fn upsert_meal(conn: &mut PgConnection, mut meal: Meal) -> anyhow::Result<Meal> {
    let user_id = meal
        .user()
        .id()
        .context("meal owner has not been saved")?;
    for food in meal.foods_mut() {
        insert_food_if_absent(&mut *conn, food).await?;
    }

    let id = meal.id().unwrap_or_else(Uuid::new_v4);
    let row = MealRow::of(&meal, id, user_id);
    sqlx::query(
        r#"
        INSERT INTO meals (id, user_id, name, created_at, total_calories_kcal)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO UPDATE SET
            user_id = EXCLUDED.user_id,
            name = EXCLUDED.name,
            total_calories_kcal = EXCLUDED.total_calories_kcal
        "#,
    )
    .bind(row.id)
    .bind(row.user_id)
    .bind(&row.name)
    .bind(row.created_at)
    .bind(row.total_calories_kcal)
    .execute(&mut *conn)
    .await
    .context("upsert meal")?;

    sqlx::query("DELETE FROM meal_foods WHERE meal_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("clear meal foods")?;
    for (position, food) in meal.foods().iter().enumerate() {
        sqlx::query("INSERT INTO meal_foods (meal_id, position, food_id) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(i32::try_from(position).context("too many foods in meal")?)
            .bind(food.id())
            .execute(&mut *conn)
            .await
            .context("link meal food")?;
    }

    // Stored food rows win over the caller's copies.
    refresh_meal_totals(&mut *conn, &[id]).await?;
    fetch_meal(conn, id)
        .await?
        .with_context(|| format!("meal {id} missing after save"))
}

impl PgStore {
    async fn select_meals(&self, sql: &str, bind: Option<MealFilter>) -> anyhow::Result<Vec<Meal>> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        let query = sqlx::query_as::<_, MealRow>(sql);
        let query = match bind {
            Some(MealFilter::Calories(v)) => query.bind(v),
            Some(MealFilter::Id(v)) => query.bind(v),
            None => query,
        };
        let rows = query.fetch_all(&mut *conn).await.context("select meals")?;
        hydrate_all(&mut conn, rows).await
    }
}

enum MealFilter {
    Calories(f64),
    Id(Uuid),
}

#[async_trait]
impl Repository<Meal> for PgStore {
    async fn save(&self, meal: Meal) -> anyhow::Result<Meal> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        let saved = upsert_meal(&mut tx, meal).await?;
        tx.commit().await.context("commit tx")?;
        Ok(saved)
    }

    async fn save_all(&self, meals: Vec<Meal>) -> anyhow::Result<Vec<Meal>> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        let mut saved = Vec::with_capacity(meals.len());
        for meal in meals {
            saved.push(upsert_meal(&mut tx, meal).await?);
        }
        tx.commit().await.context("commit tx")?;
        Ok(saved)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Meal>> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        fetch_meal(&mut conn, id).await
    }

    async fn find_all(&self) -> anyhow::Result<Vec<Meal>> {
        self.select_meals(&format!("{SELECT_MEAL} ORDER BY created_at"), None)
            .await
    }

    async fn delete_by_id(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM meals WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete meal")?;
        Ok(())
    }

    async fn delete_all(&self) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM meals")
            .execute(&self.pool)
            .await
            .context("delete meals")?;
        Ok(())
    }
}

#[async_trait]
impl MealRepo for PgStore {
    async fn find_with_calories_above(&self, threshold: f64) -> anyhow::Result<Vec<Meal>> {
        self.select_meals(
            &format!("{SELECT_MEAL} WHERE total_calories_kcal > $1 ORDER BY total_calories_kcal DESC"),
            Some(MealFilter::Calories(threshold)),
        )
        .await
    }

    async fn find_with_calories_below(&self, threshold: f64) -> anyhow::Result<Vec<Meal>> {
        self.select_meals(
            &format!("{SELECT_MEAL} WHERE total_calories_kcal < $1 ORDER BY total_calories_kcal"),
            Some(MealFilter::Calories(threshold)),
        )
        .await
    }

    async fn find_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Meal>> {
        self.select_meals(
            &format!("{SELECT_MEAL} WHERE user_id = $1 ORDER BY created_at"),
            Some(MealFilter::Id(user_id)),
        )
        .await
    }

    async fn find_by_food(&self, food_id: Uuid) -> anyhow::Result<Vec<Meal>> {
        self.select_meals(
            &format!(
                "{SELECT_MEAL} WHERE id IN (SELECT meal_id FROM meal_foods WHERE food_id = $1) \
                 ORDER BY created_at"
            ),
            Some(MealFilter::Id(food_id)),
        )
        .await
    }
}
