use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::db::PgStore;
use crate::foods::repo_types::{Food, FoodRow};
use crate::repository::Repository;

#[async_trait]
pub trait FoodRepo: Repository<Food> {
    async fn find_with_calories_above(&self, threshold: f64) -> anyhow::Result<Vec<Food>>;

    async fn find_with_calories_below(&self, threshold: f64) -> anyhow::Result<Vec<Food>>;
}

const SELECT_FOOD: &str = r#"
    SELECT id, name, details, protein_g, fat_g, carbs_g, calories_kcal
    FROM foods
"#;

pub(crate) async fn fetch_food(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<Option<Food>> {
    let row = sqlx::query_as::<_, FoodRow>(&format!("{SELECT_FOOD} WHERE id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await
        .context("select food by id")?;
    Ok(row.map(Food::from))
}

/// Foods of one meal, in the order they were added.
pub(crate) async fn fetch_meal_foods(
    conn: &mut PgConnection,
    meal_id: Uuid,
) -> anyhow::Result<Vec<Food>> {
    let rows = sqlx::query_as::<_, FoodRow>(
        r#"
        SELECT f.id, f.name, f.details, f.protein_g, f.fat_g, f.carbs_g, f.calories_kcal
        FROM meal_foods mf
        JOIN foods f ON f.id = mf.food_id
        WHERE mf.meal_id = $1
        ORDER BY mf.position
        "#,
    )
    .bind(meal_id)
    .fetch_all(conn)
    .await
    .context("select meal foods")?;
    Ok(rows.into_iter().map(Food::from).collect())
}

/// Inserts or overwrites a food.
async fn upsert_food(conn: &mut PgConnection, mut food: Food) -> anyhow::Result<Food> {
    let id = food.id().unwrap_or_else(Uuid::new_v4);
    let n = food.nutrition();
    sqlx::query(
        r#"
        INSERT INTO foods (id, name, details, protein_g, fat_g, carbs_g, calories_kcal)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            details = EXCLUDED.details,
            protein_g = EXCLUDED.protein_g,
            fat_g = EXCLUDED.fat_g,
            carbs_g = EXCLUDED.carbs_g,
            calories_kcal = EXCLUDED.calories_kcal
        "#,
    )
    .bind(id)
    .bind(food.name())
    .bind(food.details())
    .bind(n.protein())
    .bind(n.fat())
    .bind(n.carbohydrates())
    .bind(food.calories())
    .execute(&mut *conn)
    .await
    .context("upsert food")?;
    food.assign_id(id);
    refresh_meal_totals_for_food(conn, id).await?;
    Ok(food)
}

/// Inserts a food referenced by a meal unless a row with its id already exists.
pub(crate) async fn insert_food_if_absent(
    conn: &mut PgConnection,
    food: &mut Food,
) -> anyhow::Result<()> {
    let id = food.id().unwrap_or_else(Uuid::new_v4);
    let n = food.nutrition();
    sqlx::query(
        r#"
        INSERT INTO foods (id, name, details, protein_g, fat_g, carbs_g, calories_kcal)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(id)
    .bind(food.name())
    .bind(food.details())
    .bind(n.protein())
    .bind(n.fat())
    .bind(n.carbohydrates())
    .bind(food.calories())
    .execute(conn)
    .await
    .context("insert meal food")?;
    food.assign_id(id);
    Ok(())
}

/// Keeps stored meal totals equal to the sum of their current foods.
async fn refresh_meal_totals_for_food(conn: &mut PgConnection, food_id: Uuid) -> anyhow::Result<()> {
    let meal_ids: Vec<Uuid> =
        sqlx::query_scalar("SELECT DISTINCT meal_id FROM meal_foods WHERE food_id = $1")
            .bind(food_id)
            .fetch_all(&mut *conn)
            .await
            .context("select meals of food")?;
    refresh_meal_totals(conn, &meal_ids).await
}

pub(crate) async fn refresh_meal_totals(
    conn: &mut PgConnection,
    meal_ids: &[Uuid],
) -> anyhow::Result<()> {
    if meal_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        r#"
        UPDATE meals m
        SET total_calories_kcal = COALESCE((
            SELECT SUM(f.calories_kcal)
            FROM meal_foods mf
            JOIN foods f ON f.id = mf.food_id
            WHERE mf.meal_id = m.id
        ), 0)
        WHERE m.id = ANY($1)
        "#,
    )
    .bind(meal_ids)
    .execute(conn)
    .await
    .context("refresh meal totals")?;
    Ok(())
}

#[async_trait]
impl Repository<Food> for PgStore {
    async fn save(&self, food: Food) -> anyhow::Result<Food> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        let saved = upsert_food(&mut tx, food).await?;
        tx.commit().await.context("commit tx")?;
        Ok(saved)
    }

    async fn save_all(&self, foods: Vec<Food>) -> anyhow::Result<Vec<Food>> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        let mut saved = Vec::with_capacity(foods.len());
        for food in foods {
            saved.push(upsert_food(&mut tx, food).await?);
        }
        tx.commit().await.context("commit tx")?;
        Ok(saved)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Food>> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        fetch_food(&mut conn, id).await
    }

    async fn find_all(&self) -> anyhow::Result<Vec<Food>> {
        let rows = sqlx::query_as::<_, FoodRow>(&format!("{SELECT_FOOD} ORDER BY name, id"))
            .fetch_all(&self.pool)
            .await
            .context("select foods")?;
        Ok(rows.into_iter().map(Food::from).collect())
    }

    async fn delete_by_id(&self, id: Uuid) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        let meal_ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT DISTINCT meal_id FROM meal_foods WHERE food_id = $1")
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .context("select meals of food")?;
        sqlx::query("DELETE FROM foods WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete food")?;
        refresh_meal_totals(&mut tx, &meal_ids).await?;
        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn delete_all(&self) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        sqlx::query("DELETE FROM foods")
            .execute(&mut *tx)
            .await
            .context("delete foods")?;
        sqlx::query("UPDATE meals SET total_calories_kcal = 0")
            .execute(&mut *tx)
            .await
            .context("reset meal totals")?;
        tx.commit().await.context("commit tx")?;
        Ok(())
    }
}

#[async_trait]
impl FoodRepo for PgStore {
    async fn find_with_calories_above(&self, threshold: f64) -> anyhow::Result<Vec<Food>> {
        let rows = sqlx::query_as::<_, FoodRow>(&format!(
            "{SELECT_FOOD} WHERE calories_kcal > $1 ORDER BY calories_kcal DESC"
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
        .context("select foods above calories")?;
        Ok(rows.into_iter().map(Food::from).collect())
    }

    async fn find_with_calories_below(&self, threshold: f64) -> anyhow::Result<Vec<Food>> {
        let rows = sqlx::query_as::<_, FoodRow>(&format!(
            "{SELECT_FOOD} WHERE calories_kcal < $1 ORDER BY calories_kcal"
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
        .context("select foods below calories")?;
        Ok(rows.into_iter().map(Food::from).collect())
    }
}
