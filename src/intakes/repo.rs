use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgConnection;
use time::{Date, Month};
use uuid::Uuid;

use crate::db::PgStore;
use crate::foods::repo::fetch_food;
use crate::intakes::repo_types::{CalorieIntake, IntakeRow};
use crate::meals::repo::fetch_meal;
use crate::repository::Repository;
use crate::users::repo::fetch_user;

#[async_trait]
pub trait IntakeRepo: Repository<CalorieIntake> {
    async fn find_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<CalorieIntake>>;

    /// Dates are UTC calendar days.
    async fn find_by_date(&self, date: Date) -> anyhow::Result<Vec<CalorieIntake>>;

    async fn find_by_user_and_date(
        &self,
        user_id: Uuid,
        date: Date,
    ) -> anyhow::Result<Vec<CalorieIntake>>;

    /// Both ends inclusive.
    async fn find_by_user_and_date_range(
        &self,
        user_id: Uuid,
        start: Date,
        end: Date,
    ) -> anyhow::Result<Vec<CalorieIntake>>;

    /// Matches the month in any year.
    async fn find_by_user_and_month(
        &self,
        user_id: Uuid,
        month: Month,
    ) -> anyhow::Result<Vec<CalorieIntake>>;
}

const SELECT_INTAKE: &str = r#"
    SELECT id, meal_id, user_id, food_id, logged_at
    FROM calorie_intakes
"#;

const LOGGED_DAY: &str = "(logged_at AT TIME ZONE 'UTC')::date";

async fn hydrate(conn: &mut PgConnection, row: IntakeRow) -> anyhow::Result<CalorieIntake> {
    let meal = fetch_meal(&mut *conn, row.meal_id)
        .await?
        .with_context(|| format!("intake {} references missing meal", row.id))?;
    let user = fetch_user(&mut *conn, row.user_id)
        .await?
        .with_context(|| format!("intake {} references missing user", row.id))?;
    let food = fetch_food(conn, row.food_id)
        .await?
        .with_context(|| format!("intake {} references missing food", row.id))?;
    Ok(CalorieIntake::from_stored(row.id, meal, user, food, row.logged_at))
}

async fn upsert_intake(
    conn: &mut PgConnection,
    mut intake: CalorieIntake,
) -> anyhow::Result<CalorieIntake> {
    let id = intake.id().unwrap_or_else(Uuid::new_v4);
    sqlx::query(
        r#"
        INSERT INTO calorie_intakes (id, meal_id, user_id, food_id, logged_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO UPDATE SET
            meal_id = EXCLUDED.meal_id,
            user_id = EXCLUDED.user_id,
            food_id = EXCLUDED.food_id
        "#,
    )
    .bind(id)
    .bind(intake.meal().id())
    .bind(intake.user().id())
    .bind(intake.food().id())
    .bind(intake.logged_at())
    .execute(conn)
    .await
    .context("upsert calorie intake")?;
    intake.assign_id(id);
    Ok(intake)
}

enum Filter {
    None,
    User(Uuid),
    Date(Date),
    UserDate(Uuid, Date),
    UserRange(Uuid, Date, Date),
    UserMonth(Uuid, i32),
}

impl PgStore {
    async fn select_intakes(&self, sql: &str, filter: Filter) -> anyhow::Result<Vec<CalorieIntake>> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        let query = sqlx::query_as::<_, IntakeRow>(sql);
        let query = match filter {
            Filter::None => query,
            Filter::User(u) => query.bind(u),
            Filter::Date(d) => query.bind(d),
            Filter::UserDate(u, d) => query.bind(u).bind(d),
            Filter::UserRange(u, s, e) => query.bind(u).bind(s).bind(e),
            Filter::UserMonth(u, m) => query.bind(u).bind(m),
        };
        let rows = query
            .fetch_all(&mut *conn)
            .await
            .context("select calorie intakes")?;
        let mut intakes = Vec::with_capacity(rows.len());
        for row in rows {
            intakes.push(hydrate(&mut conn, row).await?);
        }
        Ok(intakes)
    }
}

#[async_trait]
impl Repository<CalorieIntake> for PgStore {
    async fn save(&self, intake: CalorieIntake) -> anyhow::Result<CalorieIntake> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        upsert_intake(&mut conn, intake).await
    }

    async fn save_all(&self, intakes: Vec<CalorieIntake>) -> anyhow::Result<Vec<CalorieIntake>> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        let mut saved = Vec::with_capacity(intakes.len());
        for intake in intakes {
            saved.push(upsert_intake(&mut tx, intake).await?);
        }
        tx.commit().await.context("commit tx")?;
        Ok(saved)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<CalorieIntake>> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        let row = sqlx::query_as::<_, IntakeRow>(&format!("{SELECT_INTAKE} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .context("select calorie intake by id")?;
        match row {
            Some(row) => Ok(Some(hydrate(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    async fn find_all(&self) -> anyhow::Result<Vec<CalorieIntake>> {
        self.select_intakes(&format!("{SELECT_INTAKE} ORDER BY logged_at"), Filter::None)
            .await
    }

    async fn delete_by_id(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM calorie_intakes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete calorie intake")?;
        Ok(())
    }

    async fn delete_all(&self) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM calorie_intakes")
            .execute(&self.pool)
            .await
            .context("delete calorie intakes")?;
        Ok(())
    }
}

#[async_trait]
impl IntakeRepo for PgStore {
    async fn find_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<CalorieIntake>> {
        self.select_intakes(
            &format!("{SELECT_INTAKE} WHERE user_id = $1 ORDER BY logged_at"),
            Filter::User(user_id),
        )
        .await
    }

    async fn find_by_date(&self, date: Date) -> anyhow::Result<Vec<CalorieIntake>> {
        self.select_intakes(
            &format!("{SELECT_INTAKE} WHERE {LOGGED_DAY} = $1 ORDER BY logged_at"),
            Filter::Date(date),
        )
        .await
    }

    async fn find_by_user_and_date(
        &self,
        user_id: Uuid,
        date: Date,
    ) -> anyhow::Result<Vec<CalorieIntake>> {
        self.select_intakes(
            &format!("{SELECT_INTAKE} WHERE user_id = $1 AND {LOGGED_DAY} = $2 ORDER BY logged_at"),
            Filter::UserDate(user_id, date),
        )
        .await
    }

    async fn find_by_user_and_date_range(
        &self,
        user_id: Uuid,
        start: Date,
        end: Date,
    ) -> anyhow::Result<Vec<CalorieIntake>> {
        self.select_intakes(
            &format!(
                "{SELECT_INTAKE} WHERE user_id = $1 AND {LOGGED_DAY} BETWEEN $2 AND $3 \
                 ORDER BY logged_at"
            ),
            Filter::UserRange(user_id, start, end),
        )
        .await
    }

    async fn find_by_user_and_month(
        &self,
        user_id: Uuid,
        month: Month,
    ) -> anyhow::Result<Vec<CalorieIntake>> {
        self.select_intakes(
            &format!(
                "{SELECT_INTAKE} WHERE user_id = $1 \
                 AND EXTRACT(MONTH FROM logged_at AT TIME ZONE 'UTC')::int = $2 \
                 ORDER BY logged_at"
            ),
            Filter::UserMonth(user_id, i32::from(u8::from(month))),
        )
        .await
    }
}
