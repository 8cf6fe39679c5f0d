use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::PgStore;
use crate::repository::Repository;
use crate::users::repo_types::{Role, User, UserRow};

/// User-specific queries on top of the generic gateway.
#[async_trait]
pub trait UserRepo: Repository<User> {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn find_by_role(&self, role: Role) -> anyhow::Result<Vec<User>>;

    async fn find_with_calorie_goal_above(&self, threshold: i32) -> anyhow::Result<Vec<User>>;

    async fn find_with_calorie_goal_below(&self, threshold: i32) -> anyhow::Result<Vec<User>>;

    /// Returns `false` when no user has this id.
    async fn update_last_login(&self, id: Uuid, at: OffsetDateTime) -> anyhow::Result<bool>;

    /// Deletes users whose last login (or creation, if they never logged in) is older
    /// than `cutoff`; returns how many were removed.
    async fn delete_inactive_since(&self, cutoff: OffsetDateTime) -> anyhow::Result<u64>;
}

const SELECT_USER: &str = r#"
    SELECT id, name, password_hash, age, weight, height, calorie_goal,
           email, phone, role, created_at, last_login
    FROM users
"#;

pub(crate) async fn fetch_user(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await
        .context("select user by id")?;
    decode(row)
}

fn decode(row: Option<UserRow>) -> anyhow::Result<Option<User>> {
    row.map(User::try_from)
        .transpose()
        .context("decode user row")
}

fn decode_all(rows: Vec<UserRow>) -> anyhow::Result<Vec<User>> {
    rows.into_iter()
        .map(User::try_from)
        .collect::<Result<Vec<_>, _>>()
        .context("decode user rows")
}

async fn upsert_user(conn: &mut PgConnection, mut user: User) -> anyhow::Result<User> {
    let id = user.id().unwrap_or_else(Uuid::new_v4);
    sqlx::query(
        r#"
        INSERT INTO users (id, name, password_hash, age, weight, height, calorie_goal,
                           email, phone, role, created_at, last_login)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            password_hash = EXCLUDED.password_hash,
            age = EXCLUDED.age,
            weight = EXCLUDED.weight,
            height = EXCLUDED.height,
            calorie_goal = EXCLUDED.calorie_goal,
            email = EXCLUDED.email,
            phone = EXCLUDED.phone,
            role = EXCLUDED.role,
            last_login = EXCLUDED.last_login
        "#,
    )
    .bind(id)
    .bind(user.name())
    .bind(user.password())
    .bind(user.age())
    .bind(user.weight())
    .bind(user.height())
    .bind(user.calorie_goal())
    .bind(user.email())
    .bind(user.contact().phone())
    .bind(user.role().as_str())
    .bind(user.created_at())
    .bind(user.last_login())
    .execute(conn)
    .await
    .context("upsert user")?;
    user.assign_id(id);
    Ok(user)
}

#[async_trait]
impl Repository<User> for PgStore {
    async fn save(&self, user: User) -> anyhow::Result<User> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        upsert_user(&mut conn, user).await
    }

    async fn save_all(&self, users: Vec<User>) -> anyhow::Result<Vec<User>> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        let mut saved = Vec::with_capacity(users.len());
        for user in users {
            saved.push(upsert_user(&mut tx, user).await?);
        }
        tx.commit().await.context("commit tx")?;
        Ok(saved)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        fetch_user(&mut conn, id).await
    }

    async fn find_all(&self) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} ORDER BY created_at"))
            .fetch_all(&self.pool)
            .await
            .context("select users")?;
        decode_all(rows)
    }

    async fn exists_by_id(&self, id: Uuid) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .context("user exists")?;
        Ok(exists)
    }

    async fn delete_by_id(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete user")?;
        Ok(())
    }

    async fn delete_all(&self) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users")
            .execute(&self.pool)
            .await
            .context("delete users")?;
        Ok(())
    }
}

#[async_trait]
impl UserRepo for PgStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("select user by email")?;
        decode(row)
    }

    async fn find_by_role(&self, role: Role) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "{SELECT_USER} WHERE role = $1 ORDER BY created_at"
        ))
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .context("select users by role")?;
        decode_all(rows)
    }

    async fn find_with_calorie_goal_above(&self, threshold: i32) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "{SELECT_USER} WHERE calorie_goal > $1 ORDER BY created_at"
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
        .context("select users above calorie goal")?;
        decode_all(rows)
    }

    async fn find_with_calorie_goal_below(&self, threshold: i32) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "{SELECT_USER} WHERE calorie_goal < $1 ORDER BY created_at"
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
        .context("select users below calorie goal")?;
        decode_all(rows)
    }

    async fn update_last_login(&self, id: Uuid, at: OffsetDateTime) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .context("update last login")?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_inactive_since(&self, cutoff: OffsetDateTime) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM users WHERE COALESCE(last_login, created_at) < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("delete inactive users")?;
        Ok(res.rows_affected())
    }
}
