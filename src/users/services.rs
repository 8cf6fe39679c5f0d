use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{authenticate, CredentialHasher};
use crate::error::{persistence, Result, ServiceError};
use crate::users::{NewUser, Role, User, UserRepo};
use crate::validation::{normalize_email, ValidationError};

/// User facade. The only facade that touches credentials.
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepo>,
    hasher: Arc<dyn CredentialHasher>,
    inactive_after: Duration,
    calorie_goal_threshold: i32,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepo>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self {
            repo,
            hasher,
            inactive_after: Duration::days(182),
            calorie_goal_threshold: 2000,
        }
    }

    pub fn with_inactive_after(mut self, window: Duration) -> Self {
        self.inactive_after = window;
        self
    }

    pub fn with_calorie_goal_threshold(mut self, threshold: i32) -> Self {
        self.calorie_goal_threshold = threshold;
        self
    }

    fn hash(&self, user: &mut User) -> Result<()> {
        let digest = self.hasher.hash(user.password()).map_err(|e| {
            error!(error = %e, "password hashing failed");
            ServiceError::Credential(e.to_string())
        })?;
        user.replace_password_digest(digest);
        Ok(())
    }

    /// Validates, hashes the plaintext password once, and stores the user.
    /// A user that already has an id goes through `update` instead.
    #[instrument(skip(self, user), fields(email = %user.email()))]
    pub async fn create(&self, mut user: User) -> Result<User> {
        if user.id().is_some() {
            warn!("create of saved user");
            return Err(ValidationError::new("id", "user is already saved").into());
        }
        if let Err(e) = user.validate() {
            warn!(field = e.field, "user rejected");
            return Err(e.into());
        }
        self.hash(&mut user)?;
        let saved = self.repo.save(user).await.map_err(persistence("save user"))?;
        info!(user_id = ?saved.id(), "user created");
        Ok(saved)
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: NewUser) -> Result<User> {
        let user = User::try_from(input).map_err(|e| {
            warn!(field = e.field, "registration rejected");
            ServiceError::from(e)
        })?;
        self.create(user).await
    }

    /// Fails with `NotFound` when the user is not stored; nothing is written then.
    /// The stored digest is kept if the password field still holds it.
    #[instrument(skip(self, user), fields(user_id = ?user.id()))]
    pub async fn update(&self, mut user: User) -> Result<User> {
        let Some(id) = user.id() else {
            warn!("update of unsaved user");
            return Err(ValidationError::new("id", "user has not been saved").into());
        };
        if let Err(e) = user.validate() {
            warn!(field = e.field, "user rejected");
            return Err(e.into());
        }
        let stored = self
            .repo
            .find_by_id(id)
            .await
            .map_err(persistence("find user"))?;
        let Some(stored) = stored else {
            warn!("update of unknown user");
            return Err(ServiceError::not_found("User", id));
        };
        if user.password() != stored.password() {
            self.hash(&mut user)?;
        }
        let saved = self.repo.save(user).await.map_err(persistence("save user"))?;
        info!("user updated");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.repo.find_by_id(id).await.map_err(persistence("find user"))
    }

    #[instrument(skip(self))]
    pub async fn get_all(&self) -> Result<Vec<User>> {
        self.repo.find_all().await.map_err(persistence("list users"))
    }

    #[instrument(skip(self))]
    pub async fn delete_by_id(&self, id: Uuid) -> Result<()> {
        self.repo
            .delete_by_id(id)
            .await
            .map_err(persistence("delete user"))?;
        info!("user deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_all(&self) -> Result<()> {
        self.repo
            .delete_all()
            .await
            .map_err(persistence("delete users"))?;
        info!("all users deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email)?;
        self.repo
            .find_by_email(&email)
            .await
            .map_err(persistence("find user by email"))
    }

    #[instrument(skip(self))]
    pub async fn find_by_role(&self, role: Role) -> Result<Vec<User>> {
        self.repo
            .find_by_role(role)
            .await
            .map_err(persistence("find users by role"))
    }

    #[instrument(skip(self))]
    pub async fn find_with_calorie_goal_above(&self, threshold: i32) -> Result<Vec<User>> {
        self.repo
            .find_with_calorie_goal_above(threshold)
            .await
            .map_err(persistence("find users above calorie goal"))
    }

    #[instrument(skip(self))]
    pub async fn find_with_calorie_goal_below(&self, threshold: i32) -> Result<Vec<User>> {
        self.repo
            .find_with_calorie_goal_below(threshold)
            .await
            .map_err(persistence("find users below calorie goal"))
    }

    /// Users whose calorie goal is above the configured threshold.
    pub async fn high_consumption_users(&self) -> Result<Vec<User>> {
        self.find_with_calorie_goal_above(self.calorie_goal_threshold)
            .await
    }

    /// Users whose calorie goal is below the configured threshold.
    pub async fn low_consumption_users(&self) -> Result<Vec<User>> {
        self.find_with_calorie_goal_below(self.calorie_goal_threshold)
            .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        authenticate(self.repo.as_ref(), self.hasher.as_ref(), email, password).await
    }

    #[instrument(skip(self))]
    pub async fn record_login(&self, id: Uuid) -> Result<()> {
        let found = self
            .repo
            .update_last_login(id, OffsetDateTime::now_utc())
            .await
            .map_err(persistence("record login"))?;
        if !found {
            warn!("login recorded for unknown user");
            return Err(ServiceError::not_found("User", id));
        }
        Ok(())
    }

    /// Removes users with no login inside the inactivity window ending at `now`.
    #[instrument(skip(self))]
    pub async fn delete_inactive(&self, now: OffsetDateTime) -> Result<u64> {
        if !self.inactive_after.is_positive() {
            warn!(window = %self.inactive_after, "inactivity window must be positive");
            return Err(ValidationError::new("inactive_after", "must be positive").into());
        }
        let Some(cutoff) = now.checked_sub(self.inactive_after) else {
            warn!(window = %self.inactive_after, "inactivity window out of range");
            return Err(ValidationError::new("inactive_after", "is out of range").into());
        };
        let removed = self
            .repo
            .delete_inactive_since(cutoff)
            .await
            .map_err(persistence("delete inactive users"))?;
        info!(removed, %cutoff, "inactive users deleted");
        Ok(removed)
    }
}
