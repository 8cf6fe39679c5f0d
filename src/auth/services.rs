use tracing::{error, info, instrument, warn};

use crate::auth::password::CredentialHasher;
use crate::error::{Result, ServiceError};
use crate::users::{User, UserRepo};
use crate::validation::normalize_email;

/// Looks the user up by email and checks the password against the stored digest.
///
/// Every way this can fail short of a storage error comes back as
/// [`ServiceError::Authentication`], so callers cannot tell which factor was wrong.
#[instrument(skip(users, hasher, password))]
pub async fn authenticate(
    users: &dyn UserRepo,
    hasher: &dyn CredentialHasher,
    email: &str,
    password: &str,
) -> Result<User> {
    let email = match normalize_email(email) {
        Ok(e) => e,
        Err(_) => {
            warn!(email, "login with malformed email");
            return Err(ServiceError::Authentication);
        }
    };

    let user = match users.find_by_email(&email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %email, "login unknown email");
            return Err(ServiceError::Authentication);
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err(ServiceError::Persistence(e));
        }
    };

    let ok = match hasher.verify(password, user.password()) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, user_id = ?user.id(), "stored digest could not be verified");
            false
        }
    };

    if !ok {
        warn!(email = %email, user_id = ?user.id(), "login invalid password");
        return Err(ServiceError::Authentication);
    }

    info!(user_id = ?user.id(), "user logged in");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Argon2Hasher;
    use crate::memory::MemoryStore;
    use crate::repository::Repository;
    use crate::users::repo_types::fixtures::user;

    async fn stored_user(store: &MemoryStore, hasher: &Argon2Hasher) -> User {
        let mut u = user("john@example.com");
        let digest = hasher.hash("password123").unwrap();
        u.replace_password_digest(digest);
        Repository::<User>::save(store, u).await.unwrap()
    }

    fn hasher() -> Argon2Hasher {
        Argon2Hasher::with_costs(1024, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn matching_password_returns_the_user() {
        let (store, hasher) = (MemoryStore::new(), hasher());
        let saved = stored_user(&store, &hasher).await;
        let found = authenticate(&store, &hasher, " JOHN@example.com", "password123")
            .await
            .unwrap();
        assert_eq!(found.id(), saved.id());
    }

    #[tokio::test]
    async fn every_miss_is_the_same_failure() {
        let (store, hasher) = (MemoryStore::new(), hasher());
        stored_user(&store, &hasher).await;

        for (email, password) in [
            ("john@example.com", "wrong"),
            ("jane@example.com", "password123"),
            ("not an email", "password123"),
        ] {
            let err = authenticate(&store, &hasher, email, password)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::Authentication), "{email}");
        }
    }

    #[tokio::test]
    async fn unparseable_digest_is_an_authentication_failure() {
        let (store, hasher) = (MemoryStore::new(), hasher());
        let mut u = user("john@example.com");
        u.replace_password_digest("plaintext-left-behind".into());
        Repository::<User>::save(&store, u).await.unwrap();

        let err = authenticate(&store, &hasher, "john@example.com", "plaintext-left-behind")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Authentication));
    }

    #[tokio::test]
    async fn storage_failure_is_not_hidden() {
        let err = authenticate(
            &MemoryStore::unavailable(),
            &hasher(),
            "john@example.com",
            "password123",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Persistence(_)));
    }
}
