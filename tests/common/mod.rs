use std::sync::Arc;

use nutrilog::auth::Argon2Hasher;
use nutrilog::users::{NewUser, Role, User};
use nutrilog::AppState;

/// Argon2 with the smallest legal costs; digests still verify normally.
#[allow(dead_code)]
pub fn cheap_hasher() -> Arc<Argon2Hasher> {
    Arc::new(Argon2Hasher::with_costs(1024, 1, 1).expect("valid argon2 params"))
}

#[allow(dead_code)]
pub fn memory_state() -> AppState {
    AppState::in_memory(cheap_hasher())
}

#[allow(dead_code)]
pub fn john() -> NewUser {
    NewUser {
        name: "John".into(),
        password: "password123".into(),
        age: 25,
        weight: 80,
        height: 1.8,
        calorie_goal: 2200,
        email: "john@example.com".into(),
        phone: "1234567890".into(),
        role: Role::Member,
    }
}

#[allow(dead_code)]
pub fn john_user() -> User {
    User::try_from(john()).expect("valid fixture")
}

/// Check if a Postgres test database is configured.
#[allow(dead_code)]
pub fn database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL").ok()
}

/// Skip test with message if no test database is configured.
#[macro_export]
macro_rules! require_database {
    () => {
        match crate::common::database_url() {
            Some(url) => url,
            None => {
                eprintln!("Skipping: TEST_DATABASE_URL not set");
                return;
            }
        }
    };
}
