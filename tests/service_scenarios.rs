//! End-to-end scenarios through the public facades over the in-memory store.

mod common;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use nutrilog::config::AppConfig;
use nutrilog::foods::{Food, Nutrition};
use nutrilog::intakes::CalorieIntake;
use nutrilog::meals::{compute_total_calories, Meal};
use nutrilog::memory::MemoryStore;
use nutrilog::users::User;
use nutrilog::{AppState, ServiceError};
use time::OffsetDateTime;

use common::{cheap_hasher, john, john_user, memory_state};

fn food(name: &str, calories: f64) -> Food {
    Food::new(name, "", Nutrition::new(1.0, 1.0, 1.0).unwrap(), calories).unwrap()
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut h = DefaultHasher::new();
    value.hash(&mut h);
    h.finish()
}

#[tokio::test]
async fn test_created_user_has_hashed_password_and_can_log_in() {
    let state = memory_state();
    let saved = state.users.create(john_user()).await.unwrap();

    let stored = state
        .users
        .get_by_id(saved.id().unwrap())
        .await
        .unwrap()
        .expect("user stored");
    assert_ne!(stored.password(), "password123");

    let logged_in = state
        .users
        .login("john@example.com", "password123")
        .await
        .unwrap();
    assert_eq!(logged_in.id(), saved.id());

    let err = state
        .users
        .login("john@example.com", "password124")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Authentication));
}

#[tokio::test]
async fn test_out_of_range_age_is_rejected_and_nothing_is_stored() {
    let state = memory_state();
    for age in [17, 101] {
        let mut input = john();
        input.age = age;
        let err = state.users.register(input).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref v) if v.field == "age"));
    }
    assert!(state.users.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_breakfast_totals_150_calories() {
    let state = memory_state();
    let owner = state.users.register(john()).await.unwrap();
    let meal = Meal::new(
        "Breakfast",
        owner,
        vec![food("Eggs", 100.0), food("Toast", 50.0)],
    )
    .unwrap();
    assert_eq!(compute_total_calories(&meal), 150.0);

    let saved = state.meals.create(meal).await.unwrap();
    assert_eq!(saved.total_calories(), 150.0);
}

#[tokio::test]
async fn test_empty_meal_totals_zero() {
    let state = memory_state();
    let owner = state.users.register(john()).await.unwrap();
    let saved = state
        .meals
        .create(Meal::new("Fast", owner, vec![]).unwrap())
        .await
        .unwrap();
    assert_eq!(saved.total_calories(), 0.0);
}

#[tokio::test]
async fn test_update_of_absent_user_is_not_found() {
    // A user saved elsewhere carries an id this store has never seen.
    let elsewhere = memory_state();
    let foreign: User = elsewhere.users.register(john()).await.unwrap();

    let state = memory_state();
    let err = state.users.update(foreign.clone()).await.unwrap_err();
    match err {
        ServiceError::NotFound { entity, id } => {
            assert_eq!(entity, "User");
            assert_eq!(Some(id), foreign.id());
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert!(state.users.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_meals_with_same_foods_are_equal_and_hash_equal() {
    let state = memory_state();
    let owner = state.users.register(john()).await.unwrap();
    let foods = state
        .foods
        .create_all(vec![food("Eggs", 100.0), food("Toast", 50.0)])
        .await
        .unwrap();

    let a = Meal::new("Breakfast", owner.clone(), foods.clone()).unwrap();
    let b = Meal::new("Breakfast", owner.clone(), foods.clone()).unwrap();
    assert_eq!(a, b);
    assert_eq!(hash_of(&a), hash_of(&b));

    let mut changed = foods.clone();
    changed[1].set_calories(60.0).unwrap();
    let c = Meal::new("Breakfast", owner, changed).unwrap();
    assert_ne!(a, c);
}

#[tokio::test]
async fn test_delete_all_empties_every_family_and_deletes_are_idempotent() {
    let state = memory_state();
    let owner = state.users.register(john()).await.unwrap();
    let meal = state
        .meals
        .create(Meal::new("Breakfast", owner.clone(), vec![food("Eggs", 100.0)]).unwrap())
        .await
        .unwrap();
    let eggs = meal.foods()[0].clone();
    let intake = state
        .intakes
        .create(CalorieIntake::new(meal.clone(), owner.clone(), eggs.clone()).unwrap())
        .await
        .unwrap();

    let intake_id = intake.id().unwrap();
    state.intakes.delete_by_id(intake_id).await.unwrap();
    state.intakes.delete_by_id(intake_id).await.unwrap();

    state.intakes.delete_all().await.unwrap();
    state.meals.delete_all().await.unwrap();
    state.foods.delete_all().await.unwrap();
    state.users.delete_all().await.unwrap();

    assert!(state.intakes.get_all().await.unwrap().is_empty());
    assert!(state.meals.get_all().await.unwrap().is_empty());
    assert!(state.foods.get_all().await.unwrap().is_empty());
    assert!(state.users.get_all().await.unwrap().is_empty());

    state.users.delete_all().await.unwrap();
}

#[tokio::test]
async fn test_deleting_a_user_removes_their_meals_and_intakes() {
    let state = memory_state();
    let owner = state.users.register(john()).await.unwrap();
    let meal = state
        .meals
        .create(Meal::new("Lunch", owner.clone(), vec![food("Rice", 200.0)]).unwrap())
        .await
        .unwrap();
    state
        .intakes
        .create(CalorieIntake::new(meal.clone(), owner.clone(), meal.foods()[0].clone()).unwrap())
        .await
        .unwrap();

    state.users.delete_by_id(owner.id().unwrap()).await.unwrap();

    assert!(state.meals.get_all().await.unwrap().is_empty());
    assert!(state.intakes.get_all().await.unwrap().is_empty());
    assert_eq!(state.foods.get_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_monthly_calories_follow_logged_intakes() {
    let state = memory_state();
    let owner = state.users.register(john()).await.unwrap();
    let meal = state
        .meals
        .create(
            Meal::new(
                "Breakfast",
                owner.clone(),
                vec![food("Eggs", 100.0), food("Toast", 50.0)],
            )
            .unwrap(),
        )
        .await
        .unwrap();
    for f in meal.foods() {
        state
            .intakes
            .create(CalorieIntake::new(meal.clone(), owner.clone(), f.clone()).unwrap())
            .await
            .unwrap();
    }

    let month = OffsetDateTime::now_utc().month();
    let total = state
        .intakes
        .monthly_calories(owner.id().unwrap(), month)
        .await
        .unwrap();
    assert_eq!(total, 150.0);
}

#[tokio::test]
async fn test_oversized_inactivity_window_is_rejected_without_deleting() {
    let config = AppConfig {
        inactive_after_days: i64::MAX,
        ..AppConfig::default()
    };
    let state = AppState::from_parts(config, MemoryStore::new(), cheap_hasher());
    state.users.register(john()).await.unwrap();

    let err = state
        .users
        .delete_inactive(OffsetDateTime::now_utc())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(state.users.get_all().await.unwrap().len(), 1);
}
