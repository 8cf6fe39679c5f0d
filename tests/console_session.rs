//! Scripted operator sessions against the console over an in-memory store.

mod common;

use nutrilog::console::{Console, Prompter};
use nutrilog::AppState;

use common::{john, memory_state};

async fn run_script(state: &AppState, script: &str) -> (String, bool) {
    let prompter = Prompter::new(script.as_bytes(), Vec::new());
    let mut console = Console::new(state.clone(), prompter);
    console.run().await.expect("session runs to completion");
    let output = String::from_utf8(console.prompter().output().clone()).unwrap();
    (output, console.signed_in().is_some())
}

#[tokio::test]
async fn test_register_add_foods_and_build_a_meal() {
    let state = memory_state();
    let script = "\
2
John
password123
17
25
80
1.8
2200
john@example.com
1234567890
2
1
Eggs
Free range
abc
6
5
0.6
100
1
Toast

3
1
14
50
4
6
1
1
Breakfast
1,2
4
6
3
";
    let (output, signed_in) = run_script(&state, script).await;

    assert!(signed_in);
    assert!(output.contains("Invalid age"), "{output}");
    assert!(output.contains("Please enter a number."), "{output}");
    assert!(output.contains("Welcome, John."), "{output}");
    assert!(output.contains("Breakfast - 150 kcal [Eggs, Toast]"), "{output}");
    assert!(output.ends_with("Goodbye.\n"));

    let meals = state.meals.get_all().await.unwrap();
    assert_eq!(meals.len(), 1);
    assert_eq!(meals[0].total_calories(), 150.0);

    let foods = state.foods.get_all().await.unwrap();
    assert_eq!(foods.len(), 2);
    assert!(
        output.contains("Saved Eggs - 100 kcal (P 6.0 g, F 5.0 g, C 0.6 g)."),
        "{output}"
    );
    let eggs = foods.iter().find(|f| f.name() == "Eggs").unwrap();
    assert_eq!(eggs.nutrition().protein(), 6.0);
    assert_eq!(eggs.nutrition().fat(), 5.0);
    assert_eq!(eggs.nutrition().carbohydrates(), 0.6);
}

#[tokio::test]
async fn test_wrong_password_stays_signed_out_until_input_ends() {
    let state = memory_state();
    state.users.register(john()).await.unwrap();

    let script = "\
1
john@example.com
not-the-password
";
    let (output, signed_in) = run_script(&state, script).await;

    assert!(!signed_in);
    assert!(output.contains("Error: Invalid credentials"), "{output}");
    assert!(output.ends_with("Goodbye.\n"));
}

#[tokio::test]
async fn test_login_records_last_login_and_delete_all_foods() {
    let state = memory_state();
    let registered = state.users.register(john()).await.unwrap();
    assert!(registered.last_login().is_none());

    let script = "\
1
john@example.com
password123
2
1
Apple

0.3
0.2
14
52
5
y
4
6
3
";
    let (output, signed_in) = run_script(&state, script).await;

    assert!(signed_in);
    assert!(output.contains("All foods deleted."), "{output}");
    assert!(output.contains("No foods."), "{output}");
    assert!(state.foods.get_all().await.unwrap().is_empty());

    let stored = state
        .users
        .get_by_id(registered.id().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(stored.last_login().is_some());
}

#[tokio::test]
async fn test_update_and_delete_meal_from_menu() {
    let state = memory_state();
    state.users.register(john()).await.unwrap();

    let script = "\
1
john@example.com
password123
2
1
Rice

2
0
28
130
1
Beans

9
0.5
21
120
6
1
1
Lunch
2
2
1
Dinner
y
1,2
4
3
1
6
3
";
    let (output, _) = run_script(&state, script).await;

    assert!(output.contains("Saved Lunch - 130 kcal [Rice]."), "{output}");
    assert!(output.contains("Updated Dinner - 250 kcal [Beans, Rice]."), "{output}");
    assert!(output.contains("Deleted Dinner."), "{output}");
    assert!(state.meals.get_all().await.unwrap().is_empty());
    assert_eq!(state.foods.get_all().await.unwrap().len(), 2);
}
