pub mod calories;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use calories::{compute_total_calories, sum_intake_calories};
pub use repo::MealRepo;
pub use repo_types::Meal;
pub use services::MealService;
