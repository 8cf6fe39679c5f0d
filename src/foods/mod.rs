pub mod repo;
pub mod repo_types;
pub mod services;

pub use repo::FoodRepo;
pub use repo_types::{Food, Nutrition};
pub use services::FoodService;
