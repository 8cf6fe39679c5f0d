pub mod repo;
pub mod repo_types;
pub mod services;

pub use repo::IntakeRepo;
pub use repo_types::CalorieIntake;
pub use services::IntakeService;
