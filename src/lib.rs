//! Food and calorie tracking: validated entities, service facades over a
//! pluggable persistence gateway, and a console front end.

pub mod auth;
pub mod config;
pub mod console;
pub mod db;
pub mod error;
pub mod foods;
pub mod intakes;
pub mod meals;
pub mod memory;
pub mod repository;
pub mod state;
pub mod users;
pub mod validation;

pub use error::{Result, ServiceError};
pub use state::AppState;
