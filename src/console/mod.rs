//! Text-menu front end driving the service facades.

pub mod menu;
pub mod prompt;

pub use menu::{Console, MenuAction, Screen};
pub use prompt::Prompter;
