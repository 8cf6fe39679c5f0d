pub mod password;
pub mod services;

pub use password::{Argon2Hasher, CredentialHasher};
pub use services::authenticate;
