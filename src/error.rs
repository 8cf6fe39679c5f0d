//! Error taxonomy returned by every service facade.

use tracing::error;
use uuid::Uuid;

use crate::validation::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    /// Unknown email and wrong password are deliberately the same failure.
    #[error("Invalid credentials")]
    Authentication,

    #[error("Credential hashing failed: {0}")]
    Credential(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    /// Input problems the operator can fix by re-entering a value.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound { .. } | Self::Authentication
        )
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Logs a failed gateway call and wraps it as [`ServiceError::Persistence`].
pub(crate) fn persistence(op: &'static str) -> impl FnOnce(anyhow::Error) -> ServiceError {
    move |e| {
        error!(error = %e, op, "gateway call failed");
        ServiceError::Persistence(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_convert_and_stay_recoverable() {
        let err: ServiceError = ValidationError::new("age", "too young").into();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "Validation failed: age: too young");
    }

    #[test]
    fn persistence_errors_are_not_recoverable() {
        let err: ServiceError = anyhow::anyhow!("connection reset").into();
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn not_found_mentions_entity_and_id() {
        let id = Uuid::new_v4();
        let err = ServiceError::not_found("User", id);
        assert_eq!(err.to_string(), format!("User not found: {id}"));
    }
}
