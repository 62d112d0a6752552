//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error categories.
///
/// Domain crates keep their own detailed error enums and convert into this
/// type at the boundary consumed by outer surfaces (routers, job runners).
#[derive(Debug, Error)]
pub enum AppError {
    /// Input rejected by a business rule; never retried automatically.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found, or not owned by the current tenant.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not allowed in the resource's current state.
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Lost a race that an internal retry could not resolve.
    #[error("Concurrency conflict: {0}")]
    Concurrency(String),

    /// Storage backend failure.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code an outer router should use for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::InvalidStateTransition(_) | Self::Concurrency(_) => 409,
            Self::Persistence(_) | Self::Configuration(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            Self::Concurrency(_) => "CONCURRENCY_ERROR",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AppError::Validation(String::new()).status_code(), 400);
        assert_eq!(AppError::NotFound(String::new()).status_code(), 404);
        assert_eq!(
            AppError::InvalidStateTransition(String::new()).status_code(),
            409
        );
        assert_eq!(AppError::Concurrency(String::new()).status_code(), 409);
        assert_eq!(AppError::Persistence(String::new()).status_code(), 500);
        assert_eq!(AppError::Configuration(String::new()).status_code(), 500);
        assert_eq!(AppError::Internal(String::new()).status_code(), 500);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::Validation(String::new()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(AppError::NotFound(String::new()).error_code(), "NOT_FOUND");
        assert_eq!(
            AppError::InvalidStateTransition(String::new()).error_code(),
            "INVALID_STATE_TRANSITION"
        );
        assert_eq!(
            AppError::Concurrency(String::new()).error_code(),
            "CONCURRENCY_ERROR"
        );
        assert_eq!(
            AppError::Persistence(String::new()).error_code(),
            "PERSISTENCE_ERROR"
        );
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::Validation("msg".into()).to_string(),
            "Validation error: msg"
        );
        assert_eq!(
            AppError::NotFound("msg".into()).to_string(),
            "Not found: msg"
        );
        assert_eq!(
            AppError::InvalidStateTransition("msg".into()).to_string(),
            "Invalid state transition: msg"
        );
        assert_eq!(
            AppError::Persistence("msg".into()).to_string(),
            "Persistence error: msg"
        );
    }
}
