//! Engine Error Types
//!
//! Defines the error taxonomy for the strata memory engine.

use thiserror::Error;

/// Engine result type alias
pub type StrataResult<T> = Result<T, StrataError>;

/// Engine errors
#[derive(Debug, Error)]
pub enum StrataError {
    /// Node id absent from every level
    #[error("memory node not found: {id}")]
    NotFound { id: String },

    /// Insert collided with an id already held by some level
    #[error("duplicate memory node id: {id}")]
    DuplicateId { id: String },

    /// Referenced parent does not exist at add time
    #[error("parent node does not exist: {id}")]
    InvalidParent { id: String },

    /// Weight or score outside [0, 1]
    #[error("invalid weight for {field}: {weight} is outside [0, 1]")]
    InvalidWeight { field: String, weight: f64 },

    /// A single snapshot entry could not be imported
    #[error("import entry {index} rejected: {message}")]
    ImportEntry { index: usize, message: String },

    /// Invalid operation
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigValidationError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StrataError {
    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a duplicate id error
    pub fn duplicate_id(id: impl Into<String>) -> Self {
        Self::DuplicateId { id: id.into() }
    }

    /// Create an invalid parent error
    pub fn invalid_parent(id: impl Into<String>) -> Self {
        Self::InvalidParent { id: id.into() }
    }

    /// Create an invalid weight error
    pub fn invalid_weight(field: impl Into<String>, weight: f64) -> Self {
        Self::InvalidWeight {
            field: field.into(),
            weight,
        }
    }

    /// Create an invalid operation error
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Check if this error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is a validation error raised before any mutation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidParent { .. } | Self::InvalidWeight { .. } | Self::InvalidOperation { .. }
        )
    }
}

/// Reject weights that are non-finite or outside [0, 1]
pub(crate) fn check_unit(field: &str, weight: f64) -> StrataResult<()> {
    if weight.is_finite() && (0.0..=1.0).contains(&weight) {
        Ok(())
    } else {
        Err(StrataError::invalid_weight(field, weight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = StrataError::not_found("node-123");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("node-123"));

        let err = StrataError::invalid_weight("connections", 1.5);
        assert!(err.is_validation());
        assert!(err.to_string().contains("1.5"));

        let err = StrataError::duplicate_id("abc");
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_check_unit() {
        assert!(check_unit("w", 0.0).is_ok());
        assert!(check_unit("w", 1.0).is_ok());
        assert!(check_unit("w", -0.01).is_err());
        assert!(check_unit("w", f64::NAN).is_err());
    }
}
