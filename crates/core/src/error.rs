// Central Error Type for the Resource Handler

use thiserror::Error;

/// Stable error code, independent of the message text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotImplemented,
    NotAnArray,
    NoResourceHandler,
    AcquisitionFailed,
    OperationFailed,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotImplemented => "NOT_IMPLEMENTED",
            ErrorKind::NotAnArray => "NOT_AN_ARRAY",
            ErrorKind::NoResourceHandler => "NO_RESOURCE_HANDLER",
            ErrorKind::AcquisitionFailed => "ACQUISITION_FAILED",
            ErrorKind::OperationFailed => "OPERATION_FAILED",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handler-level error type
///
/// Clone is required: a single acquisition outcome is delivered to every
/// caller that joined it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// A contract operation or a requested method is missing on the owner
    #[error("NOT_IMPLEMENTED: {operation} must be implemented on {owner}")]
    NotImplemented { operation: String, owner: String },

    #[error("NOT_AN_ARRAY: {0}")]
    NotAnArray(String),

    /// The handler was destroyed while the job was in flight
    #[error("NO_RESOURCE_HANDLER: resource handler is gone")]
    NoResourceHandler,

    #[error("ACQUISITION_FAILED: {0}")]
    Acquisition(String),

    #[error("OPERATION_FAILED: {0}")]
    Operation(String),

    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl HandlerError {
    pub fn not_implemented(operation: impl Into<String>, owner: impl Into<String>) -> Self {
        HandlerError::NotImplemented {
            operation: operation.into(),
            owner: owner.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::NotImplemented { .. } => ErrorKind::NotImplemented,
            HandlerError::NotAnArray(_) => ErrorKind::NotAnArray,
            HandlerError::NoResourceHandler => ErrorKind::NoResourceHandler,
            HandlerError::Acquisition(_) => ErrorKind::AcquisitionFailed,
            HandlerError::Operation(_) => ErrorKind::OperationFailed,
            HandlerError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Contract violations are programming errors and always fail the job
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, HandlerError::NotImplemented { .. })
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::Operation(format!("serialization: {err}"))
    }
}

/// Result type alias using HandlerError
pub type Result<T> = std::result::Result<T, HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes() {
        assert_eq!(
            HandlerError::not_implemented("ping", "Echo").kind().as_str(),
            "NOT_IMPLEMENTED"
        );
        assert_eq!(
            HandlerError::NotAnArray("x".into()).kind(),
            ErrorKind::NotAnArray
        );
        assert_eq!(
            HandlerError::NoResourceHandler.kind().to_string(),
            "NO_RESOURCE_HANDLER"
        );
    }

    #[test]
    fn test_not_implemented_names_operation_and_owner() {
        let err = HandlerError::not_implemented("acquire_resource", "my::Owner");
        let msg = err.to_string();
        assert!(msg.contains("acquire_resource"));
        assert!(msg.contains("my::Owner"));
        assert!(err.is_contract_violation());
        assert!(!HandlerError::Acquisition("refused".into()).is_contract_violation());
    }
}
