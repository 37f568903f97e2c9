use serde::{Deserialize, Serialize};

/// Coarse classification shared by every error type in the workspace.
///
/// Callers use the kind to decide whether a failure is worth retrying
/// instead of matching on error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing input. Never retryable.
    Validation,
    /// An external collaborator failed or timed out.
    Dependency,
    /// The payment gateway rejected or failed a charge.
    Payment,
    /// The inventory service failed to reserve stock.
    Inventory,
    /// A compensation action exhausted its retries.
    CompensationFailure,
    /// The transaction ledger could not be read or written.
    Persistence,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Returns true if repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::Dependency
            | ErrorKind::Payment
            | ErrorKind::Inventory
            | ErrorKind::Persistence => true,
            ErrorKind::Validation | ErrorKind::CompensationFailure | ErrorKind::Internal => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Dependency => "dependency",
            ErrorKind::Payment => "payment",
            ErrorKind::Inventory => "inventory",
            ErrorKind::CompensationFailure => "compensation_failure",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Dependency.is_retryable());
        assert!(ErrorKind::Payment.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::CompensationFailure.is_retryable());
    }

    #[test]
    fn test_wire_name_matches_as_str() {
        for kind in [
            ErrorKind::Validation,
            ErrorKind::Dependency,
            ErrorKind::CompensationFailure,
            ErrorKind::Internal,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
