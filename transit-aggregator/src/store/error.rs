//! Store error types.

/// Errors reported by a store backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The backend failed to execute the operation
    #[error("store backend error: {message}")]
    Backend { message: String },

    /// A stored record couldn't be decoded into its entity type
    #[error("failed to decode stored {kind}: {message}")]
    Decode { kind: &'static str, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StoreError::Backend {
            message: "connection reset".into(),
        };
        assert_eq!(err.to_string(), "store backend error: connection reset");

        let err = StoreError::Decode {
            kind: "journey",
            message: "missing field `ServiceRef`".into(),
        };
        assert!(err.to_string().contains("stored journey"));
    }
}
