//! Dataset registry and download hook errors.

/// Configuration errors detected before any dataset is fetched.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Two descriptors share an identifier
    #[error("dataset {0} is registered more than once")]
    DuplicateIdentifier(String),

    /// A linked dataset names something that isn't registered
    #[error("dataset {dataset} links to unknown dataset {linked}")]
    UnknownLinkedDataset { dataset: String, linked: String },

    /// Linked datasets form a loop
    #[error("linked datasets form a cycle: {}", path.join(" -> "))]
    DependencyCycle { path: Vec<String> },

    /// A download hook needs a credential that isn't available
    #[error("dataset {dataset} needs credential {credential}, which is not set")]
    MissingCredential { dataset: String, credential: String },

    /// The registry file couldn't be read or decoded
    #[error("failed to load dataset registry: {message}")]
    Load { message: String },
}

/// Errors raised while a download hook prepares a request.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// A credential disappeared between validation and use
    #[error("credential {0} is not set")]
    MissingCredential(String),

    /// The login exchange failed
    #[error("login failed: {message}")]
    Login { message: String },

    /// A credential or token can't be placed in a header
    #[error("value for header {0} is not a valid header value")]
    InvalidHeader(String),

    /// HTTP request failed during login
    #[error("HTTP error during login: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_display_shows_path() {
        let err = RegistryError::DependencyCycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "linked datasets form a cycle: a -> b -> a");
    }

    #[test]
    fn missing_credential_display() {
        let err = RegistryError::MissingCredential {
            dataset: "gb-dft-bods-gtfs-schedule".into(),
            credential: "TRANSIT_BODS_API_KEY".into(),
        };
        assert_eq!(
            err.to_string(),
            "dataset gb-dft-bods-gtfs-schedule needs credential TRANSIT_BODS_API_KEY, which is not set"
        );
    }
}
