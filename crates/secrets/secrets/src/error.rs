use thiserror::Error;

/// Errors from secret store operations.
#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend error: {0}")]
    Backend(String),
}
