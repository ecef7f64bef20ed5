use async_trait::async_trait;

use stormbridge_core::Credential;

use crate::error::SecretStoreError;

/// Trait for storing per-session secrets, keyed by session id.
///
/// The session table holds no credential material itself; validated
/// StackStorm tokens and keys live behind this contract so backends (OS
/// keyring, vault) can be swapped without touching session logic.
/// Implementations must be `Send + Sync` and safe for concurrent access.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Prepare the backend for use.
    async fn setup(&self) -> Result<(), SecretStoreError>;

    /// Fetch the secret stored under `session_id`. Returns `None` if absent.
    async fn get(&self, session_id: &str) -> Result<Option<Credential>, SecretStoreError>;

    /// Store `secret` under `session_id`, replacing any previous value.
    async fn set(&self, session_id: &str, secret: Credential) -> Result<(), SecretStoreError>;

    /// Remove the secret under `session_id`. Returns `true` if one existed.
    async fn delete(&self, session_id: &str) -> Result<bool, SecretStoreError>;

    /// Release any backend resources.
    async fn teardown(&self) -> Result<(), SecretStoreError>;
}
