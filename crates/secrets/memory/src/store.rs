use async_trait::async_trait;
use dashmap::DashMap;

use stormbridge_core::Credential;
use stormbridge_secrets::error::SecretStoreError;
use stormbridge_secrets::store::SecretStore;

/// In-memory [`SecretStore`] backed by a [`DashMap`].
///
/// Secrets are held in cleartext in process memory and are not persisted to
/// disk. This is the development/reference backend; deployments wanting
/// at-rest protection should use a keyring or vault backend instead.
#[derive(Debug, Default)]
pub struct ClearTextSecretStore {
    associations: DashMap<String, Credential>,
}

impl ClearTextSecretStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for ClearTextSecretStore {
    async fn setup(&self) -> Result<(), SecretStoreError> {
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Credential>, SecretStoreError> {
        Ok(self
            .associations
            .get(session_id)
            .map(|entry| entry.value().clone()))
    }

    async fn set(&self, session_id: &str, secret: Credential) -> Result<(), SecretStoreError> {
        self.associations.insert(session_id.to_owned(), secret);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, SecretStoreError> {
        Ok(self.associations.remove(session_id).is_some())
    }

    async fn teardown(&self) -> Result<(), SecretStoreError> {
        self.associations.clear();
        Ok(())
    }
}
