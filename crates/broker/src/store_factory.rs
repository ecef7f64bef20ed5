use std::sync::Arc;

use tracing::{debug, warn};

use stormbridge_secrets::SecretStore;
use stormbridge_secrets_memory::ClearTextSecretStore;

/// Construct the secret store backend selected by configuration.
///
/// Unknown selectors fall back to the in-memory clear-text backend with a
/// warning rather than failing startup.
pub fn create_secret_store(selector: &str) -> Arc<dyn SecretStore> {
    debug!(selector, "creating secret store backend");
    match selector {
        "cleartext" => Arc::new(ClearTextSecretStore::new()),
        other => {
            warn!(
                selector = other,
                "unknown secret store backend, falling back to cleartext"
            );
            Arc::new(ClearTextSecretStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use stormbridge_core::Credential;

    use super::*;

    #[tokio::test]
    async fn cleartext_backend_round_trips() {
        let store = create_secret_store("cleartext");
        store.setup().await.unwrap();
        store.set("id", Credential::token("t")).await.unwrap();
        assert_eq!(
            store.get("id").await.unwrap(),
            Some(Credential::token("t"))
        );
    }

    #[tokio::test]
    async fn unknown_selector_falls_back_to_cleartext() {
        let store = create_secret_store("vault");
        store.set("id", Credential::token("t")).await.unwrap();
        assert!(store.get("id").await.unwrap().is_some());
    }
}
