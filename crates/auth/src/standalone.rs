use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use stormbridge_core::{BridgeConfig, Credential};
use stormbridge_session::ManagerError;

use crate::api::St2Client;
use crate::handler::{AuthHandler, SessionAccess};

/// Standalone trust model.
///
/// The supplied credentials are validated directly against the StackStorm
/// auth/API endpoints; `bot_creds` is accepted for interface uniformity but
/// unused. This is also the model forced for the bridge's own
/// service-credential bootstrap, regardless of the configured trust model.
pub struct StandaloneAuthHandler {
    cfg: Arc<BridgeConfig>,
    api: St2Client,
}

impl StandaloneAuthHandler {
    pub fn new(cfg: Arc<BridgeConfig>) -> Self {
        let api = St2Client::new(cfg.verify_cert);
        Self { cfg, api }
    }
}

#[async_trait]
impl AuthHandler for StandaloneAuthHandler {
    fn name(&self) -> &'static str {
        "standalone"
    }

    async fn authenticate(
        &self,
        _chat_user: Option<&str>,
        user_creds: Option<&Credential>,
        _bot_creds: Option<&Credential>,
    ) -> Option<Credential> {
        let Some(creds) = user_creds else {
            warn!("no credentials supplied for standalone authentication");
            return None;
        };

        let token = match creds {
            Credential::UserCredentials { .. } => {
                self.api
                    .request_token(&self.cfg.auth_url, creds, self.cfg.user_token_ttl)
                    .await
            }
            Credential::Token { .. } => self.api.validate_token(&self.cfg.auth_url, creds).await,
            Credential::ApiKey { .. } => self.api.validate_api_key(&self.cfg.api_url, creds).await,
        };

        if token.is_none() {
            warn!(
                kind = creds.kind(),
                "failed to authenticate credentials against the StackStorm API"
            );
        }
        token
    }

    async fn pre_execution_authentication(
        &self,
        access: &dyn SessionAccess,
        _chat_user: &str,
    ) -> Result<Option<Credential>, ManagerError> {
        // Every execution runs with the bot's own cached token.
        access.token_for_user(access.bot_user_id()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockSt2Server;

    fn handler_for(auth_url: &str, api_url: &str) -> StandaloneAuthHandler {
        let cfg = BridgeConfig {
            auth_url: auth_url.to_owned(),
            api_url: api_url.to_owned(),
            ..BridgeConfig::default()
        };
        StandaloneAuthHandler::new(Arc::new(cfg))
    }

    #[tokio::test]
    async fn token_credential_validated_on_201() {
        let server = MockSt2Server::start().await;
        let handler = handler_for(&server.base_url, "http://localhost:1");
        let handle =
            tokio::spawn(async move { server.respond_once(201, r#"{"token":"abc"}"#).await });

        let token = handler
            .authenticate(None, Some(&Credential::token("candidate")), None)
            .await;
        handle.await.unwrap();

        assert_eq!(token, Some(Credential::token("abc")));
    }

    #[tokio::test]
    async fn token_credential_rejected_on_400() {
        let server = MockSt2Server::start().await;
        let handler = handler_for(&server.base_url, "http://localhost:1");
        let handle = tokio::spawn(async move {
            server
                .respond_once(400, r#"{"faultstring":"invalid token"}"#)
                .await;
        });

        let token = handler
            .authenticate(None, Some(&Credential::token("candidate")), None)
            .await;
        handle.await.unwrap();

        assert!(token.is_none());
    }

    #[tokio::test]
    async fn user_credentials_exchange_for_token() {
        let server = MockSt2Server::start().await;
        let handler = handler_for(&server.base_url, "http://localhost:1");
        let handle =
            tokio::spawn(async move { server.respond_once(201, r#"{"token":"issued"}"#).await });

        let token = handler
            .authenticate(None, Some(&Credential::user("st2admin", "pw")), None)
            .await;
        handle.await.unwrap();

        assert_eq!(token, Some(Credential::token("issued")));
    }

    #[tokio::test]
    async fn api_key_returned_when_valid() {
        let server = MockSt2Server::start().await;
        let handler = handler_for("http://localhost:1", &server.base_url);
        let handle = tokio::spawn(async move { server.respond_once(200, r"{}").await });

        let key = Credential::api_key("key-1");
        let token = handler.authenticate(None, Some(&key), None).await;
        handle.await.unwrap();

        assert_eq!(token, Some(key));
    }

    #[tokio::test]
    async fn missing_credentials_yield_none() {
        let handler = handler_for("http://localhost:1", "http://localhost:1");
        assert!(handler.authenticate(None, None, None).await.is_none());
    }
}
