use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use stormbridge_core::{BridgeConfig, Credential, SessionError};
use stormbridge_session::ManagerError;

use crate::api::St2Client;
use crate::handler::{AuthHandler, SessionAccess};

/// Server-side (proxied) trust model.
///
/// StackStorm maintains its own chat-user-to-account mapping; the bridge's
/// credential is configured as a service account and requests user-scoped
/// tokens on behalf of chat users. Username/password user credentials are not
/// supported under this model and are rejected outright.
pub struct ServerSideAuthHandler {
    cfg: Arc<BridgeConfig>,
    api: St2Client,
}

impl ServerSideAuthHandler {
    pub fn new(cfg: Arc<BridgeConfig>) -> Self {
        let api = St2Client::new(cfg.verify_cert);
        Self { cfg, api }
    }
}

#[async_trait]
impl AuthHandler for ServerSideAuthHandler {
    fn name(&self) -> &'static str {
        "serverside"
    }

    async fn authenticate(
        &self,
        chat_user: Option<&str>,
        user_creds: Option<&Credential>,
        bot_creds: Option<&Credential>,
    ) -> Option<Credential> {
        if matches!(user_creds, Some(Credential::UserCredentials { .. })) {
            warn!("username/password authentication is not supported by the serverside model");
            return None;
        }
        let Some(chat_user) = chat_user else {
            warn!("serverside authentication requires a chat user to act on behalf of");
            return None;
        };
        let Some(bot_creds) = bot_creds else {
            warn!("serverside authentication requires the bot's credentials");
            return None;
        };

        let token = match bot_creds {
            Credential::UserCredentials { .. } => {
                warn!("username/password bot credentials cannot request user-scoped tokens");
                None
            }
            Credential::Token { .. } | Credential::ApiKey { .. } => {
                let payload = serde_json::json!({ "user": chat_user });
                self.api
                    .request_user_token(&self.cfg.auth_url, bot_creds, &payload)
                    .await
            }
        };

        if token.is_none() {
            warn!(
                chat_user,
                "failed to obtain a user-scoped token from the StackStorm API"
            );
        }
        token
    }

    async fn pre_execution_authentication(
        &self,
        access: &dyn SessionAccess,
        chat_user: &str,
    ) -> Result<Option<Credential>, ManagerError> {
        let Some(bot_token) = access.token_for_user(access.bot_user_id()).await? else {
            warn!("no bot token available for serverside user authentication");
            return Ok(None);
        };

        let Some(user_token) = self
            .authenticate(Some(chat_user), None, Some(&bot_token))
            .await
        else {
            return Ok(None);
        };

        // Cache the user-scoped token under a session so subsequent
        // executions find it without another round trip.
        let session = match access.create_session(chat_user, "").await {
            Ok(session) => session,
            Err(SessionError::Exists) => access.session_for_user(chat_user).await?,
            Err(err) => return Err(err.into()),
        };
        access
            .store_token_for_session(&session.id(), user_token.clone())
            .await?;

        Ok(Some(user_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockSt2Server, StubAccess};

    fn handler_for(auth_url: &str) -> ServerSideAuthHandler {
        let cfg = BridgeConfig {
            auth_url: auth_url.to_owned(),
            ..BridgeConfig::default()
        };
        ServerSideAuthHandler::new(Arc::new(cfg))
    }

    #[tokio::test]
    async fn user_password_credentials_fail_closed() {
        let handler = handler_for("http://localhost:1");
        let token = handler
            .authenticate(
                Some("alice"),
                Some(&Credential::user("alice", "pw")),
                Some(&Credential::token("bot-tok")),
            )
            .await;
        assert!(token.is_none());
    }

    #[tokio::test]
    async fn bot_token_requests_user_scoped_token() {
        let server = MockSt2Server::start().await;
        let handler = handler_for(&server.base_url);
        let handle =
            tokio::spawn(async move { server.respond_once(200, r#"{"token":"user-tok"}"#).await });

        let token = handler
            .authenticate(Some("alice"), None, Some(&Credential::token("bot-tok")))
            .await;
        handle.await.unwrap();

        assert_eq!(token, Some(Credential::token("user-tok")));
    }

    #[tokio::test]
    async fn missing_bot_credentials_yield_none() {
        let handler = handler_for("http://localhost:1");
        assert!(handler.authenticate(Some("alice"), None, None).await.is_none());
    }

    #[tokio::test]
    async fn pre_execution_caches_token_under_a_session() {
        let server = MockSt2Server::start().await;
        let handler = handler_for(&server.base_url);
        let handle =
            tokio::spawn(async move { server.respond_once(200, r#"{"token":"user-tok"}"#).await });

        let access = StubAccess::new();
        access.seed_bot_token(Credential::token("bot-tok")).await;

        let token = handler
            .pre_execution_authentication(&access, "alice")
            .await
            .unwrap();
        handle.await.unwrap();

        assert_eq!(token, Some(Credential::token("user-tok")));
        // The user-scoped token is now cached under the user's session.
        let session = access.session_for_user("alice").await.unwrap();
        let cached = access.token_for_session(&session.id()).await.unwrap();
        assert_eq!(cached, Some(Credential::token("user-tok")));
    }

    #[tokio::test]
    async fn pre_execution_without_bot_token_yields_none() {
        let handler = handler_for("http://localhost:1");
        let access = StubAccess::new();
        access.seed_bot_session().await;

        let token = handler
            .pre_execution_authentication(&access, "alice")
            .await
            .unwrap();
        assert!(token.is_none());
    }
}
