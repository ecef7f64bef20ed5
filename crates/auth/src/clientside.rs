use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use stormbridge_core::{BridgeConfig, Credential};
use stormbridge_session::ManagerError;

use crate::api::St2Client;
use crate::handler::{AuthHandler, SessionAccess};

/// Client-side trust model.
///
/// Raw StackStorm credentials are collected from the chat user through the
/// out-of-band login form and validated directly against StackStorm. The
/// bot's own credential is only used where a validation endpoint requires it
/// (token validation on behalf of the user).
pub struct ClientSideAuthHandler {
    cfg: Arc<BridgeConfig>,
    api: St2Client,
}

impl ClientSideAuthHandler {
    pub fn new(cfg: Arc<BridgeConfig>) -> Self {
        let api = St2Client::new(cfg.verify_cert);
        Self { cfg, api }
    }
}

#[async_trait]
impl AuthHandler for ClientSideAuthHandler {
    fn name(&self) -> &'static str {
        "clientside"
    }

    async fn authenticate(
        &self,
        _chat_user: Option<&str>,
        user_creds: Option<&Credential>,
        bot_creds: Option<&Credential>,
    ) -> Option<Credential> {
        let Some(creds) = user_creds else {
            warn!("no credentials supplied for clientside authentication");
            return None;
        };

        let token = match creds {
            Credential::UserCredentials { .. } => {
                self.api
                    .request_token(&self.cfg.auth_url, creds, self.cfg.user_token_ttl)
                    .await
            }
            Credential::Token { token } => {
                let Some(bot_creds) = bot_creds else {
                    warn!("bot credentials are required to validate a user token");
                    return None;
                };
                let payload = serde_json::json!({ "token": token });
                self.api
                    .request_user_token(&self.cfg.auth_url, bot_creds, &payload)
                    .await
            }
            Credential::ApiKey { .. } => self.api.validate_api_key(&self.cfg.api_url, creds).await,
        };

        if token.is_none() {
            warn!(
                kind = creds.kind(),
                "failed to authenticate user credentials against the StackStorm API"
            );
        }
        token
    }

    async fn pre_execution_authentication(
        &self,
        access: &dyn SessionAccess,
        chat_user: &str,
    ) -> Result<Option<Credential>, ManagerError> {
        // A chat user must have linked their credentials already; the token
        // lives under their session.
        let session = access.session_for_user(chat_user).await?;
        session.check_expiry().map_err(ManagerError::from)?;
        access.token_for_session(&session.id()).await
    }
}
