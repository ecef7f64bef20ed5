use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use stormbridge_auth::{AuthHandler, SessionAccess, create_auth_handler};
use stormbridge_core::{BotServiceIdentity, BridgeConfig, Credential, SessionError, TrustModel};
use stormbridge_session::{ManagerError, Session, SessionManager, SessionSummary};

use crate::store_factory::create_secret_store;

/// A chat-side principal resolved to the stable key used by the session table.
///
/// Chat adapters normalise backend-specific identity objects to a string
/// before calling into the broker; the bridge's own service identity is
/// addressed symbolically so its generated name stays internal.
#[derive(Debug, Clone, Copy)]
pub enum Principal<'a> {
    /// The bridge's internal service identity.
    Bot,
    /// A chat user, by normalised user id.
    User(&'a str),
}

/// Façade over the session manager and the configured authentication
/// handler.
///
/// This is the surface the rest of the plugin talks to: session CRUD for the
/// linking flow, credential association from the out-of-band callback, and
/// token lookup on every command execution. Operations propagate the session
/// error taxonomy so command and webhook handlers can turn failures into
/// user-facing rejections.
pub struct AuthenticationController {
    cfg: Arc<BridgeConfig>,
    sessions: SessionManager,
    handler: Arc<dyn AuthHandler>,
    bootstrap_handler: Arc<dyn AuthHandler>,
    internal_identity: BotServiceIdentity,
}

impl AuthenticationController {
    /// Build a controller from configuration: secret store backend, session
    /// manager and the trust-model handler are all selected here, once.
    pub async fn new(cfg: Arc<BridgeConfig>) -> Self {
        let secrets = create_secret_store(&cfg.secrets_store);
        if let Err(err) = secrets.setup().await {
            warn!(error = %err, "secret store setup failed");
        }
        let handler = create_auth_handler(cfg.trust_model(), Arc::clone(&cfg));
        // Bot bootstrap always authenticates standalone, whatever the
        // configured trust model.
        let bootstrap_handler = create_auth_handler(TrustModel::Standalone, Arc::clone(&cfg));
        Self {
            sessions: SessionManager::new(secrets),
            handler,
            bootstrap_handler,
            internal_identity: BotServiceIdentity::new(),
            cfg,
        }
    }

    /// Replace the trust-model handler. Useful for testing.
    #[must_use]
    pub fn with_auth_handler(mut self, handler: Arc<dyn AuthHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// The broker configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.cfg
    }

    /// The bridge's internal service identity.
    pub fn internal_identity(&self) -> &BotServiceIdentity {
        &self.internal_identity
    }

    pub(crate) fn bootstrap_handler(&self) -> &Arc<dyn AuthHandler> {
        &self.bootstrap_handler
    }

    /// Resolve a principal to the stable user id used as the session key.
    pub fn to_user_id(&self, principal: Principal<'_>) -> String {
        match principal {
            Principal::Bot => self.internal_identity.name().to_owned(),
            Principal::User(user_id) => user_id.to_owned(),
        }
    }

    /// Resolve a usable StackStorm token for the principal through the
    /// configured trust model's lookup strategy.
    pub async fn pre_execution_authentication(
        &self,
        principal: Principal<'_>,
    ) -> Result<Option<Credential>, ManagerError> {
        let user_id = self.to_user_id(principal);
        self.handler
            .pre_execution_authentication(self, &user_id)
            .await
    }

    /// Create a linking session for the principal.
    pub async fn create_session(
        &self,
        principal: Principal<'_>,
        user_secret: &str,
    ) -> Result<Session, SessionError> {
        let user_id = self.to_user_id(principal);
        self.sessions
            .create(&user_id, user_secret, self.cfg.session_ttl)
            .await
    }

    /// Fetch the session belonging to the principal.
    pub async fn get_session(&self, principal: Principal<'_>) -> Result<Session, SessionError> {
        let user_id = self.to_user_id(principal);
        self.sessions.get_by_user_id(&user_id).await
    }

    /// Delete the session identified by `session_id`, along with its stored
    /// credential.
    pub async fn delete_session(&self, session_id: &str) -> Result<(), SessionError> {
        let session = match self.sessions.get_by_uuid(session_id).await {
            Ok(session) => session,
            Err(err) => {
                debug!(session_id, "session doesn't exist to be deleted");
                return Err(err);
            }
        };
        self.sessions.delete(session.user_id()).await
    }

    /// Unseal the session, consuming its one-time use.
    pub async fn consume_session(&self, session_id: &str) -> Result<(), SessionError> {
        self.sessions.consume(session_id).await
    }

    /// Compare a candidate shared word against the session's hashed secret.
    ///
    /// Returns `false` without comparing while the session is still sealed:
    /// the one-time URL must be consumed before the secret may be checked.
    pub async fn match_secret(
        &self,
        session_id: &str,
        candidate: &str,
    ) -> Result<bool, SessionError> {
        if self.sessions.is_sealed(session_id).await? {
            warn!("attempted to check the shared secret while the session is sealed");
            return Ok(false);
        }
        self.sessions.match_secret(session_id, candidate).await
    }

    /// The one-time login URL handed to the chat user.
    pub fn session_url(&self, session_id: &str, url_path: &str) -> String {
        format!("{}{url_path}?uuid={session_id}", self.cfg.oob_auth_url)
    }

    /// The user id the session belongs to; fails once the session expired.
    pub async fn get_session_user_id(&self, session_id: &str) -> Result<String, SessionError> {
        let session = self.sessions.get_by_uuid(session_id).await?;
        session.check_expiry()?;
        Ok(session.user_id().to_owned())
    }

    /// The credential cached for the principal, if any.
    pub async fn get_token_by_user(
        &self,
        principal: Principal<'_>,
    ) -> Result<Option<Credential>, ManagerError> {
        let session = self.get_session(principal).await?;
        debug!(session_id = %session.id(), "fetching token for session");
        self.sessions.get_secret(&session.id()).await
    }

    /// The credential cached under `session_id`, if any.
    pub async fn get_token_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Credential>, ManagerError> {
        self.sessions.get_secret(session_id).await
    }

    /// Cache a credential under `session_id`.
    pub async fn set_token_by_session(
        &self,
        session_id: &str,
        token: Credential,
    ) -> Result<(), ManagerError> {
        self.sessions.put_secret(session_id, token).await
    }

    /// Cache a credential under the principal's session.
    pub async fn set_token_by_user(
        &self,
        principal: Principal<'_>,
        token: Credential,
    ) -> Result<(), ManagerError> {
        let session = self.get_session(principal).await?;
        self.sessions.put_secret(&session.id(), token).await
    }

    /// Validate supplied credentials through the configured handler and, on
    /// success, store the resulting token under the user's session.
    ///
    /// Returns `false` without storing anything when validation fails — no
    /// partial state is left behind.
    pub async fn associate_credentials(
        &self,
        user_id: &str,
        creds: &Credential,
        bot_creds: Option<&Credential>,
    ) -> bool {
        let Some(token) = self
            .handler
            .authenticate(Some(user_id), Some(creds), bot_creds)
            .await
        else {
            warn!(user_id, "failed to validate StackStorm credentials");
            return false;
        };

        match self.set_token_by_user(Principal::User(user_id), token).await {
            Ok(()) => true,
            Err(err) => {
                warn!(user_id, error = %err, "failed to store validated credentials");
                false
            }
        }
    }

    /// Read-only summaries of every session, for administrative listing.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.sessions.list_sessions().await
    }
}

#[async_trait]
impl SessionAccess for AuthenticationController {
    fn bot_user_id(&self) -> &str {
        self.internal_identity.name()
    }

    async fn token_for_user(&self, user_id: &str) -> Result<Option<Credential>, ManagerError> {
        self.get_token_by_user(Principal::User(user_id)).await
    }

    async fn token_for_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Credential>, ManagerError> {
        self.get_token_by_session(session_id).await
    }

    async fn session_for_user(&self, user_id: &str) -> Result<Session, SessionError> {
        self.sessions.get_by_user_id(user_id).await
    }

    async fn create_session(
        &self,
        user_id: &str,
        user_secret: &str,
    ) -> Result<Session, SessionError> {
        self.sessions
            .create(user_id, user_secret, self.cfg.session_ttl)
            .await
    }

    async fn store_token_for_session(
        &self,
        session_id: &str,
        token: Credential,
    ) -> Result<(), ManagerError> {
        self.set_token_by_session(session_id, token).await
    }
}
