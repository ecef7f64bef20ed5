use std::sync::Arc;

use async_trait::async_trait;

use stormbridge_core::{BridgeConfig, Credential, SessionError, TrustModel};
use stormbridge_session::{ManagerError, Session};

use crate::clientside::ClientSideAuthHandler;
use crate::serverside::ServerSideAuthHandler;
use crate::standalone::StandaloneAuthHandler;

/// Session and token lookup surface the handlers use during pre-execution
/// authentication.
///
/// Implemented by the authentication controller; keeping the handlers behind
/// this narrow trait avoids a dependency cycle between the strategies and the
/// façade that owns them.
#[async_trait]
pub trait SessionAccess: Send + Sync {
    /// Stable user id of the bridge's own service identity.
    fn bot_user_id(&self) -> &str;

    /// The credential cached for `user_id`, if any.
    async fn token_for_user(&self, user_id: &str) -> Result<Option<Credential>, ManagerError>;

    /// The credential cached under `session_id`, if any.
    async fn token_for_session(&self, session_id: &str)
    -> Result<Option<Credential>, ManagerError>;

    /// Snapshot of the session belonging to `user_id`.
    async fn session_for_user(&self, user_id: &str) -> Result<Session, SessionError>;

    /// Create a session for `user_id`.
    async fn create_session(
        &self,
        user_id: &str,
        user_secret: &str,
    ) -> Result<Session, SessionError>;

    /// Cache a validated credential under `session_id`.
    async fn store_token_for_session(
        &self,
        session_id: &str,
        token: Credential,
    ) -> Result<(), ManagerError>;
}

/// A trust-model authentication strategy.
///
/// One implementation is selected at configuration time; each turns raw
/// StackStorm credentials into a validated token through different calls to
/// the StackStorm auth API.
#[async_trait]
pub trait AuthHandler: Send + Sync {
    /// Trust-model name, used in logs.
    fn name(&self) -> &'static str;

    /// Validate credentials against StackStorm.
    ///
    /// Returns the validated credential (a token, or the API key itself) or
    /// `None` when the credentials are unsupported by this trust model or the
    /// validation failed. Both outcomes are logged as warnings — they are
    /// normal results of bad user input, not fatal errors.
    async fn authenticate(
        &self,
        chat_user: Option<&str>,
        user_creds: Option<&Credential>,
        bot_creds: Option<&Credential>,
    ) -> Option<Credential>;

    /// Resolve a usable token for `chat_user` ahead of command execution.
    ///
    /// Each trust model has its own lookup strategy: standalone returns the
    /// bot's cached token, server-side fetches a user-scoped token through
    /// the bot's credential, client-side requires an existing user session.
    async fn pre_execution_authentication(
        &self,
        access: &dyn SessionAccess,
        chat_user: &str,
    ) -> Result<Option<Credential>, ManagerError>;
}

/// Construct the handler for the given trust model.
pub fn create_auth_handler(model: TrustModel, cfg: Arc<BridgeConfig>) -> Arc<dyn AuthHandler> {
    match model {
        TrustModel::Standalone => Arc::new(StandaloneAuthHandler::new(cfg)),
        TrustModel::ServerSide => Arc::new(ServerSideAuthHandler::new(cfg)),
        TrustModel::ClientSide => Arc::new(ClientSideAuthHandler::new(cfg)),
    }
}
