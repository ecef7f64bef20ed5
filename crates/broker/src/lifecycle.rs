use tracing::{debug, error, warn};

use stormbridge_core::SessionError;

use crate::controller::{AuthenticationController, Principal};

impl AuthenticationController {
    /// Bootstrap the bridge's own StackStorm credential.
    ///
    /// Creates (or, tolerating the already-exists race, reuses) the session
    /// for the internal service identity, unseals it, authenticates the
    /// configured bot credentials through the forced-standalone handler and
    /// stores the resulting token.
    ///
    /// Failure is logged at error severity but is not fatal: command paths
    /// that need the bot token fail per-request until the next successful
    /// revalidation.
    pub async fn authenticate_bot_credentials(&self) -> bool {
        let bot_session = match self
            .create_session(Principal::Bot, self.internal_identity().secret())
            .await
        {
            Ok(session) => {
                if let Err(err) = self.consume_session(&session.id()).await {
                    warn!(error = %err, "failed to consume the new bot session");
                }
                session
            }
            Err(SessionError::Exists) => {
                // Concurrent reauthentication already created the session;
                // fall back to fetching it rather than erroring out.
                warn!("bot session already exists, reusing it");
                match self.get_session(Principal::Bot).await {
                    Ok(session) => session,
                    Err(err) => {
                        error!(error = %err, "failed to fetch the existing bot session");
                        return false;
                    }
                }
            }
            Err(err) => {
                error!(error = %err, "failed to create the bot session");
                return false;
            }
        };
        debug!(session_id = %bot_session.id(), "bot session ready");

        let bot_creds = match self.config().bot_credentials() {
            Ok(creds) => creds,
            Err(err) => {
                error!(error = %err, "bot credentials are not configured");
                return false;
            }
        };

        // Bot authentication is a corner case: it always uses the standalone
        // model, regardless of the configured trust model.
        let token = self
            .bootstrap_handler()
            .authenticate(None, Some(&bot_creds), None)
            .await;

        match token {
            Some(token) => {
                debug!("StackStorm authentication succeeded");
                if let Err(err) = self.set_token_by_session(&bot_session.id(), token).await {
                    error!(error = %err, "failed to store the bot token");
                    return false;
                }
                true
            }
            None => {
                error!("failed to authenticate bot credentials with the StackStorm API");
                false
            }
        }
    }

    /// Drop the bot session identified by `session_id` and authenticate from
    /// scratch.
    pub async fn reauthenticate_bot_credentials(&self, session_id: &str) -> bool {
        if let Err(err) = self.delete_session(session_id).await {
            debug!(session_id, error = %err, "bot session already gone before reauthentication");
        }
        self.authenticate_bot_credentials().await
    }

    /// Check that the bot session and its credential are still usable,
    /// repairing them if not.
    ///
    /// An expired session is deleted and fully reauthenticated; a missing
    /// session triggers a fresh bootstrap. Run periodically by
    /// [`crate::CredentialValidator`] so the bot token is rotated before
    /// command paths notice it going stale.
    pub async fn validate_bot_credentials(&self) {
        match self.get_session(Principal::Bot).await {
            Ok(session) => {
                if let Err(err) = session.check_expiry() {
                    debug!(error = %err, "bot session expired, reauthenticating");
                    self.reauthenticate_bot_credentials(&session.id()).await;
                }
            }
            Err(err) => {
                debug!(error = %err, "bot session missing, bootstrapping");
                self.authenticate_bot_credentials().await;
            }
        }
    }
}
