use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use stormbridge_core::Credential;

use crate::controller::AuthenticationController;

/// Outcome category of an out-of-band login attempt.
///
/// The numeric codes are an internal taxonomy surfaced to the login form so
/// it can present distinguishable failures; they are not wire-stable across
/// implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCode {
    /// Credentials were validated and associated with the session.
    Success = 0,
    /// The session could not be consumed (missing, expired or already used).
    SessionError = 2,
    /// The payload carried no usable credential fields.
    MalformedPayload = 3,
    /// The shared word did not match the session's secret.
    SecretMismatch = 5,
    /// StackStorm rejected the supplied credentials.
    CredentialsInvalid = 6,
    /// Unexpected failure while handling the session.
    UnexpectedSessionError = 90,
    /// Unexpected failure while checking the credentials.
    UnexpectedCredentialError = 91,
}

impl ReturnCode {
    /// The numeric code sent back to the login form.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// JSON payload submitted by the out-of-band login form.
///
/// `shared_word` must match the session's secret; exactly one of
/// username+password, `user_token` or `api_key` supplies the credential.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct LoginRequest {
    pub shared_word: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub user_token: Option<String>,
    pub api_key: Option<String>,
}

impl LoginRequest {
    /// The credential carried by the payload, if any.
    ///
    /// Field precedence follows the original form contract: username wins
    /// over token, token over api key.
    fn credential(&self) -> Option<Credential> {
        if let Some(username) = &self.username {
            let password = self.password.clone().unwrap_or_default();
            return Some(Credential::user(username, password));
        }
        if let Some(token) = &self.user_token {
            return Some(Credential::token(token));
        }
        if let Some(key) = &self.api_key {
            return Some(Credential::api_key(key));
        }
        None
    }

    /// Rejection message matching the supplied credential kind.
    fn rejection_message(&self) -> &'static str {
        if self.username.is_some() {
            "Invalid credentials"
        } else if self.user_token.is_some() {
            "Invalid token"
        } else {
            "Invalid api key"
        }
    }
}

/// JSON response returned to the login form.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub authenticated: bool,
    pub return_code: u8,
    pub message: String,
}

impl LoginResponse {
    fn success() -> Self {
        Self {
            authenticated: true,
            return_code: ReturnCode::Success.code(),
            message: "Successfully associated StackStorm credentials".to_owned(),
        }
    }

    fn rejected(code: ReturnCode, message: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            return_code: code.code(),
            message: message.into(),
        }
    }
}

/// Handle a submitted login form for the one-time session `session_id`.
///
/// Consumes the session, checks the shared word, validates the supplied
/// credentials through the configured handler and stores the resulting token.
/// Any non-authenticated outcome deletes the session so the one-time URL
/// cannot be retried.
pub async fn handle_login(
    controller: &AuthenticationController,
    session_id: &str,
    request: &LoginRequest,
) -> LoginResponse {
    let response = process_login(controller, session_id, request).await;

    if !response.authenticated {
        if let Err(err) = controller.delete_session(session_id).await {
            debug!(session_id, error = %err, "failed to delete session after rejected login");
        }
        warn!(session_id, message = %response.message, "login rejected");
    }
    response
}

async fn process_login(
    controller: &AuthenticationController,
    session_id: &str,
    request: &LoginRequest,
) -> LoginResponse {
    // One-time use: the session must be consumable exactly once.
    if let Err(err) = controller.consume_session(session_id).await {
        return LoginResponse::rejected(
            ReturnCode::SessionError,
            format!("Session '{session_id}' {err}"),
        );
    }

    let Some(shared_word) = request.shared_word.as_deref() else {
        return LoginResponse::rejected(ReturnCode::MalformedPayload, "Invalid authentication payload");
    };
    match controller.match_secret(session_id, shared_word).await {
        Ok(true) => {}
        Ok(false) => {
            return LoginResponse::rejected(ReturnCode::SecretMismatch, "Invalid credentials");
        }
        Err(err) => {
            return LoginResponse::rejected(
                ReturnCode::UnexpectedCredentialError,
                format!("Credentials unexpected error: {err}"),
            );
        }
    }

    let user_id = match controller.get_session_user_id(session_id).await {
        Ok(user_id) => user_id,
        Err(err) => {
            return LoginResponse::rejected(
                ReturnCode::UnexpectedSessionError,
                format!("Session unexpected error: {err}"),
            );
        }
    };
    debug!(user_id, "matched chat user for credential association");

    let Some(creds) = request.credential() else {
        return LoginResponse::rejected(ReturnCode::MalformedPayload, "Invalid authentication payload");
    };

    let bot_creds = controller.config().bot_credentials().ok();
    if controller
        .associate_credentials(&user_id, &creds, bot_creds.as_ref())
        .await
    {
        LoginResponse::success()
    } else {
        LoginResponse::rejected(ReturnCode::CredentialsInvalid, request.rejection_message())
    }
}
