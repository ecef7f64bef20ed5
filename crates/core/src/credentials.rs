use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;

/// A StackStorm credential.
///
/// Immutable once constructed. Renders itself as HTTP header pairs for the
/// auth/API endpoints and as client request parameters where the API expects
/// the credential in the payload rather than in a header.
///
/// The [`fmt::Debug`] implementation is redacted so secret material never
/// reaches the logs by accident.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Username/password pair exchanged for a token at the auth service.
    UserCredentials {
        username: String,
        password: String,
    },
    /// A bearer token issued by the auth service.
    Token { token: String },
    /// A pre-provisioned API key.
    ApiKey { key: String },
}

impl Credential {
    /// Create a username/password credential.
    pub fn user(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UserCredentials {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Create a bearer-token credential.
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token {
            token: token.into(),
        }
    }

    /// Create an API-key credential.
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey { key: key.into() }
    }

    /// Short kind tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserCredentials { .. } => "user",
            Self::Token { .. } => "token",
            Self::ApiKey { .. } => "apikey",
        }
    }

    /// Render the credential as HTTP request headers.
    ///
    /// Username/password becomes an `Authorization: Basic` header; tokens and
    /// API keys use the `X-Auth-Token` / `St2-Api-Key` headers the StackStorm
    /// API expects.
    pub fn http_headers(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::UserCredentials { username, password } => {
                let encoded = B64.encode(format!("{username}:{password}"));
                vec![("Authorization", format!("Basic {encoded}"))]
            }
            Self::Token { token } => vec![("X-Auth-Token", token.clone())],
            Self::ApiKey { key } => vec![("St2-Api-Key", key.clone())],
        }
    }

    /// Render the credential as API client request parameters.
    ///
    /// Returns `None` for username/password, which the API only accepts as
    /// Basic auth.
    pub fn client_params(&self) -> Option<serde_json::Value> {
        match self {
            Self::UserCredentials { .. } => None,
            Self::Token { token } => Some(serde_json::json!({ "token": token })),
            Self::ApiKey { key } => Some(serde_json::json!({ "api_key": key })),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserCredentials { username, .. } => f
                .debug_struct("UserCredentials")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Token { .. } => f.write_str("Token([REDACTED])"),
            Self::ApiKey { .. } => f.write_str("ApiKey([REDACTED])"),
        }
    }
}
