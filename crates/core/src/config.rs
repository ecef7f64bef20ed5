use std::fmt;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::credentials::Credential;

/// Errors raised while loading or interpreting the bridge configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML source could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// The configuration parsed but is not usable as written.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Trust model selecting which authentication strategy the broker uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrustModel {
    /// Credentials supplied by the chat user (or the bot itself) are
    /// validated directly against StackStorm.
    #[default]
    Standalone,
    /// The bot's credentials request user-scoped tokens on behalf of chat
    /// users; StackStorm maintains the chat-user-to-account mapping.
    ServerSide,
    /// Raw StackStorm credentials are collected from the user through the
    /// out-of-band login form and validated directly.
    ClientSide,
}

impl TrustModel {
    /// Parse a configuration selector, case-insensitively.
    pub fn from_str_loose(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "standalone" => Some(Self::Standalone),
            "serverside" => Some(Self::ServerSide),
            "clientside" => Some(Self::ClientSide),
            _ => None,
        }
    }
}

impl fmt::Display for TrustModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Standalone => "standalone",
            Self::ServerSide => "serverside",
            Self::ClientSide => "clientside",
        };
        f.write_str(name)
    }
}

/// Username/password pair for the bot's own StackStorm account.
#[derive(Clone, Deserialize)]
pub struct UserAuthConfig {
    pub name: String,
    pub password: String,
}

impl fmt::Debug for UserAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserAuthConfig")
            .field("name", &self.name)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// The bot's own StackStorm credential, exactly one of the three kinds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiAuthConfig {
    /// Username/password account.
    pub user: Option<UserAuthConfig>,
    /// Pre-issued user token.
    pub token: Option<String>,
    /// Pre-provisioned API key.
    pub apikey: Option<String>,
}

/// Top-level broker configuration, loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Base URL of the StackStorm API service.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Base URL of the StackStorm auth service.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// Base URL of the StackStorm stream service.
    #[serde(default = "default_stream_url")]
    pub stream_url: String,

    /// External URL of the out-of-band login form; the one-time session URL
    /// handed to chat users is built from this.
    #[serde(default = "default_oob_auth_url")]
    pub oob_auth_url: String,

    /// Trust model selector: `"standalone"`, `"serverside"` or
    /// `"clientside"`. Unknown values fall back to standalone with a warning.
    #[serde(default = "default_rbac_auth")]
    pub rbac_auth: String,

    /// The bot's own StackStorm credential.
    #[serde(default)]
    pub api_auth: ApiAuthConfig,

    /// Linking-session time-to-live in seconds.
    #[serde(default = "default_session_ttl")]
    pub session_ttl: u64,

    /// TTL in seconds requested for user tokens issued by the auth service.
    #[serde(default = "default_user_token_ttl")]
    pub user_token_ttl: u64,

    /// Interval in seconds between bot-credential validation runs.
    #[serde(default = "default_timer_update")]
    pub timer_update: u64,

    /// Whether to verify TLS certificates on outbound StackStorm calls.
    #[serde(default = "default_verify_cert")]
    pub verify_cert: bool,

    /// Secret store backend selector. Defaults to `"cleartext"`, the
    /// in-memory non-persistent reference backend.
    #[serde(default = "default_secrets_store")]
    pub secrets_store: String,

    /// Notification route key; only stream announcements tagged with this
    /// key are relayed to the chat backend.
    #[serde(default = "default_route_key")]
    pub route_key: String,
}

impl BridgeConfig {
    /// Parse a configuration from TOML source.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Resolve the configured trust model, defaulting to standalone when the
    /// selector is not recognized.
    pub fn trust_model(&self) -> TrustModel {
        TrustModel::from_str_loose(&self.rbac_auth).unwrap_or_else(|| {
            warn!(
                rbac_auth = %self.rbac_auth,
                "unsupported trust model selector, defaulting to standalone"
            );
            TrustModel::Standalone
        })
    }

    /// Resolve the bot's own credential from the `api_auth` section.
    ///
    /// Exactly one of `user`, `token` or `apikey` must be set.
    pub fn bot_credentials(&self) -> Result<Credential, ConfigError> {
        let mut creds = Vec::new();
        if let Some(user) = &self.api_auth.user {
            creds.push(Credential::user(&user.name, &user.password));
        }
        if let Some(token) = &self.api_auth.token {
            creds.push(Credential::token(token));
        }
        if let Some(key) = &self.api_auth.apikey {
            creds.push(Credential::api_key(key));
        }
        match creds.len() {
            0 => Err(ConfigError::Invalid(
                "api_auth must supply one of user, token or apikey".to_owned(),
            )),
            1 => Ok(creds.remove(0)),
            _ => Err(ConfigError::Invalid(
                "api_auth must supply exactly one credential kind".to_owned(),
            )),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            auth_url: default_auth_url(),
            stream_url: default_stream_url(),
            oob_auth_url: default_oob_auth_url(),
            rbac_auth: default_rbac_auth(),
            api_auth: ApiAuthConfig::default(),
            session_ttl: default_session_ttl(),
            user_token_ttl: default_user_token_ttl(),
            timer_update: default_timer_update(),
            verify_cert: default_verify_cert(),
            secrets_store: default_secrets_store(),
            route_key: default_route_key(),
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:9101/v1".to_owned()
}

fn default_auth_url() -> String {
    "http://localhost:9100/v1".to_owned()
}

fn default_stream_url() -> String {
    "http://localhost:9102/v1".to_owned()
}

fn default_oob_auth_url() -> String {
    "https://localhost:8888/".to_owned()
}

fn default_rbac_auth() -> String {
    "standalone".to_owned()
}

fn default_session_ttl() -> u64 {
    3600
}

fn default_user_token_ttl() -> u64 {
    86_400
}

fn default_timer_update() -> u64 {
    60
}

fn default_verify_cert() -> bool {
    true
}

fn default_secrets_store() -> String {
    "cleartext".to_owned()
}

fn default_route_key() -> String {
    "stormbridge".to_owned()
}
