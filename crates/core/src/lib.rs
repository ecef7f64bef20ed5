pub mod config;
pub mod credentials;
pub mod error;
pub mod identity;

pub use config::{ApiAuthConfig, BridgeConfig, ConfigError, TrustModel, UserAuthConfig};
pub use credentials::Credential;
pub use error::SessionError;
pub use identity::{BotServiceIdentity, generate_secret};
