use std::fmt;

use rand_core::{OsRng, RngCore};

/// Generate a random lowercase-hex secret of `length` characters.
///
/// Randomness comes from the operating system. Lengths above 255 are clamped.
pub fn generate_secret(length: usize) -> String {
    let length = length.min(255);
    let mut buf = vec![0u8; length.div_ceil(2)];
    OsRng.fill_bytes(&mut buf);
    let mut secret = hex::encode(buf);
    secret.truncate(length);
    secret
}

/// The bridge's own synthetic chat identity.
///
/// The bot's StackStorm token is stored and rotated through the same
/// session/secret-store machinery as real chat users; this identity is the
/// key it is filed under. The secret is generated fresh on every
/// construction and never leaves the process.
#[derive(Clone)]
pub struct BotServiceIdentity {
    name: String,
    secret: String,
}

impl BotServiceIdentity {
    /// Stable user id of the service identity in the session table.
    pub const DEFAULT_NAME: &'static str = "stormbridge%service";

    /// Create the service identity with the default name and a fresh secret.
    pub fn new() -> Self {
        Self::with_name(Self::DEFAULT_NAME)
    }

    /// Create a service identity with a custom name (useful in tests).
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: generate_secret(16),
        }
    }

    /// The identity's stable user id.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The identity's session secret.
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl Default for BotServiceIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BotServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotServiceIdentity")
            .field("name", &self.name)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_has_requested_length() {
        assert_eq!(generate_secret(8).len(), 8);
        assert_eq!(generate_secret(7).len(), 7);
        assert_eq!(generate_secret(16).len(), 16);
    }

    #[test]
    fn secret_length_is_clamped() {
        assert_eq!(generate_secret(1000).len(), 255);
    }

    #[test]
    fn secrets_are_unique() {
        assert_ne!(generate_secret(16), generate_secret(16));
    }

    #[test]
    fn secret_is_hex() {
        assert!(generate_secret(32).chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn identity_debug_is_redacted() {
        let identity = BotServiceIdentity::new();
        let rendered = format!("{identity:?}");
        assert!(rendered.contains(BotServiceIdentity::DEFAULT_NAME));
        assert!(!rendered.contains(identity.secret()));
    }
}
