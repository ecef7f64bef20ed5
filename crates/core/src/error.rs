use thiserror::Error;

/// Recoverable session lifecycle failures.
///
/// These are caller-visible conditions, not process-fatal errors: command and
/// webhook handlers catch them to produce a user-facing rejection message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Lookup miss: no session exists for the given user or UUID.
    #[error("session is invalid")]
    Invalid,

    /// The session exists but its time-to-live has elapsed.
    #[error("session has expired")]
    Expired,

    /// The one-time-use session has already been unsealed.
    #[error("session has been consumed")]
    Consumed,

    /// A session already exists for the user.
    #[error("session already exists")]
    Exists,
}
