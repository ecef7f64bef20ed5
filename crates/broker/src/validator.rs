use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::info;

use crate::controller::AuthenticationController;

/// Periodic bot-credential validator.
///
/// Re-checks the bot session on a fixed interval and lets the controller
/// repair it (reauthenticate on expiry, bootstrap when missing), so the
/// bridge's StackStorm token is rotated proactively instead of failing on
/// first use.
pub struct CredentialValidator {
    controller: Arc<AuthenticationController>,
    period: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

impl CredentialValidator {
    /// Create a validator polling every `period`.
    ///
    /// Returns the validator and the sender used to signal shutdown.
    pub fn new(
        controller: Arc<AuthenticationController>,
        period: Duration,
    ) -> (Self, mpsc::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (
            Self {
                controller,
                period,
                shutdown_rx,
            },
            shutdown_tx,
        )
    }

    /// Create a validator using the configured `timer_update` interval.
    pub fn from_config(controller: Arc<AuthenticationController>) -> (Self, mpsc::Sender<()>) {
        let period = Duration::from_secs(controller.config().timer_update);
        Self::new(controller, period)
    }

    /// Run until shutdown is signaled.
    pub async fn run(&mut self) {
        info!("credential validator starting");

        let mut ticker = interval(self.period);
        // The first tick fires immediately; skip it so startup bootstrap and
        // the first validation don't race.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("credential validator received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    self.controller.validate_bot_credentials().await;
                }
            }
        }

        info!("credential validator stopped");
    }
}
