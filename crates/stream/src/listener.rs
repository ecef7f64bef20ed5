use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::io::AsyncBufReadExt;
use tokio::sync::{mpsc, watch};
use tokio_util::io::StreamReader;
use tracing::{debug, error, info, warn};

use stormbridge_broker::{AuthenticationController, Principal};
use stormbridge_core::{BridgeConfig, Credential};

use crate::sse::{Announcement, AnnouncementEnvelope, SseFrame, SseFrameState};

/// Delay before reconnecting after a stream failure.
const DEFAULT_BACKOFF: Duration = Duration::from_secs(10);

/// Errors that tear down a single stream connection.
///
/// None of these kill the listener: the run loop backs off, re-fetches bot
/// credentials and reconnects.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("stream closed by the server")]
    Disconnected,
}

/// Long-lived listener on the StackStorm announcement stream.
///
/// Consumes the `/stream` SSE endpoint with the bot's credential and forwards
/// announcements tagged with the configured route key to the chat relay
/// channel. Runs on its own task: the HTTP read blocks indefinitely between
/// events and must never stall command handling.
pub struct StreamListener {
    cfg: Arc<BridgeConfig>,
    controller: Arc<AuthenticationController>,
    client: reqwest::Client,
    backoff: Duration,
}

impl StreamListener {
    pub fn new(cfg: Arc<BridgeConfig>, controller: Arc<AuthenticationController>) -> Self {
        // No overall request timeout: the stream stays open between events.
        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(10));
        if !cfg.verify_cert {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build().expect("failed to build HTTP client");
        Self {
            cfg,
            controller,
            client,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Override the reconnect backoff (useful for testing).
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Consume the stream until `shutdown` flips to true.
    ///
    /// Every connection attempt re-fetches the bot credentials first; any
    /// error backs off and reconnects rather than ending the loop.
    pub async fn run(&self, events: mpsc::Sender<Announcement>, shutdown: watch::Receiver<bool>) {
        info!("stream listener starting");

        while !*shutdown.borrow() {
            let Some(token) = self.bot_token().await else {
                error!(
                    backoff_seconds = self.backoff.as_secs(),
                    "no valid bot token for the stream API, backing off"
                );
                tokio::time::sleep(self.backoff).await;
                continue;
            };

            match self.listen(&token, &events, &shutdown).await {
                Ok(()) => break,
                Err(err) => {
                    error!(
                        error = %err,
                        backoff_seconds = self.backoff.as_secs(),
                        "stream listener error, backing off"
                    );
                    tokio::time::sleep(self.backoff).await;
                }
            }
        }

        info!("stream listener stopped");
    }

    /// Fetch the bot token, repairing the bot credentials once if needed.
    async fn bot_token(&self) -> Option<Credential> {
        self.controller.validate_bot_credentials().await;
        if let Ok(Some(token)) = self.controller.get_token_by_user(Principal::Bot).await {
            return Some(token);
        }
        // One full bootstrap attempt before giving up until the next
        // reconnect.
        self.controller.authenticate_bot_credentials().await;
        self.controller
            .get_token_by_user(Principal::Bot)
            .await
            .ok()
            .flatten()
    }

    /// Hold one stream connection open, relaying matching announcements.
    ///
    /// Returns `Ok(())` only when shutdown was observed; every other exit is
    /// an error for the run loop to back off on.
    async fn listen(
        &self,
        token: &Credential,
        events: &mpsc::Sender<Announcement>,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<(), StreamError> {
        let url = format!("{}/stream", self.cfg.stream_url.trim_end_matches('/'));
        let mut request = self
            .client
            .get(&url)
            .header("Accept", "text/event-stream");
        for (name, value) in token.http_headers() {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StreamError::Connection(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Authentication(format!(
                "stream request failed with HTTP {status}"
            )));
        }
        debug!(%url, "connected to the event stream");

        let reader = StreamReader::new(
            response
                .bytes_stream()
                .map(|result| result.map_err(std::io::Error::other)),
        );
        let mut lines = tokio::io::BufReader::new(reader).lines();
        let mut frame_state = SseFrameState::default();
        let announcement_event = format!("st2.announcement__{}", self.cfg.route_key);

        loop {
            let line = lines
                .next_line()
                .await
                .map_err(|e| StreamError::Connection(format!("stream read error: {e}")))?;
            let Some(line) = line else {
                return Err(StreamError::Disconnected);
            };

            if line.is_empty() {
                // Blank line = end of SSE frame.
                if let Some(frame) = frame_state.take_frame() {
                    if frame.event.as_deref() == Some(announcement_event.as_str()) {
                        self.relay(&frame, events).await;
                    }
                    // Shutdown is only honored between events so in-flight
                    // deliveries are never dropped.
                    if *shutdown.borrow() {
                        return Ok(());
                    }
                }
                continue;
            }

            if line.starts_with(':') {
                // Keep-alive comment.
                continue;
            }

            if let Some(value) = line.strip_prefix("event:") {
                frame_state.event = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                frame_state.push_data(value.trim());
            } else if let Some(value) = line.strip_prefix("id:") {
                frame_state.id = Some(value.trim().to_string());
            }
            // Unknown fields are ignored per the SSE spec.
        }
    }

    /// Decode an announcement frame and forward its payload.
    async fn relay(&self, frame: &SseFrame, events: &mpsc::Sender<Announcement>) {
        let envelope: AnnouncementEnvelope = match serde_json::from_str(&frame.data) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "malformed announcement event");
                return;
            }
        };

        if envelope.context.is_some() {
            info!("enquiry payload detected, not relayed");
            return;
        }
        let Some(payload) = envelope.payload else {
            warn!("announcement event without a payload");
            return;
        };

        if events.send(payload).await.is_err() {
            warn!("announcement channel closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mock stream service serving one SSE response body, then closing.
    struct MockStreamServer {
        listener: tokio::net::TcpListener,
        base_url: String,
    }

    impl MockStreamServer {
        async fn start() -> Self {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("failed to bind mock stream server");
            let port = listener.local_addr().unwrap().port();
            let base_url = format!("http://127.0.0.1:{port}");
            Self { listener, base_url }
        }

        async fn serve_events(self, body: &'static str) {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};

            let (mut stream, _) = self.listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = stream.read(&mut buf).await.unwrap();

            let response = format!(
                "HTTP/1.1 200 OK\r\n\
                 Content-Type: text/event-stream\r\n\
                 Connection: close\r\n\
                 \r\n\
                 {body}"
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        }
    }

    /// Controller with a live bot session and cached token, so the listener
    /// connects without touching the auth API.
    async fn seeded_controller(cfg: Arc<BridgeConfig>) -> Arc<AuthenticationController> {
        let controller = Arc::new(AuthenticationController::new(cfg).await);
        let session = controller
            .create_session(Principal::Bot, "bot-secret")
            .await
            .unwrap();
        controller.consume_session(&session.id()).await.unwrap();
        controller
            .set_token_by_session(&session.id(), Credential::token("bot-tok"))
            .await
            .unwrap();
        controller
    }

    #[tokio::test]
    async fn relays_matching_announcements_only() {
        let server = MockStreamServer::start().await;
        let cfg = Arc::new(BridgeConfig {
            stream_url: server.base_url.clone(),
            ..BridgeConfig::default()
        });
        let controller = seeded_controller(Arc::clone(&cfg)).await;

        let body = "event: st2.announcement__stormbridge\n\
                    data: {\"payload\":{\"message\":\"hello\",\"user\":\"alice\"}}\n\
                    \n\
                    event: st2.announcement__other_bot\n\
                    data: {\"payload\":{\"message\":\"not ours\"}}\n\
                    \n\
                    event: st2.announcement__stormbridge\n\
                    data: {\"context\":{\"inquiry_id\":\"i-1\"}}\n\
                    \n";
        let server_handle = tokio::spawn(server.serve_events(body));

        let listener =
            StreamListener::new(cfg, controller).with_backoff(Duration::from_millis(10));
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let run_handle = tokio::spawn(async move {
            listener.run(events_tx, shutdown_rx).await;
        });

        let announcement = tokio::time::timeout(Duration::from_secs(2), events_rx.recv())
            .await
            .expect("should receive an announcement")
            .expect("channel should stay open");
        assert_eq!(announcement.message.as_deref(), Some("hello"));
        assert_eq!(announcement.user.as_deref(), Some("alice"));

        // The non-matching route key and the enquiry event are not relayed.
        assert!(events_rx.try_recv().is_err());

        shutdown_tx.send(true).unwrap();
        server_handle.await.unwrap();
        let stopped = tokio::time::timeout(Duration::from_secs(2), run_handle).await;
        assert!(stopped.is_ok(), "listener should stop after shutdown");
    }

    #[tokio::test]
    async fn shutdown_before_start_exits_immediately() {
        let cfg = Arc::new(BridgeConfig::default());
        let controller = seeded_controller(Arc::clone(&cfg)).await;
        let listener =
            StreamListener::new(cfg, controller).with_backoff(Duration::from_millis(10));

        let (events_tx, _events_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(true);
        drop(shutdown_tx);

        let stopped = tokio::time::timeout(
            Duration::from_secs(1),
            listener.run(events_tx, shutdown_rx),
        )
        .await;
        assert!(stopped.is_ok());
    }

    #[tokio::test]
    async fn unauthorized_stream_is_an_authentication_error() {
        let server = MockStreamServer::start().await;
        let cfg = Arc::new(BridgeConfig {
            stream_url: server.base_url.clone(),
            ..BridgeConfig::default()
        });
        let controller = seeded_controller(Arc::clone(&cfg)).await;

        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let server_handle = tokio::spawn(async move {
            let (mut stream, _) = server.listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = stream.read(&mut buf).await.unwrap();
            let response = "HTTP/1.1 401 Unauthorized\r\n\
                            Content-Length: 0\r\n\
                            Connection: close\r\n\
                            \r\n";
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        });

        let listener = StreamListener::new(cfg, controller);
        let (events_tx, _events_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let token = Credential::token("bot-tok");
        let err = listener
            .listen(&token, &events_tx, &shutdown_rx)
            .await
            .unwrap_err();
        server_handle.await.unwrap();

        assert!(matches!(err, StreamError::Authentication(_)));
    }
}
