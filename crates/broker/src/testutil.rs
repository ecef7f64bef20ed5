//! Test doubles shared by the broker tests: a canned-response auth server
//! and a stub authentication handler.

use async_trait::async_trait;

use stormbridge_auth::{AuthHandler, SessionAccess};
use stormbridge_core::Credential;
use stormbridge_session::ManagerError;

/// Mock StackStorm auth service serving a fixed number of canned responses.
pub(crate) struct MockAuthServer {
    listener: tokio::net::TcpListener,
    pub(crate) base_url: String,
}

impl MockAuthServer {
    pub(crate) async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock server");
        let port = listener.local_addr().unwrap().port();
        let base_url = format!("http://127.0.0.1:{port}");
        Self { listener, base_url }
    }

    /// Serve `count` requests, each answered with the given status and body.
    pub(crate) async fn respond_times(self, count: usize, status_code: u16, body: &'static str) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        for _ in 0..count {
            let (mut stream, _) = self.listener.accept().await.unwrap();

            let mut buf = vec![0u8; 8192];
            let _ = stream.read(&mut buf).await.unwrap();

            let response = format!(
                "HTTP/1.1 {status_code} OK\r\n\
                 Content-Type: application/json\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\
                 \r\n\
                 {body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        }
    }
}

/// Stub handler with a fixed authentication outcome.
pub(crate) struct StubHandler {
    outcome: Option<Credential>,
}

impl StubHandler {
    /// Always authenticates, returning a token wrapping `token`.
    pub(crate) fn succeeding(token: &str) -> Self {
        Self {
            outcome: Some(Credential::token(token)),
        }
    }

    /// Never authenticates.
    pub(crate) fn failing() -> Self {
        Self { outcome: None }
    }
}

#[async_trait]
impl AuthHandler for StubHandler {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn authenticate(
        &self,
        _chat_user: Option<&str>,
        _user_creds: Option<&Credential>,
        _bot_creds: Option<&Credential>,
    ) -> Option<Credential> {
        self.outcome.clone()
    }

    async fn pre_execution_authentication(
        &self,
        access: &dyn SessionAccess,
        _chat_user: &str,
    ) -> Result<Option<Credential>, ManagerError> {
        access.token_for_user(access.bot_user_id()).await
    }
}
