//! Mock StackStorm server and a stub [`SessionAccess`] for handler tests.

use std::sync::Arc;

use async_trait::async_trait;

use stormbridge_core::{Credential, SessionError};
use stormbridge_secrets_memory::ClearTextSecretStore;
use stormbridge_session::{ManagerError, Session, SessionManager};

use crate::handler::SessionAccess;

pub(crate) struct MockSt2Server {
    listener: tokio::net::TcpListener,
    pub(crate) base_url: String,
}

impl MockSt2Server {
    pub(crate) async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock server");
        let port = listener.local_addr().unwrap().port();
        let base_url = format!("http://127.0.0.1:{port}");
        Self { listener, base_url }
    }

    /// Accept one connection and respond with the given status code and JSON
    /// body, then shut down.
    pub(crate) async fn respond_once(self, status_code: u16, body: &str) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let body = body.to_owned();
        let (mut stream, _) = self.listener.accept().await.unwrap();

        // Read the full request (we don't parse it -- just drain it).
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

/// In-memory [`SessionAccess`] over a real session manager.
pub(crate) struct StubAccess {
    manager: SessionManager,
    bot_id: String,
}

impl StubAccess {
    pub(crate) fn new() -> Self {
        Self {
            manager: SessionManager::new(Arc::new(ClearTextSecretStore::new())),
            bot_id: "bot%test".to_owned(),
        }
    }

    /// Create an unsealed bot session without a token.
    pub(crate) async fn seed_bot_session(&self) -> Session {
        let session = self
            .manager
            .create(&self.bot_id, "bot-secret", 3600)
            .await
            .unwrap();
        self.manager.consume(&session.id()).await.unwrap();
        session
    }

    /// Create the bot session and cache `token` under it.
    pub(crate) async fn seed_bot_token(&self, token: Credential) {
        let session = self.seed_bot_session().await;
        self.manager.put_secret(&session.id(), token).await.unwrap();
    }
}

#[async_trait]
impl SessionAccess for StubAccess {
    fn bot_user_id(&self) -> &str {
        &self.bot_id
    }

    async fn token_for_user(&self, user_id: &str) -> Result<Option<Credential>, ManagerError> {
        let session = self.manager.get_by_user_id(user_id).await?;
        self.manager.get_secret(&session.id()).await
    }

    async fn token_for_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Credential>, ManagerError> {
        self.manager.get_secret(session_id).await
    }

    async fn session_for_user(&self, user_id: &str) -> Result<Session, SessionError> {
        self.manager.get_by_user_id(user_id).await
    }

    async fn create_session(
        &self,
        user_id: &str,
        user_secret: &str,
    ) -> Result<Session, SessionError> {
        self.manager.create(user_id, user_secret, 3600).await
    }

    async fn store_token_for_session(
        &self,
        session_id: &str,
        token: Credential,
    ) -> Result<(), ManagerError> {
        self.manager.put_secret(session_id, token).await
    }
}
