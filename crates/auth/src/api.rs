use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use stormbridge_core::Credential;

/// Bound on every outbound StackStorm call.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of a successful token issue/validate response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

/// Thin client for the StackStorm auth/API endpoints the handlers call.
///
/// Every call has a bounded timeout and honors the configured certificate
/// verification toggle. Failures — connection errors, unexpected status
/// codes, malformed bodies — are logged and normalized to `None`; they are
/// expected outcomes of bad user input, never propagated as crashes.
pub(crate) struct St2Client {
    client: reqwest::Client,
}

impl St2Client {
    pub(crate) fn new(verify_cert: bool) -> Self {
        let mut builder = reqwest::Client::builder().timeout(HTTP_TIMEOUT);
        if !verify_cert {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build().expect("failed to build HTTP client");
        Self { client }
    }

    fn join(base: &str, path: &str) -> String {
        format!("{}{path}", base.trim_end_matches('/'))
    }

    fn apply_headers(
        mut request: reqwest::RequestBuilder,
        creds: &Credential,
    ) -> reqwest::RequestBuilder {
        for (name, value) in creds.http_headers() {
            request = request.header(name, value);
        }
        request
    }

    /// `POST {auth_url}/tokens` with the credential's auth headers.
    ///
    /// A `201 Created` response carries the issued token.
    pub(crate) async fn request_token(
        &self,
        auth_url: &str,
        creds: &Credential,
        ttl_seconds: u64,
    ) -> Option<Credential> {
        let url = Self::join(auth_url, "/tokens");
        let request = Self::apply_headers(self.client.post(&url), creds)
            .json(&serde_json::json!({ "ttl": ttl_seconds }));

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "token request to the auth service failed");
                return None;
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::CREATED {
            info!(%status, "auth service declined the token request");
            return None;
        }

        token_from_body(response).await
    }

    /// `GET {auth_url}/token/validate` with the token's auth headers.
    ///
    /// The auth service echoes the token back on success.
    pub(crate) async fn validate_token(
        &self,
        auth_url: &str,
        creds: &Credential,
    ) -> Option<Credential> {
        let url = Self::join(auth_url, "/token/validate");
        let request = Self::apply_headers(self.client.get(&url), creds);

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "token validation request failed");
                return None;
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::CREATED {
            info!(%status, "auth service declined the token validation");
            return None;
        }

        token_from_body(response).await
    }

    /// `GET {api_url}/` with the key's auth headers.
    ///
    /// A `200 OK` confirms the key is valid; the key itself is returned so it
    /// can be used for subsequent requests.
    pub(crate) async fn validate_api_key(
        &self,
        api_url: &str,
        creds: &Credential,
    ) -> Option<Credential> {
        let url = Self::join(api_url, "/");
        let request = Self::apply_headers(self.client.get(&url), creds);

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "api key validation request failed");
                return None;
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            info!(%status, "api service declined the api key");
            return None;
        }

        Some(creds.clone())
    }

    /// `GET {auth_url}/tokens/validate` with the bot's auth headers and a
    /// request payload.
    ///
    /// Used by the server-side and client-side models to obtain a user-scoped
    /// token through the bot's credential.
    pub(crate) async fn request_user_token(
        &self,
        auth_url: &str,
        bot_creds: &Credential,
        payload: &serde_json::Value,
    ) -> Option<Credential> {
        let url = Self::join(auth_url, "/tokens/validate");
        let request = Self::apply_headers(self.client.get(&url), bot_creds).json(payload);

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "user token request failed");
                return None;
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            info!(%status, "auth service declined the user token request");
            return None;
        }

        token_from_body(response).await
    }
}

/// Extract the token from a successful auth service response body.
async fn token_from_body(response: reqwest::Response) -> Option<Credential> {
    match response.json::<TokenResponse>().await {
        Ok(TokenResponse { token: Some(token) }) => Some(Credential::token(token)),
        Ok(TokenResponse { token: None }) => {
            warn!("token not found in auth service response");
            None
        }
        Err(err) => {
            warn!(error = %err, "malformed auth service response");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockSt2Server;

    #[tokio::test]
    async fn request_token_on_201() {
        let server = MockSt2Server::start().await;
        let base = server.base_url.clone();
        let handle =
            tokio::spawn(async move { server.respond_once(201, r#"{"token":"abc"}"#).await });

        let client = St2Client::new(true);
        let token = client
            .request_token(&base, &Credential::user("alice", "pw"), 60)
            .await;
        handle.await.unwrap();

        assert_eq!(token, Some(Credential::token("abc")));
    }

    #[tokio::test]
    async fn request_token_rejected_on_400() {
        let server = MockSt2Server::start().await;
        let base = server.base_url.clone();
        let handle = tokio::spawn(async move {
            server
                .respond_once(400, r#"{"faultstring":"bad credentials"}"#)
                .await;
        });

        let client = St2Client::new(true);
        let token = client
            .request_token(&base, &Credential::user("alice", "pw"), 60)
            .await;
        handle.await.unwrap();

        assert!(token.is_none());
    }

    #[tokio::test]
    async fn request_token_with_missing_body_token() {
        let server = MockSt2Server::start().await;
        let base = server.base_url.clone();
        let handle = tokio::spawn(async move { server.respond_once(201, r"{}").await });

        let client = St2Client::new(true);
        let token = client
            .request_token(&base, &Credential::user("alice", "pw"), 60)
            .await;
        handle.await.unwrap();

        assert!(token.is_none());
    }

    #[tokio::test]
    async fn validate_api_key_on_200() {
        let server = MockSt2Server::start().await;
        let base = server.base_url.clone();
        let handle = tokio::spawn(async move { server.respond_once(200, r"{}").await });

        let key = Credential::api_key("key-1");
        let client = St2Client::new(true);
        let validated = client.validate_api_key(&base, &key).await;
        handle.await.unwrap();

        assert_eq!(validated, Some(key));
    }

    #[tokio::test]
    async fn connection_error_yields_none() {
        // Nothing listens on this port.
        let client = St2Client::new(true);
        let token = client
            .validate_token("http://127.0.0.1:1", &Credential::token("t"))
            .await;
        assert!(token.is_none());
    }
}
