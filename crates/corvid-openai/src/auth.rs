// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session minting for pool accounts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use corvid_core::{Authenticator, BotError, ChatBackend};

use crate::chat::ChatClient;
use crate::types::{SessionRequest, SessionResponse};

/// Exchanges account credentials for an access token at the upstream's
/// session endpoint and builds a fresh [`ChatClient`] around it.
///
/// Deployments with a browser-automation credential bootstrap implement
/// [`Authenticator`] themselves; this is the plain token-endpoint flow.
pub struct TokenAuthenticator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    priority_model: Option<String>,
    request_timeout: Duration,
}

impl TokenAuthenticator {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        priority_model: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, BotError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BotError::Network {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            priority_model,
            request_timeout,
        })
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn authenticate(
        &self,
        account_id: &str,
        email: &str,
        password: &str,
    ) -> Result<Arc<dyn ChatBackend>, BotError> {
        let response = self
            .client
            .post(format!("{}/auth/session", self.base_url))
            .json(&SessionRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(|e| BotError::Network {
                message: format!("session request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BotError::ChatAuthExpired {
                account_id: Some(account_id.to_string()),
            });
        }

        let session: SessionResponse = response.json().await.map_err(|e| BotError::Upstream {
            message: format!("failed to parse session response: {e}"),
            status_code: None,
        })?;

        info!(account_id, "obtained chat session token");
        let client = ChatClient::new(
            self.base_url.clone(),
            &session.access_token,
            self.model.clone(),
            self.priority_model.clone(),
            self.request_timeout,
        )?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn successful_auth_yields_a_working_client() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/session"))
            .and(body_partial_json(serde_json::json!({
                "email": "bot@example.com"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-fresh"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/conversation"))
            .and(wiremock::matchers::header("authorization", "Bearer tok-fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "hello"
            })))
            .mount(&server)
            .await;

        let auth = TokenAuthenticator::new(
            server.uri(),
            "gpt-4o-mini",
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        let backend = auth
            .authenticate("acct", "bot@example.com", "pw")
            .await
            .unwrap();
        let response = backend
            .send_message("hi", &corvid_core::ChatContext::default())
            .await
            .unwrap();
        assert_eq!(response.text, "hello");
    }

    #[tokio::test]
    async fn rejected_credentials_map_to_auth_expired() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/session"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let auth = TokenAuthenticator::new(server.uri(), "gpt-4o-mini", None, Duration::from_secs(5))
            .unwrap();
        let err = auth
            .authenticate("acct", "bot@example.com", "bad")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BotError::ChatAuthExpired { .. }));
    }
}
