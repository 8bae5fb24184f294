// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the conversational upstream.
//!
//! One [`ChatClient`] per pool account. This is the single classification
//! point for the upstream error taxonomy: HTTP status failures, transport
//! errors, timeouts, and the known in-band error strings all surface as
//! typed [`BotError`] variants here, never anywhere downstream.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;

use corvid_core::{BotError, ChatBackend, ChatContext, ChatResponse};

use crate::types::{ApiErrorResponse, ConversationRequest, ConversationResponse};

/// Rate-limit phrases the upstream embeds in otherwise-valid response text.
const IN_BAND_RATE_LIMIT: [&str; 2] = [
    "too many requests, please slow down",
    "too many requests in 1 hour. try again later",
];

/// Session-expiry phrases the upstream embeds in otherwise-valid response
/// text.
const IN_BAND_SESSION_EXPIRED: [&str; 3] = [
    "your authentication token has expired",
    "please try signing in again",
    "your session has expired",
];

/// One authenticated session against the conversational upstream.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    priority_model: Option<String>,
}

impl ChatClient {
    pub fn new(
        base_url: impl Into<String>,
        access_token: &str,
        model: impl Into<String>,
        priority_model: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BotError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {access_token}"))
                .map_err(|e| BotError::Config(format!("invalid access token: {e}")))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::Network {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            priority_model,
        })
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn send_message(
        &self,
        prompt: &str,
        ctx: &ChatContext,
    ) -> Result<ChatResponse, BotError> {
        let model = if ctx.use_priority_model {
            self.priority_model.as_deref().unwrap_or(&self.model)
        } else {
            &self.model
        };

        let request = ConversationRequest {
            prompt: prompt.to_string(),
            model: model.to_string(),
            conversation_id: ctx.conversation_id.clone(),
            parent_message_id: ctx.parent_message_id.clone(),
        };

        let response = self
            .client
            .post(format!("{}/conversation", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        debug!(status = %status, "conversation response received");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!("{}: {}", api_err.error.type_, api_err.error.message),
                Err(_) => format!("upstream returned {status}: {body}"),
            };
            return Err(BotError::Upstream {
                message,
                status_code: Some(status.as_u16()),
            });
        }

        let body: ConversationResponse =
            response.json().await.map_err(|e| BotError::Upstream {
                message: format!("failed to parse conversation response: {e}"),
                status_code: None,
            })?;

        // The upstream sometimes reports errors as chat text with a 200.
        // Treat those as structured errors, never as valid responses.
        let text_lower = body.text.to_lowercase();
        if IN_BAND_RATE_LIMIT.iter().any(|s| text_lower.contains(s)) {
            return Err(BotError::UpstreamRateLimited);
        }
        if IN_BAND_SESSION_EXPIRED
            .iter()
            .any(|s| text_lower.contains(s))
        {
            return Err(BotError::UpstreamSessionExpired { message: body.text });
        }

        Ok(ChatResponse {
            text: body.text,
            conversation_id: body.conversation_id,
            message_id: body.message_id,
            account_id: None,
        })
    }
}

/// Maps reqwest transport failures onto the taxonomy: deadline overruns are
/// timeouts, everything else is a network outage.
fn classify_transport_error(e: reqwest::Error) -> BotError {
    if e.is_timeout() {
        BotError::UpstreamTimeout
    } else {
        BotError::Network {
            message: format!("chat request failed: {e}"),
        }
    }
}
