// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Moderation client with a local blocklist pre-check.

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;

use corvid_core::{BotError, ModerationProvider, ModerationVerdict};

use crate::types::{ModerationRequest, ModerationResponse};

/// Moderation via the hosted endpoint, short-circuited by a compiled
/// blocklist so known-severe terms never cost a network round-trip.
#[derive(Debug, Clone)]
pub struct ModerationClient {
    client: reqwest::Client,
    base_url: String,
    blocklist: Vec<Regex>,
}

impl ModerationClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<&str>,
        blocklist_patterns: &[String],
    ) -> Result<Self, BotError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            headers.insert(
                "authorization",
                HeaderValue::from_str(&format!("Bearer {key}"))
                    .map_err(|e| BotError::Config(format!("invalid moderation API key: {e}")))?,
            );
        }
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| BotError::Network {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        let blocklist = blocklist_patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| BotError::Config(format!("invalid blocklist pattern {p:?}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            blocklist,
        })
    }
}

#[async_trait]
impl ModerationProvider for ModerationClient {
    async fn check(&self, text: &str) -> Result<ModerationVerdict, BotError> {
        for pattern in &self.blocklist {
            if pattern.is_match(text) {
                debug!("text flagged by blocklist pre-check");
                return Ok(ModerationVerdict {
                    flagged: true,
                    categories: vec!["blocklist".into()],
                });
            }
        }

        let response = self
            .client
            .post(format!("{}/moderations", self.base_url))
            .json(&ModerationRequest {
                input: text.to_string(),
            })
            .send()
            .await
            .map_err(|e| BotError::Network {
                message: format!("moderation request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Upstream {
                message: format!("moderation returned {status}: {body}"),
                status_code: Some(status.as_u16()),
            });
        }

        let body: ModerationResponse = response.json().await.map_err(|e| BotError::Upstream {
            message: format!("failed to parse moderation response: {e}"),
            status_code: None,
        })?;

        let verdict = body
            .results
            .first()
            .map(|r| ModerationVerdict {
                flagged: r.flagged,
                categories: r
                    .categories
                    .iter()
                    .filter(|(_, flagged)| **flagged)
                    .map(|(name, _)| name.clone())
                    .collect(),
            })
            .unwrap_or_default();

        Ok(verdict)
    }
}
