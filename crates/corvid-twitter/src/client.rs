// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the v2 social-media API.
//!
//! Implements both sides of the feed seam: [`MentionsFeed`] for reading the
//! mentions timeline and [`ReplyPoster`] for posting replies through the
//! client-side throttle. Non-2xx responses are mapped onto the error taxonomy
//! the orchestrator keys its session flags off: 403 is a permanent refusal,
//! 429 a feed rate limit, and an invalid-token 400/401 a recoverable auth
//! failure the outer loop answers with a token refresh.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use corvid_config::TwitterConfig;
use corvid_core::{BotError, FeedPage, MentionsFeed, ReplyPoster, TweetRef};

use crate::throttle::PostThrottle;
use crate::types::{
    CreateTweetRequest, CreateTweetResponse, ErrorBody, RefreshTokenRequest, ReplySettings,
    TweetEnvelope, WireTweet, page_from_envelope, tweet_ref_from_wire,
};

const MENTION_EXPANSIONS: &str = "author_id,referenced_tweets.id";
const TWEET_FIELDS: &str = "author_id,created_at,referenced_tweets,text";
const USER_FIELDS: &str = "public_metrics";
const PAGE_SIZE: &str = "100";

/// Feed client holding the OAuth2 access token behind a lock so the outer
/// loop can swap it after a refresh without rebuilding in-flight clients.
pub struct TwitterClient {
    client: reqwest::Client,
    base_url: String,
    access_token: RwLock<String>,
    client_id: Option<String>,
    throttle: PostThrottle,
}

impl TwitterClient {
    pub fn new(config: &TwitterConfig) -> Result<Self, BotError> {
        let access_token = config
            .access_token
            .clone()
            .ok_or_else(|| BotError::Config("twitter.access_token is required".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BotError::Network {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: RwLock::new(access_token),
            client_id: config.client_id.clone(),
            throttle: PostThrottle::new(
                config.post_quota as usize,
                Duration::from_secs(config.post_window_secs),
                Duration::from_millis(config.post_spacing_ms),
            ),
        })
    }

    /// Replaces the access token used for subsequent requests.
    pub async fn set_access_token(&self, token: String) {
        *self.access_token.write().await = token;
    }

    /// Exchanges `refresh_token` for a new token pair and installs the new
    /// access token. Returns the rotated refresh token, if the server issued
    /// one, for the caller to persist.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<String>, BotError> {
        let client_id = self
            .client_id
            .as_deref()
            .ok_or_else(|| BotError::Config("twitter.client_id is required for refresh".into()))?;

        let response = self
            .client
            .post(format!("{}/oauth2/token", self.base_url))
            .form(&RefreshTokenRequest {
                grant_type: "refresh_token",
                refresh_token,
                client_id,
            })
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "token refresh failed");
            return Err(map_status_error(status.as_u16(), parse_error_message(&body)));
        }

        let tokens: crate::types::RefreshTokenResponse =
            response.json().await.map_err(|e| BotError::Network {
                message: format!("failed to parse token response: {e}"),
            })?;
        self.set_access_token(tokens.access_token).await;
        debug!("feed access token refreshed");
        Ok(tokens.refresh_token)
    }

    async fn bearer(&self) -> String {
        self.access_token.read().await.clone()
    }
}

#[async_trait]
impl MentionsFeed for TwitterClient {
    async fn fetch_mentions(
        &self,
        user_id: &str,
        since_id: Option<&str>,
        pagination_token: Option<&str>,
    ) -> Result<FeedPage, BotError> {
        let mut query: Vec<(&str, &str)> = vec![
            ("expansions", MENTION_EXPANSIONS),
            ("tweet.fields", TWEET_FIELDS),
            ("user.fields", USER_FIELDS),
            ("max_results", PAGE_SIZE),
        ];
        if let Some(since_id) = since_id {
            query.push(("since_id", since_id));
        }
        if let Some(token) = pagination_token {
            query.push(("pagination_token", token));
        }

        let response = self
            .client
            .get(format!("{}/users/{user_id}/mentions", self.base_url))
            .bearer_auth(self.bearer().await)
            .query(&query)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status.as_u16(), parse_error_message(&body)));
        }

        let envelope: TweetEnvelope<Vec<WireTweet>> =
            response.json().await.map_err(|e| BotError::Network {
                message: format!("failed to parse mentions response: {e}"),
            })?;
        let next_token = envelope.meta.as_ref().and_then(|m| m.next_token.clone());
        debug!(
            mentions = envelope.data.as_ref().map(Vec::len).unwrap_or(0),
            has_next = next_token.is_some(),
            "fetched mentions page"
        );
        Ok(FeedPage {
            page: page_from_envelope(envelope),
            next_token,
        })
    }

    async fn find_tweet(&self, tweet_id: &str) -> Result<Option<TweetRef>, BotError> {
        let response = self
            .client
            .get(format!("{}/tweets/{tweet_id}", self.base_url))
            .bearer_auth(self.bearer().await)
            .query(&[("expansions", "referenced_tweets.id"), ("tweet.fields", TWEET_FIELDS)])
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status.as_u16(), parse_error_message(&body)));
        }

        let envelope: TweetEnvelope<WireTweet> =
            response.json().await.map_err(|e| BotError::Network {
                message: format!("failed to parse tweet response: {e}"),
            })?;

        match envelope.data {
            Some(tweet) => Ok(Some(tweet_ref_from_wire(tweet))),
            // Deleted and protected tweets come back 200 with a per-item
            // error instead of a body.
            None => {
                if let Some(err) = envelope
                    .errors
                    .iter()
                    .find(|e| e.title.as_deref() == Some("Authorization Error"))
                {
                    return Err(BotError::TwitterForbidden {
                        message: err.detail.clone().unwrap_or_default(),
                    });
                }
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ReplyPoster for TwitterClient {
    async fn post_reply(
        &self,
        text: &str,
        in_reply_to_id: Option<&str>,
    ) -> Result<String, BotError> {
        self.throttle.acquire().await;

        let request = CreateTweetRequest {
            text: text.to_string(),
            reply: in_reply_to_id.map(|id| ReplySettings {
                in_reply_to_tweet_id: id.to_string(),
            }),
        };

        let response = self
            .client
            .post(format!("{}/tweets", self.base_url))
            .bearer_auth(self.bearer().await)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                in_reply_to = in_reply_to_id.unwrap_or("-"),
                "reply post rejected"
            );
            return Err(map_status_error(status.as_u16(), parse_error_message(&body)));
        }

        let created: CreateTweetResponse =
            response.json().await.map_err(|e| BotError::Network {
                message: format!("failed to parse create response: {e}"),
            })?;
        debug!(tweet_id = %created.data.id, "posted reply");
        Ok(created.data.id)
    }
}

fn parse_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message())
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string())
}

/// Maps a non-2xx status and error message onto the feed error taxonomy.
fn map_status_error(status: u16, message: String) -> BotError {
    match status {
        403 => BotError::TwitterForbidden { message },
        429 => BotError::TwitterRateLimit,
        401 => BotError::TwitterAuth,
        400 if message
            .to_lowercase()
            .contains("value passed for the token was invalid") =>
        {
            BotError::TwitterAuth
        }
        _ => BotError::Unknown {
            message: format!("feed returned {status}: {message}"),
            account_id: None,
            is_final: false,
        },
    }
}

fn classify_transport_error(err: reqwest::Error) -> BotError {
    BotError::Network {
        message: format!("feed request failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> TwitterConfig {
        TwitterConfig {
            base_url: server.uri(),
            access_token: Some("tok-1".into()),
            refresh_token: Some("refresh-1".into()),
            client_id: Some("client-1".into()),
            post_spacing_ms: 0,
            ..TwitterConfig::default()
        }
    }

    #[tokio::test]
    async fn fetch_mentions_sends_cursor_and_parses_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/u-bot/mentions"))
            .and(query_param("since_id", "1400"))
            .and(query_param("pagination_token", "page-2"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{
                    "id": "1500",
                    "author_id": "u1",
                    "text": "@bot hi",
                    "referenced_tweets": [{"type": "replied_to", "id": "1400"}]
                }],
                "includes": {
                    "users": [{
                        "id": "u1",
                        "username": "alice",
                        "name": "Alice",
                        "public_metrics": {"followers_count": 9}
                    }],
                    "tweets": [{"id": "1400", "author_id": "u-bot", "text": "earlier"}]
                },
                "meta": {"next_token": "page-3"}
            })))
            .mount(&server)
            .await;

        let client = TwitterClient::new(&config(&server)).unwrap();
        let page = client
            .fetch_mentions("u-bot", Some("1400"), Some("page-2"))
            .await
            .unwrap();

        assert_eq!(page.next_token.as_deref(), Some("page-3"));
        assert_eq!(page.page.mentions.len(), 1);
        assert_eq!(page.page.mentions[0].replied_to_id.as_deref(), Some("1400"));
        assert_eq!(page.page.authors["u1"].num_followers, 9);
        assert_eq!(page.page.referenced_tweets["1400"].author_id, "u-bot");
    }

    #[tokio::test]
    async fn post_reply_threads_and_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tweets"))
            .and(body_partial_json(serde_json::json!({
                "text": "hello there",
                "reply": {"in_reply_to_tweet_id": "1500"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "data": {"id": "1501", "text": "hello there"}
            })))
            .mount(&server)
            .await;

        let client = TwitterClient::new(&config(&server)).unwrap();
        let id = client.post_reply("hello there", Some("1500")).await.unwrap();
        assert_eq!(id, "1501");
    }

    #[tokio::test]
    async fn forbidden_post_is_a_permanent_refusal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tweets"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "title": "Forbidden",
                "detail": "You are not allowed to create a Tweet with duplicate content."
            })))
            .mount(&server)
            .await;

        let client = TwitterClient::new(&config(&server)).unwrap();
        let err = client.post_reply("dup", Some("1500")).await.unwrap_err();
        assert!(matches!(err, BotError::TwitterForbidden { .. }));
        assert!(err.is_final());
    }

    #[tokio::test]
    async fn rate_limited_fetch_maps_to_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/u-bot/mentions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = TwitterClient::new(&config(&server)).unwrap();
        let err = client.fetch_mentions("u-bot", None, None).await.unwrap_err();
        assert!(matches!(err, BotError::TwitterRateLimit));
        assert!(!err.is_final());
    }

    #[tokio::test]
    async fn invalid_token_maps_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/u-bot/mentions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error_description": "Value passed for the token was invalid."
            })))
            .mount(&server)
            .await;

        let client = TwitterClient::new(&config(&server)).unwrap();
        let err = client.fetch_mentions("u-bot", None, None).await.unwrap_err();
        assert!(matches!(err, BotError::TwitterAuth));
    }

    #[tokio::test]
    async fn find_tweet_returns_none_for_deleted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tweets/1400"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "errors": [{
                    "title": "Not Found Error",
                    "detail": "Could not find tweet with id: [1400]."
                }]
            })))
            .mount(&server)
            .await;

        let client = TwitterClient::new(&config(&server)).unwrap();
        assert!(client.find_tweet("1400").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_tweet_surfaces_authorization_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tweets/1400"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "errors": [{
                    "title": "Authorization Error",
                    "detail": "Sorry, you are not authorized to see this Tweet."
                }]
            })))
            .mount(&server)
            .await;

        let client = TwitterClient::new(&config(&server)).unwrap();
        let err = client.find_tweet("1400").await.unwrap_err();
        assert!(matches!(err, BotError::TwitterForbidden { .. }));
    }

    #[tokio::test]
    async fn refresh_installs_new_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-2",
                "refresh_token": "refresh-2"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/u-bot/mentions"))
            .and(header("authorization", "Bearer tok-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [], "meta": {}
            })))
            .mount(&server)
            .await;

        let client = TwitterClient::new(&config(&server)).unwrap();
        let rotated = client.refresh_access_token("refresh-1").await.unwrap();
        assert_eq!(rotated.as_deref(), Some("refresh-2"));

        // Subsequent requests carry the new token; the header matcher above
        // only answers Bearer tok-2.
        let page = client.fetch_mentions("u-bot", None, None).await.unwrap();
        assert!(page.page.is_empty());
    }

    #[test]
    fn missing_access_token_is_a_config_error() {
        let config = TwitterConfig::default();
        assert!(matches!(
            TwitterClient::new(&config),
            Err(BotError::Config(_))
        ));
    }
}
