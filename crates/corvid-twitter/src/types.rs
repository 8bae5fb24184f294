// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the v2 social-media API.

use serde::{Deserialize, Serialize};

use corvid_core::{Author, Mention, MentionPage, TweetRef};

/// Response envelope for the mentions timeline and single-tweet lookup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TweetEnvelope<T> {
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub includes: Option<Includes>,
    #[serde(default)]
    pub meta: Option<Meta>,
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireTweet {
    pub id: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub referenced_tweets: Vec<ReferencedTweet>,
}

impl WireTweet {
    /// ID of the tweet this one replies to, per the `replied_to` reference.
    pub fn replied_to_id(&self) -> Option<String> {
        self.referenced_tweets
            .iter()
            .find(|r| r.kind == "replied_to")
            .map(|r| r.id.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferencedTweet {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Includes {
    #[serde(default)]
    pub users: Vec<WireUser>,
    #[serde(default)]
    pub tweets: Vec<WireTweet>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub public_metrics: Option<PublicMetrics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub followers_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Per-item error object, returned alongside `data` for partial failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Top-level error body for non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl ErrorBody {
    pub fn message(&self) -> String {
        self.detail
            .clone()
            .or_else(|| self.error_description.clone())
            .or_else(|| self.title.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateTweetRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplySettings>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplySettings {
    pub in_reply_to_tweet_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTweetResponse {
    pub data: CreatedTweet,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedTweet {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshTokenRequest<'a> {
    pub grant_type: &'a str,
    pub refresh_token: &'a str,
    pub client_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

fn author_from_wire(user: WireUser) -> Author {
    Author {
        id: user.id,
        username: user.username,
        name: user.name,
        num_followers: user.public_metrics.map(|m| m.followers_count).unwrap_or(0),
    }
}

pub fn tweet_ref_from_wire(tweet: WireTweet) -> TweetRef {
    let replied_to_id = tweet.replied_to_id();
    TweetRef {
        id: tweet.id,
        author_id: tweet.author_id.unwrap_or_default(),
        text: tweet.text,
        replied_to_id,
    }
}

/// Flattens a timeline envelope into a [`MentionPage`] with side-tables.
pub fn page_from_envelope(envelope: TweetEnvelope<Vec<WireTweet>>) -> MentionPage {
    let mut page = MentionPage::default();
    for tweet in envelope.data.unwrap_or_default() {
        let replied_to_id = tweet.replied_to_id();
        page.mentions.push(Mention {
            id: tweet.id,
            author_id: tweet.author_id.unwrap_or_default(),
            text: tweet.text,
            created_at: tweet.created_at,
            replied_to_id,
            prompt: None,
            num_mentions: 0,
            num_followers: 0,
            priority_score: 0.0,
            use_priority_model: false,
        });
    }
    if let Some(includes) = envelope.includes {
        for user in includes.users {
            let author = author_from_wire(user);
            page.authors.insert(author.id.clone(), author);
        }
        for tweet in includes.tweets {
            let tweet = tweet_ref_from_wire(tweet);
            page.referenced_tweets.insert(tweet.id.clone(), tweet);
        }
    }
    page
}
