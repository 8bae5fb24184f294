// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the conversational upstream and the moderation endpoint.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Request body for the conversation RPC.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationRequest {
    pub prompt: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<String>,
}

/// Response body for the conversation RPC.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationResponse {
    pub text: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
}

/// Error body some upstream failures carry.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub message: String,
}

/// Request body for the moderation endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ModerationRequest {
    pub input: String,
}

/// Response body for the moderation endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ModerationResponse {
    pub results: Vec<ModerationResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModerationResult {
    pub flagged: bool,
    #[serde(default)]
    pub categories: HashMap<String, bool>,
}

/// Request/response bodies for the session-token endpoint used at pool init
/// and on re-auth.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionResponse {
    pub access_token: String,
}
