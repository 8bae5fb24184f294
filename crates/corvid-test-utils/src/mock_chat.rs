// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat backend with pre-configured responses.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use corvid_core::{BotError, ChatBackend, ChatContext, ChatResponse};

/// One recorded chat dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCall {
    pub prompt: String,
    pub context: ChatContext,
}

/// A mock chat backend that pops pre-configured results from a FIFO queue.
///
/// When the queue is empty the prompt is echoed back with fresh continuity
/// IDs, so happy-path tests need no scripting at all.
pub struct MockChat {
    results: Arc<Mutex<VecDeque<Result<ChatResponse, BotError>>>>,
    calls: Arc<Mutex<Vec<ChatCall>>>,
}

impl MockChat {
    pub fn new() -> Self {
        Self {
            results: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queues a response for the next `send_message` call.
    pub async fn push_response(&self, response: ChatResponse) {
        self.results.lock().await.push_back(Ok(response));
    }

    /// Queues a plain-text response for the next `send_message` call.
    pub async fn push_text(&self, text: impl Into<String>) {
        self.push_response(ChatResponse {
            text: text.into(),
            conversation_id: Some("conv-scripted".into()),
            message_id: Some("msg-scripted".into()),
            account_id: None,
        })
        .await;
    }

    /// Queues an error for the next `send_message` call.
    pub async fn push_error(&self, error: BotError) {
        self.results.lock().await.push_back(Err(error));
    }

    /// Returns the recorded dispatches in order.
    pub async fn calls(&self) -> Vec<ChatCall> {
        self.calls.lock().await.clone()
    }
}

impl Default for MockChat {
    fn default() -> Self {
        Self::new()
    }
}

/// An [`Authenticator`] that hands out one shared [`MockChat`] per account.
///
/// Backends are created lazily and retained, so tests can script responses
/// before or after pool initialization via [`MockAuthenticator::backend`].
pub struct MockAuthenticator {
    backends: Mutex<std::collections::HashMap<String, Arc<MockChat>>>,
}

impl MockAuthenticator {
    pub fn new() -> Self {
        Self {
            backends: Mutex::new(std::collections::HashMap::new()),
        }
    }

    /// Returns the backend for `account_id`, creating it if needed.
    pub async fn backend(&self, account_id: &str) -> Arc<MockChat> {
        self.backends
            .lock()
            .await
            .entry(account_id.to_string())
            .or_insert_with(|| Arc::new(MockChat::new()))
            .clone()
    }
}

impl Default for MockAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl corvid_core::Authenticator for MockAuthenticator {
    async fn authenticate(
        &self,
        account_id: &str,
        _email: &str,
        _password: &str,
    ) -> Result<Arc<dyn ChatBackend>, BotError> {
        Ok(self.backend(account_id).await)
    }
}

#[async_trait]
impl ChatBackend for MockChat {
    async fn send_message(
        &self,
        prompt: &str,
        context: &ChatContext,
    ) -> Result<ChatResponse, BotError> {
        self.calls.lock().await.push(ChatCall {
            prompt: prompt.to_string(),
            context: context.clone(),
        });
        match self.results.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(ChatResponse {
                text: format!("echo: {prompt}"),
                conversation_id: context
                    .conversation_id
                    .clone()
                    .or_else(|| Some("conv-echo".into())),
                message_id: Some("msg-echo".into()),
                account_id: None,
            }),
        }
    }
}
