//! Outbound chat client.
//!
//! One `POST` per turn to the character chat endpoint:
//! request `{character, user_message, personality, creativity}`,
//! response `{response}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use cinechat_core::types::FineTuneSettings;

use crate::error::ChatError;

/// Request body sent to the chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub character: String,
    pub user_message: String,
    pub personality: u8,
    pub creativity: u8,
}

impl ChatRequest {
    pub fn new(character: &str, user_message: &str, settings: FineTuneSettings) -> Self {
        Self {
            character: character.to_string(),
            user_message: user_message.to_string(),
            personality: settings.personality(),
            creativity: settings.creativity(),
        }
    }
}

/// Response body expected from the chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
}

/// The remote persona service.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one turn and return the character's reply text.
    async fn send(&self, request: &ChatRequest) -> Result<String, ChatError>;
}

/// [`ChatBackend`] speaking JSON over HTTP.
///
/// No timeout and no retry: a hung endpoint keeps the request pending.
pub struct HttpChatBackend {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpChatBackend {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn send(&self, request: &ChatRequest) -> Result<String, ChatError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ChatError::Status(status.as_u16()));
        }

        let body = resp.text().await?;
        let reply: ChatReply =
            serde_json::from_str(&body).map_err(|e| ChatError::Decode(e.to_string()))?;
        Ok(reply.response)
    }
}
