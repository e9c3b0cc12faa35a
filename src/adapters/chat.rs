//! Streaming chat completion client.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::{ByteStream, ChatEndpoint, DispatchError};
use crate::domain::{Message, Role};

/// Message as sent on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl ChatRequest {
    pub fn new<'a>(messages: impl IntoIterator<Item = &'a Message>) -> Self {
        Self {
            messages: messages.into_iter().map(WireMessage::from).collect(),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.system_prompt = (!prompt.is_empty()).then_some(prompt);
        self
    }
}

/// POSTs the message list and hands back the raw body stream
pub struct ChatClient {
    endpoint: String,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ChatEndpoint for ChatClient {
    async fn stream(&self, request: &ChatRequest) -> Result<ByteStream, DispatchError> {
        tracing::debug!(messages = request.messages.len(), "Dispatching chat request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| DispatchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| DispatchError::Body(e.to_string()))
        });
        Ok(Box::pin(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let messages = vec![Message::new(Role::User, "Hello there")];
        let request = ChatRequest::new(&messages).with_system_prompt("Be brief.");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Hello there");
        assert_eq!(json["systemPrompt"], "Be brief.");
    }

    #[test]
    fn test_empty_prompt_is_omitted() {
        let request = ChatRequest::new(&[]).with_system_prompt("");
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"messages":[]}"#);
    }
}
