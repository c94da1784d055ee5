//! Anthropic Messages API backend

use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::client::ChatStream;
use crate::error::{LlmError, Result};
use crate::providers::sse;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Backend for direct Anthropic API calls
#[derive(Debug)]
pub struct AnthropicClient {
    api_key: String,
    http: Client,
}

impl AnthropicClient {
    pub fn new(http: Client, api_key: String) -> Self {
        Self { api_key, http }
    }

    async fn send(&self, request: &MessagesRequest) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::Api {
                message: format!("Request failed: {}", e),
                status_code: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message =
                if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_text) {
                    error_response.error.message
                } else {
                    error_text
                };
            return Err(LlmError::Api {
                message,
                status_code: Some(status.as_u16()),
            });
        }

        Ok(response)
    }

    /// Complete chat call; returns the first content block's text.
    pub async fn chat(
        &self,
        model: &str,
        max_tokens: u32,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String> {
        let request = MessagesRequest::new(model, max_tokens, system_prompt, user_message, false);
        let response = self.send(&request).await?;

        let parsed: MessagesResponse = response.json().await.map_err(|e| LlmError::Api {
            message: format!("Failed to parse Anthropic response: {}", e),
            status_code: None,
        })?;

        Ok(parsed
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .unwrap_or_default())
    }

    /// Streaming chat call; yields each text delta until `message_stop`.
    ///
    /// The transport is owned by the returned stream: dropping it at any
    /// point, consumed or not, closes the connection.
    pub async fn stream_chat(
        &self,
        model: &str,
        max_tokens: u32,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<ChatStream> {
        let request = MessagesRequest::new(model, max_tokens, system_prompt, user_message, true);
        let response = self.send(&request).await?;

        let sse = Box::pin(sse::decode(response.bytes_stream()));

        let stream = futures_util::stream::unfold(sse, |mut sse| async move {
            loop {
                let next = sse.next().await?;
                let event = match next {
                    Ok(event) => event,
                    Err(e) => return Some((Err(e), sse)),
                };

                match event.event.as_str() {
                    "content_block_delta" => {
                        let delta: ContentBlockDelta = match serde_json::from_str(&event.data) {
                            Ok(delta) => delta,
                            Err(e) => {
                                return Some((
                                    Err(LlmError::StreamParse(format!(
                                        "anthropic delta json error={} data={}",
                                        e, event.data
                                    ))),
                                    sse,
                                ));
                            }
                        };
                        if let Some(text) = text_delta(delta) {
                            return Some((Ok(text), sse));
                        }
                    }
                    "message_stop" => return None,
                    "error" => {
                        return Some((
                            Err(LlmError::Api {
                                message: event.data,
                                status_code: None,
                            }),
                            sse,
                        ));
                    }
                    _ => {}
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

/// Text of a delta event, skipping empty and non-text deltas.
fn text_delta(delta: ContentBlockDelta) -> Option<String> {
    match delta.delta {
        Delta::TextDelta { text } if !text.is_empty() => Some(text),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

impl MessagesRequest {
    fn new(
        model: &str,
        max_tokens: u32,
        system_prompt: &str,
        user_message: &str,
        stream: bool,
    ) -> Self {
        Self {
            model: model.to_string(),
            max_tokens,
            system: system_prompt.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: user_message.to_string(),
            }],
            stream: if stream { Some(true) } else { None },
        }
    }
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ContentBlockDelta {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let request = MessagesRequest::new("claude-sonnet-4-5-20250929", 100, "sys", "hello", false);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "claude-sonnet-4-5-20250929");
        assert_eq!(value["max_tokens"], 100);
        // system prompt is a top-level field, not a message
        assert_eq!(value["system"], "sys");
        assert_eq!(value["messages"].as_array().unwrap().len(), 1);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hello");
        assert!(value.get("stream").is_none());
    }

    #[test]
    fn test_response_extraction_takes_first_block() {
        let body = json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "text", "text": "second"}
            ],
            "stop_reason": "end_turn"
        });
        let parsed: MessagesResponse = serde_json::from_value(body).unwrap();
        let content = parsed
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .unwrap_or_default();
        assert_eq!(content, "first");
    }

    #[test]
    fn test_text_delta_extraction() {
        let delta: ContentBlockDelta = serde_json::from_value(json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "text_delta", "text": "frag"}
        }))
        .unwrap();
        assert_eq!(text_delta(delta).as_deref(), Some("frag"));
    }

    #[test]
    fn test_empty_and_foreign_deltas_are_skipped() {
        let empty: ContentBlockDelta = serde_json::from_value(json!({
            "delta": {"type": "text_delta", "text": ""}
        }))
        .unwrap();
        assert!(text_delta(empty).is_none());

        let foreign: ContentBlockDelta = serde_json::from_value(json!({
            "delta": {"type": "input_json_delta", "partial_json": "{"}
        }))
        .unwrap();
        assert!(text_delta(foreign).is_none());
    }

    #[test]
    fn test_error_body_decoding() {
        let body = r#"{"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}"#;
        let parsed: ErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.message, "Overloaded");
    }
}
