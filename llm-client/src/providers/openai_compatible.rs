//! OpenAI-compatible chat completions backend
//!
//! Used for providers that implement the OpenAI chat completions API:
//! - OpenAI itself
//! - OpenRouter

use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::client::ChatStream;
use crate::error::{LlmError, Result};
use crate::providers::sse;

/// Backend for OpenAI-compatible APIs
#[derive(Debug)]
pub struct OpenAiCompatibleClient {
    base_url: String,
    api_key: String,
    name: &'static str,
    http: Client,
}

impl OpenAiCompatibleClient {
    pub fn new(http: Client, base_url: &str, api_key: String, name: &'static str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            name,
            http,
        }
    }

    pub fn openai(http: Client, api_key: String) -> Self {
        Self::new(http, "https://api.openai.com/v1", api_key, "OpenAI")
    }

    pub fn openrouter(http: Client, api_key: String) -> Self {
        Self::new(http, "https://openrouter.ai/api/v1", api_key, "OpenRouter")
    }

    async fn send(&self, request: &ChatCompletionRequest) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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

    /// Complete chat call; returns the first choice's message content.
    pub async fn chat(
        &self,
        model: &str,
        max_tokens: u32,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String> {
        let request =
            ChatCompletionRequest::new(model, max_tokens, system_prompt, user_message, false);
        let response = self.send(&request).await?;

        let parsed: ChatCompletionResponse =
            response.json().await.map_err(|e| LlmError::Api {
                message: format!("Failed to parse {} response: {}", self.name, e),
                status_code: None,
            })?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default())
    }

    /// Streaming chat call; yields each non-empty delta until `[DONE]`.
    pub async fn stream_chat(
        &self,
        model: &str,
        max_tokens: u32,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<ChatStream> {
        let request =
            ChatCompletionRequest::new(model, max_tokens, system_prompt, user_message, true);
        let response = self.send(&request).await?;

        let name = self.name;
        let sse = Box::pin(sse::decode(response.bytes_stream()));

        let stream = futures_util::stream::unfold(sse, move |mut sse| async move {
            loop {
                let next = sse.next().await?;
                let event = match next {
                    Ok(event) => event,
                    Err(e) => return Some((Err(e), sse)),
                };

                if event.data.trim() == "[DONE]" {
                    return None;
                }

                let chunk: StreamResponseChunk = match serde_json::from_str(&event.data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        return Some((
                            Err(LlmError::StreamParse(format!(
                                "{} chunk json error={} data={}",
                                name, e, event.data
                            ))),
                            sse,
                        ));
                    }
                };

                if let Some(fragment) = delta_fragment(chunk) {
                    return Some((Ok(fragment), sse));
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

/// First choice's delta content, skipping empty or absent deltas.
fn delta_fragment(chunk: StreamResponseChunk) -> Option<String> {
    chunk
        .choices
        .into_iter()
        .next()?
        .delta
        .content
        .filter(|c| !c.is_empty())
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

impl ChatCompletionRequest {
    fn new(
        model: &str,
        max_tokens: u32,
        system_prompt: &str,
        user_message: &str,
        stream: bool,
    ) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user_message.to_string(),
                },
            ],
            max_completion_tokens: max_tokens,
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
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamResponseChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
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
        let request = ChatCompletionRequest::new("gpt-5.2", 3000, "sys", "hello", false);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-5.2");
        assert_eq!(value["max_completion_tokens"], 3000);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][0]["content"], "sys");
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["messages"][1]["content"], "hello");
        assert!(value.get("stream").is_none());
    }

    #[test]
    fn test_streaming_request_sets_stream_flag() {
        let request = ChatCompletionRequest::new("m", 100, "s", "u", true);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["stream"], true);
    }

    #[test]
    fn test_response_extraction_takes_first_choice() {
        let body = json!({
            "choices": [
                {"message": {"role": "assistant", "content": "first"}},
                {"message": {"role": "assistant", "content": "second"}}
            ]
        });
        let parsed: ChatCompletionResponse = serde_json::from_value(body).unwrap();
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        assert_eq!(content, "first");
    }

    #[test]
    fn test_delta_fragment_extraction() {
        let chunk: StreamResponseChunk = serde_json::from_value(json!({
            "choices": [{"delta": {"content": "frag"}}]
        }))
        .unwrap();
        assert_eq!(delta_fragment(chunk).as_deref(), Some("frag"));
    }

    #[test]
    fn test_empty_and_absent_deltas_are_skipped() {
        let empty: StreamResponseChunk = serde_json::from_value(json!({
            "choices": [{"delta": {"content": ""}}]
        }))
        .unwrap();
        assert!(delta_fragment(empty).is_none());

        let absent: StreamResponseChunk = serde_json::from_value(json!({
            "choices": [{"delta": {}}]
        }))
        .unwrap();
        assert!(delta_fragment(absent).is_none());

        let no_choices: StreamResponseChunk =
            serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(delta_fragment(no_choices).is_none());
    }

    #[test]
    fn test_error_body_decoding() {
        let body = r#"{"error": {"message": "invalid api key", "type": "auth"}}"#;
        let parsed: ErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.message, "invalid api key");
    }
}
