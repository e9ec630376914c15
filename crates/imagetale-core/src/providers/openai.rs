//! OpenAI completion provider using the Chat Completions API.
//!
//! Works against any OpenAI-compatible endpoint; the prompt is sent as a
//! single user message.

use super::provider::{transport_error, CompletionProvider, CompletionRequest, CompletionResponse};
use crate::error::{StageError, StageResult};
use crate::types::Stage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// OpenAI provider using Chat Completions API.
pub struct OpenAiProvider {
    api_key: Option<String>,
    key_ref: String,
    model: String,
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Option<String>,
        key_ref: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            api_key,
            key_ref: key_ref.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            timeout,
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: String,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

/// Pull the first choice's text out of a Chat Completions body.
fn parse_chat_response(body: &str) -> StageResult<(String, String, Option<u32>)> {
    let chat_resp: ChatResponse = serde_json::from_str(body).map_err(|e| StageError::Story {
        message: format!("Failed to parse OpenAI response: {e}"),
        status_code: None,
    })?;

    let text = chat_resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| StageError::Story {
            message: "OpenAI returned empty choices array, no content generated".to_string(),
            status_code: None,
        })?;

    Ok((
        text.trim().to_string(),
        chat_resp.model,
        chat_resp.usage.map(|u| u.total_tokens),
    ))
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> StageResult<CompletionResponse> {
        let api_key = self.api_key.as_deref().ok_or_else(|| StageError::Story {
            message: format!("OpenAI API key not set (configured as {})", self.key_ref),
            status_code: None,
        })?;
        let start = Instant::now();

        let body = ChatRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                transport_error(Stage::Story, self.timeout, &e).unwrap_or_else(|| {
                    StageError::Story {
                        message: format!("OpenAI request failed: {e}"),
                        status_code: None,
                    }
                })
            })?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(StageError::Story {
                message: format!("OpenAI HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let (text, model, tokens_used) = parse_chat_response(&text)?;

        Ok(CompletionResponse {
            text,
            model,
            tokens_used,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{
            "model": "gpt-3.5-turbo-0125",
            "choices": [{"message": {"role": "assistant", "content": "  A dog loved the sand.\n"}}],
            "usage": {"prompt_tokens": 40, "completion_tokens": 7, "total_tokens": 47}
        }"#;
        let (text, model, tokens) = parse_chat_response(body).unwrap();
        assert_eq!(text, "A dog loved the sand.");
        assert_eq!(model, "gpt-3.5-turbo-0125");
        assert_eq!(tokens, Some(47));
    }

    #[test]
    fn test_parse_chat_response_empty_choices() {
        let body = r#"{"model": "gpt-3.5-turbo", "choices": []}"#;
        let err = parse_chat_response(body).unwrap_err();
        assert!(err.to_string().contains("empty choices"));
    }

    #[test]
    fn test_chat_request_shape() {
        let body = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            max_tokens: 10,
            temperature: 0.5,
        };
        let json: serde_json::Value = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
        assert_eq!(json["temperature"], 0.5);
    }

    #[tokio::test]
    async fn test_missing_key_is_story_error() {
        let provider = OpenAiProvider::new(
            "http://127.0.0.1:9/v1/chat/completions",
            "gpt-3.5-turbo",
            None,
            "${OPENAI_API_KEY}",
            Duration::from_secs(1),
        );
        let request = CompletionRequest {
            prompt: "hi".to_string(),
            max_tokens: 10,
            temperature: 0.9,
        };
        let err = provider.complete(&request).await.unwrap_err();
        assert!(matches!(err, StageError::Story { status_code: None, .. }));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
