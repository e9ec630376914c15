//! Hugging Face Inference API providers for captioning and speech.
//!
//! Both endpoints take `POST {endpoint}/{model}` with a bearer token. The
//! image-to-text task takes the raw image as the body and answers with a
//! JSON array of `{"generated_text": ...}`; text-to-speech takes
//! `{"inputs": text}` and answers with audio bytes.

use super::provider::{transport_error, CaptionProvider, SpeechProvider, SpeechResponse};
use crate::error::{StageError, StageResult};
use crate::types::{ImageInput, Stage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Captioning via the image-to-text task.
pub struct HfCaptionProvider {
    url: String,
    model: String,
    token: Option<String>,
    token_ref: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HfCaptionProvider {
    /// `token_ref` is the configured reference (e.g. `${HUGGINGFACE_API_TOKEN}`),
    /// echoed in the error when the token is missing.
    pub fn new(
        url: &str,
        model: &str,
        token: Option<String>,
        token_ref: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            url: url.to_string(),
            model: model.to_string(),
            token,
            token_ref: token_ref.to_string(),
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[derive(Deserialize)]
struct CaptionCandidate {
    generated_text: String,
}

/// Error body the Inference API returns (e.g. while a model is loading).
#[derive(Deserialize)]
struct HfErrorBody {
    error: String,
    #[serde(default)]
    estimated_time: Option<f32>,
}

/// Extract caption candidates from an image-to-text response body.
pub(crate) fn parse_caption_response(body: &str) -> StageResult<Vec<String>> {
    let candidates: Vec<CaptionCandidate> =
        serde_json::from_str(body).map_err(|e| StageError::Caption {
            message: format!("Failed to parse captioning response: {e}"),
            status_code: None,
        })?;
    Ok(candidates.into_iter().map(|c| c.generated_text).collect())
}

/// Render an error body for logs, preferring the API's own message.
fn describe_error_body(body: &str) -> String {
    match serde_json::from_str::<HfErrorBody>(body) {
        Ok(err) => match err.estimated_time {
            Some(eta) => format!("{} (estimated time {eta:.0}s)", err.error),
            None => err.error,
        },
        Err(_) => body.chars().take(200).collect(),
    }
}

#[async_trait]
impl CaptionProvider for HfCaptionProvider {
    fn name(&self) -> &str {
        "huggingface"
    }

    async fn caption(&self, image: &ImageInput) -> StageResult<Vec<String>> {
        let token = self.token.as_deref().ok_or_else(|| StageError::Caption {
            message: format!(
                "Hugging Face API token not set (configured as {})",
                self.token_ref
            ),
            status_code: None,
        })?;
        let start = Instant::now();

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(token)
            .header("Content-Type", image.media_type())
            .body(image.bytes.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                transport_error(Stage::Caption, self.timeout, &e).unwrap_or_else(|| {
                    StageError::Caption {
                        message: format!("Captioning request failed: {e}"),
                        status_code: None,
                    }
                })
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| StageError::Caption {
            message: format!("Failed to read captioning response: {e}"),
            status_code: Some(status.as_u16()),
        })?;
        if !status.is_success() {
            return Err(StageError::Caption {
                message: format!("Hugging Face HTTP {status}: {}", describe_error_body(&text)),
                status_code: Some(status.as_u16()),
            });
        }

        let captions = parse_caption_response(&text)?;
        tracing::debug!(
            "{} returned {} caption(s) in {}ms",
            self.model,
            captions.len(),
            start.elapsed().as_millis()
        );
        Ok(captions)
    }
}

/// Speech synthesis via the text-to-speech task.
pub struct HfSpeechProvider {
    url: String,
    token: Option<String>,
    token_ref: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HfSpeechProvider {
    pub fn new(url: &str, token: Option<String>, token_ref: &str, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            token,
            token_ref: token_ref.to_string(),
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    inputs: &'a str,
}

#[async_trait]
impl SpeechProvider for HfSpeechProvider {
    fn name(&self) -> &str {
        "huggingface"
    }

    async fn synthesize(&self, text: &str) -> StageResult<SpeechResponse> {
        let token = self.token.as_deref().ok_or_else(|| StageError::Speech {
            message: format!(
                "Hugging Face API token not set (configured as {})",
                self.token_ref
            ),
            status_code: None,
        })?;

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(token)
            .json(&SpeechRequest { inputs: text })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                transport_error(Stage::Speech, self.timeout, &e).unwrap_or_else(|| {
                    StageError::Speech {
                        message: format!("Speech request failed: {e}"),
                        status_code: None,
                    }
                })
            })?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = resp.bytes().await.map_err(|e| StageError::Speech {
            message: format!("Failed to read speech response: {e}"),
            status_code: Some(status),
        })?;

        Ok(SpeechResponse {
            status,
            content_type,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_caption_response_keeps_order() {
        let body = r#"[{"generated_text": "a dog on a beach"}, {"generated_text": "a dog"}]"#;
        let captions = parse_caption_response(body).unwrap();
        assert_eq!(captions, vec!["a dog on a beach", "a dog"]);
    }

    #[test]
    fn test_parse_caption_response_empty_list() {
        assert!(parse_caption_response("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_caption_response_rejects_error_object() {
        let err = parse_caption_response(r#"{"error": "Model is loading"}"#).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_describe_error_body_with_eta() {
        let msg = describe_error_body(r#"{"error": "Model is currently loading", "estimated_time": 20.0}"#);
        assert_eq!(msg, "Model is currently loading (estimated time 20s)");
    }

    #[test]
    fn test_describe_error_body_plain_text() {
        assert_eq!(describe_error_body("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_speech_request_shape() {
        let json = serde_json::to_string(&SpeechRequest { inputs: "hello" }).unwrap();
        assert_eq!(json, r#"{"inputs":"hello"}"#);
    }

    /// A port nobody listens on: bind an ephemeral port, then release it.
    fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/model")
    }

    #[tokio::test]
    async fn test_refused_connection_is_retryable() {
        let provider = HfCaptionProvider::new(
            &closed_port_url(),
            "model",
            Some("hf_test".to_string()),
            "${HUGGINGFACE_API_TOKEN}",
            Duration::from_secs(5),
        );
        let image = ImageInput::from_bytes("beach.jpg", vec![0xFF, 0xD8, 0xFF, 0xE0]);

        let err = provider.caption(&image).await.unwrap_err();
        assert!(
            matches!(err, StageError::Unreachable { stage: Stage::Caption, .. }),
            "unexpected error: {err}"
        );
        assert!(crate::providers::retry::is_retryable(&err));
    }

    #[tokio::test]
    async fn test_speech_refused_connection_is_unreachable() {
        let provider = HfSpeechProvider::new(
            &closed_port_url(),
            Some("hf_test".to_string()),
            "${HUGGINGFACE_API_TOKEN}",
            Duration::from_secs(5),
        );
        let err = provider.synthesize("hello").await.unwrap_err();
        assert!(matches!(err, StageError::Unreachable { stage: Stage::Speech, .. }));
    }
}
