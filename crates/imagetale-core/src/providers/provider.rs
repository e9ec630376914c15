//! Provider traits, request/response types, and the factory that builds
//! providers from config.
//!
//! Each pipeline stage talks to its remote model through one trait, so the
//! stage logic (extraction, fallback, validation) can be exercised against
//! mock providers.

use crate::config::{CaptionConfig, SpeechConfig, StoryConfig};
use crate::error::{ConfigError, StageError, StageResult};
use crate::types::{ImageInput, Stage};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::huggingface::{HfCaptionProvider, HfSpeechProvider};
use super::ollama::OllamaProvider;
use super::openai::OpenAiProvider;

/// A text completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Fully rendered prompt
    pub prompt: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

/// The response from a completion call.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated text
    pub text: String,
    /// Model identifier used
    pub model: String,
    /// Number of tokens used (input + output), if reported
    pub tokens_used: Option<u32>,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

/// Raw answer of a text-to-speech service.
///
/// Kept unvalidated here: whether a non-audio body counts as a failure is
/// decided by the speech stage.
#[derive(Debug, Clone)]
pub struct SpeechResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Type header, if present
    pub content_type: Option<String>,
    /// Response body
    pub body: Vec<u8>,
}

impl SpeechResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Image-to-text backend.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (stages hold `Arc<dyn CaptionProvider>`).
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    /// Provider name for logging (e.g., "huggingface").
    fn name(&self) -> &str;

    /// Caption the image, returning candidates best-first.
    async fn caption(&self, image: &ImageInput) -> StageResult<Vec<String>>;
}

/// Text completion backend used by the story stage.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> StageResult<CompletionResponse>;
}

/// Text-to-speech backend.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Send `text` for synthesis. Only transport failures are errors.
    async fn synthesize(&self, text: &str) -> StageResult<SpeechResponse>;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Join an Inference API base URL and a model id.
pub(crate) fn model_url(endpoint: &str, model: &str) -> String {
    format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        model.trim_start_matches('/')
    )
}

/// Classify a failed send that never produced an HTTP response.
///
/// Timeouts and connection failures get their own retryable variants; any
/// other transport error is left to the caller to wrap.
pub(crate) fn transport_error(
    stage: Stage,
    timeout: Duration,
    error: &reqwest::Error,
) -> Option<StageError> {
    if error.is_timeout() {
        Some(StageError::Timeout {
            stage,
            timeout_ms: timeout.as_millis() as u64,
        })
    } else if error.is_connect() {
        Some(StageError::Unreachable {
            stage,
            message: error_chain(error),
        })
    } else {
        None
    }
}

/// `error` followed by its sources, which carry the useful detail
/// (e.g. "Connection refused") for reqwest errors.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Factory that creates the stage providers from config.
///
/// Secrets are resolved here but never required: a provider built without
/// its key fails when it is called.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create the captioning provider.
    pub fn caption(
        config: &CaptionConfig,
        timeout: Duration,
    ) -> Result<Arc<dyn CaptionProvider>, ConfigError> {
        match config.provider.as_str() {
            "huggingface" => {
                let token = resolve_env_var(&config.api_token);
                if token.is_none() {
                    tracing::debug!(
                        "Captioning token unresolved ({}); calls will fail",
                        config.api_token
                    );
                }
                Ok(Arc::new(HfCaptionProvider::new(
                    &model_url(&config.endpoint, &config.model),
                    &config.model,
                    token,
                    &config.api_token,
                    timeout,
                )))
            }
            other => Err(ConfigError::ValidationError(format!(
                "Unknown caption provider: {other}"
            ))),
        }
    }

    /// Create the completion provider for the story stage.
    pub fn story(
        config: &StoryConfig,
        timeout: Duration,
    ) -> Result<Arc<dyn CompletionProvider>, ConfigError> {
        match config.provider.as_str() {
            "openai" => {
                let cfg = &config.openai;
                let api_key = resolve_env_var(&cfg.api_key);
                if api_key.is_none() {
                    tracing::debug!("OpenAI key unresolved ({}); calls will fail", cfg.api_key);
                }
                Ok(Arc::new(OpenAiProvider::new(
                    &cfg.endpoint,
                    &cfg.model,
                    api_key,
                    &cfg.api_key,
                    timeout,
                )))
            }
            "ollama" => {
                let cfg = &config.ollama;
                Ok(Arc::new(OllamaProvider::new(
                    &cfg.endpoint,
                    &cfg.model,
                    timeout,
                )))
            }
            other => Err(ConfigError::ValidationError(format!(
                "Unknown story provider: {other}"
            ))),
        }
    }

    /// Create the text-to-speech provider.
    pub fn speech(
        config: &SpeechConfig,
        timeout: Duration,
    ) -> Result<Arc<dyn SpeechProvider>, ConfigError> {
        match config.provider.as_str() {
            "huggingface" => {
                let token = resolve_env_var(&config.api_token);
                if token.is_none() {
                    tracing::debug!(
                        "Speech token unresolved ({}); calls will fail",
                        config.api_token
                    );
                }
                Ok(Arc::new(HfSpeechProvider::new(
                    &model_url(&config.endpoint, &config.model),
                    token,
                    &config.api_token,
                    timeout,
                )))
            }
            other => Err(ConfigError::ValidationError(format!(
                "Unknown speech provider: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_env_var() {
        // Non-env-var strings pass through
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        // Empty returns None
        assert_eq!(resolve_env_var(""), None);
        // Unset env var returns None
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_XYZ_123}"), None);
    }

    #[test]
    fn test_model_url_joins_cleanly() {
        assert_eq!(
            model_url("https://api-inference.huggingface.co/models/", "espnet/vits"),
            "https://api-inference.huggingface.co/models/espnet/vits"
        );
        assert_eq!(model_url("http://localhost:8080", "/m"), "http://localhost:8080/m");
    }

    #[test]
    fn test_factory_builds_without_secrets() {
        let mut caption = CaptionConfig::default();
        caption.api_token = "${DEFINITELY_NOT_SET_XYZ_123}".to_string();
        let provider = ProviderFactory::caption(&caption, Duration::from_secs(1)).unwrap();
        assert_eq!(provider.name(), "huggingface");

        let mut story = StoryConfig::default();
        story.openai.api_key = "${DEFINITELY_NOT_SET_XYZ_123}".to_string();
        let provider = ProviderFactory::story(&story, Duration::from_secs(1)).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn test_factory_rejects_unknown_provider() {
        let mut speech = SpeechConfig::default();
        speech.provider = "espeak".to_string();
        let err = ProviderFactory::speech(&speech, Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(err.to_string().contains("espeak"));
    }

    #[test]
    fn test_speech_response_success_range() {
        let ok = SpeechResponse {
            status: 200,
            content_type: Some("audio/flac".to_string()),
            body: vec![1, 2],
        };
        assert!(ok.is_success());
        let loading = SpeechResponse {
            status: 503,
            content_type: Some("application/json".to_string()),
            body: b"{\"error\":\"loading\"}".to_vec(),
        };
        assert!(!loading.is_success());
    }

    #[tokio::test]
    async fn test_missing_token_fails_at_call_time() {
        let mut caption = CaptionConfig::default();
        caption.api_token = "${DEFINITELY_NOT_SET_XYZ_123}".to_string();
        let provider = ProviderFactory::caption(&caption, Duration::from_secs(1)).unwrap();
        let image = ImageInput::from_bytes("a.jpg", vec![0xFF, 0xD8, 0xFF, 0xE0]);
        let err = provider.caption(&image).await.unwrap_err();
        assert!(err.to_string().contains("DEFINITELY_NOT_SET_XYZ_123"), "got: {err}");
    }
}
