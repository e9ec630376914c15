//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default Hugging Face Inference API base URL.
pub const HF_INFERENCE_ENDPOINT: &str = "https://api-inference.huggingface.co/models";

/// Captioning model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    /// Backend name ("huggingface")
    pub provider: String,

    /// Image-to-text model identifier
    pub model: String,

    /// Inference API base URL; the model id is appended
    pub endpoint: String,

    /// Bearer token, usually `${HUGGINGFACE_API_TOKEN}`
    pub api_token: String,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            provider: "huggingface".to_string(),
            model: "Salesforce/blip-image-captioning-base".to_string(),
            endpoint: HF_INFERENCE_ENDPOINT.to_string(),
            api_token: "${HUGGINGFACE_API_TOKEN}".to_string(),
        }
    }
}

/// What the runner does when the story stage had to fall back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryFailurePolicy {
    /// Synthesize the fallback text and finish the run
    #[default]
    Continue,
    /// Stop the run with a story-stage error
    Abort,
}

/// Story generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryConfig {
    /// Completion backend ("openai" or "ollama")
    pub provider: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Word cap requested in the prompt
    pub max_words: u32,

    /// Token cap sent with the completion request
    pub max_tokens: u32,

    /// Behavior when the completion fails
    pub on_failure: StoryFailurePolicy,

    /// OpenAI (or OpenAI-compatible) settings
    pub openai: OpenAiConfig,

    /// Local Ollama settings
    pub ollama: OllamaConfig,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            temperature: 0.9,
            max_words: 50,
            max_tokens: 256,
            on_failure: StoryFailurePolicy::Continue,
            openai: OpenAiConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

impl StoryConfig {
    /// Model name of the selected provider.
    pub fn model(&self) -> &str {
        match self.provider.as_str() {
            "ollama" => &self.ollama.model,
            _ => &self.openai.model,
        }
    }
}

/// OpenAI Chat Completions settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Chat model name
    pub model: String,

    /// Chat Completions URL
    pub endpoint: String,

    /// API key, usually `${OPENAI_API_KEY}`
    pub api_key: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: "${OPENAI_API_KEY}".to_string(),
        }
    }
}

/// Local Ollama settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Model tag
    pub model: String,

    /// Ollama base URL
    pub endpoint: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2".to_string(),
            endpoint: "http://localhost:11434".to_string(),
        }
    }
}

/// Text-to-speech settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Backend name ("huggingface")
    pub provider: String,

    /// Text-to-speech model identifier
    pub model: String,

    /// Inference API base URL; the model id is appended
    pub endpoint: String,

    /// Bearer token, usually `${HUGGINGFACE_API_TOKEN}`
    pub api_token: String,

    /// Reject non-audio responses instead of writing them to disk.
    /// When false, the response body is persisted verbatim whatever its status.
    pub validate_response: bool,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            provider: "huggingface".to_string(),
            model: "espnet/kan-bayashi_ljspeech_vits".to_string(),
            endpoint: HF_INFERENCE_ENDPOINT.to_string(),
            api_token: "${HUGGINGFACE_API_TOKEN}".to_string(),
            validate_response: true,
        }
    }
}

/// Where run artifacts are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Base directory for saved images and audio
    pub dir: PathBuf,

    /// File name of the generated audio
    pub audio_file: String,

    /// Save the uploaded image next to the audio
    pub save_image: bool,

    /// Store every run in its own `{dir}/{run_id}` directory instead of
    /// overwriting fixed paths
    pub per_run_dirs: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            audio_file: "generated_audio.flac".to_string(),
            save_image: true,
            per_run_dirs: false,
        }
    }
}

/// Limits applied to inputs and remote calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum image size in megabytes
    pub max_image_size_mb: u64,

    /// Accepted image extensions / formats
    pub supported_formats: Vec<String>,

    /// Timeout for each remote call in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_image_size_mb: 20,
            supported_formats: vec!["jpg".to_string(), "jpeg".to_string()],
            request_timeout_ms: 120_000,
        }
    }
}

impl LimitsConfig {
    /// Largest accepted upload.
    pub const MAX_IMAGE_SIZE_MB: u64 = 1024;

    /// `max_image_size_mb` in bytes.
    pub fn max_image_bytes(&self) -> u64 {
        self.max_image_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Retry settings for transient remote failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Max retry attempts per remote call
    pub retry_attempts: u32,

    /// Base delay between retries in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 2,
            retry_delay_ms: 1000,
        }
    }
}

/// Web UI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Listen port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,

    /// Log format (pretty, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
