//! Remote model providers.
//!
//! One trait per stage (captioning, completion, speech) with HTTP
//! implementations for the Hugging Face Inference API, OpenAI-compatible Chat
//! Completions and a local Ollama, plus the shared retry policy.

pub(crate) mod huggingface;
pub(crate) mod ollama;
pub(crate) mod openai;
pub(crate) mod provider;
pub mod retry;

pub use provider::{
    resolve_env_var, CaptionProvider, CompletionProvider, CompletionRequest, CompletionResponse,
    ProviderFactory, SpeechProvider, SpeechResponse,
};
pub use retry::RetryOptions;
