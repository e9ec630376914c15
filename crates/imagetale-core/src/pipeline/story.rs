//! Story stage: caption → short narrative.
//!
//! A failed completion does not fail the stage. The generator returns a
//! [`Narrative::Fallback`] carrying the fixed fallback text and the reason,
//! and the runner decides whether the run goes on with it.

use std::sync::Arc;

use crate::config::StoryConfig;
use crate::error::StageResult;
use crate::providers::retry::{run_with_retry, RetryOptions};
use crate::providers::{CompletionProvider, CompletionRequest};
use crate::types::{Narrative, Stage};

/// Prompt settings for the story stage.
#[derive(Debug, Clone)]
pub struct StoryOptions {
    /// Word cap requested in the prompt
    pub max_words: u32,
    /// Token cap for the completion
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for StoryOptions {
    fn default() -> Self {
        Self {
            max_words: 50,
            max_tokens: 256,
            temperature: 0.9,
        }
    }
}

impl From<&StoryConfig> for StoryOptions {
    fn from(config: &StoryConfig) -> Self {
        Self {
            max_words: config.max_words,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// Render the storyteller prompt around a caption.
pub fn story_prompt(caption: &str, max_words: u32) -> String {
    format!(
        "You are a talented storyteller who can create a story from a simple narrative.\n\
         Create a story using the following scenario; the story should be at most \
         {max_words} words long.\n\
         \n\
         CONTEXT: {caption}\n\
         STORY:"
    )
}

/// Expands captions into short stories through a [`CompletionProvider`].
pub struct StoryGenerator {
    provider: Arc<dyn CompletionProvider>,
    options: StoryOptions,
    retry: RetryOptions,
}

impl StoryGenerator {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        options: StoryOptions,
        retry: RetryOptions,
    ) -> Self {
        Self {
            provider,
            options,
            retry,
        }
    }

    fn request(&self, caption: &str) -> CompletionRequest {
        CompletionRequest {
            prompt: story_prompt(caption, self.options.max_words),
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
        }
    }

    /// Generate a story, surfacing provider failures as errors.
    pub async fn try_generate(&self, caption: &str) -> StageResult<String> {
        let request = self.request(caption);
        let response = run_with_retry(Stage::Story, &self.retry, || {
            self.provider.complete(&request)
        })
        .await?;

        tracing::debug!(
            "Story from {} in {}ms ({} tokens)",
            response.model,
            response.latency_ms,
            response
                .tokens_used
                .map(|t| t.to_string())
                .unwrap_or_else(|| "?".to_string())
        );
        Ok(response.text)
    }

    /// Generate a story, never failing: provider errors become a fallback
    /// narrative whose text is the fixed fallback string.
    pub async fn generate(&self, caption: &str) -> Narrative {
        match self.try_generate(caption).await {
            Ok(text) => {
                tracing::info!("Generated story ({} words)", text.split_whitespace().count());
                Narrative::Generated { text }
            }
            Err(e) => {
                tracing::warn!("Story generation failed, using fallback text: {e}");
                Narrative::fallback(e.to_string())
            }
        }
    }
}
