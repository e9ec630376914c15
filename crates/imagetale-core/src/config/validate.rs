//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::{Config, LimitsConfig};

const CAPTION_PROVIDERS: &[&str] = &["huggingface"];
const STORY_PROVIDERS: &[&str] = &["openai", "ollama"];
const SPEECH_PROVIDERS: &[&str] = &["huggingface"];

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        check_provider("caption.provider", &self.caption.provider, CAPTION_PROVIDERS)?;
        check_provider("story.provider", &self.story.provider, STORY_PROVIDERS)?;
        check_provider("speech.provider", &self.speech.provider, SPEECH_PROVIDERS)?;

        if self.caption.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "caption.model must not be empty".into(),
            ));
        }
        if self.story.model().trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "story.{}.model must not be empty",
                self.story.provider
            )));
        }
        if self.speech.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "speech.model must not be empty".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.story.temperature) {
            return Err(ConfigError::ValidationError(
                "story.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.story.max_words == 0 {
            return Err(ConfigError::ValidationError(
                "story.max_words must be > 0".into(),
            ));
        }
        if self.story.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "story.max_tokens must be > 0".into(),
            ));
        }
        if self.output.audio_file.trim().is_empty()
            || self.output.audio_file.contains(|c: char| c == '/' || c == '\\')
        {
            return Err(ConfigError::ValidationError(
                "output.audio_file must be a plain file name".into(),
            ));
        }
        if self.limits.max_image_size_mb == 0
            || self.limits.max_image_size_mb > LimitsConfig::MAX_IMAGE_SIZE_MB
        {
            return Err(ConfigError::ValidationError(format!(
                "limits.max_image_size_mb must be between 1 and {}",
                LimitsConfig::MAX_IMAGE_SIZE_MB
            )));
        }
        if self.limits.supported_formats.is_empty() {
            return Err(ConfigError::ValidationError(
                "limits.supported_formats must list at least one format".into(),
            ));
        }
        if self.limits.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.request_timeout_ms must be > 0".into(),
            ));
        }
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn check_provider(key: &str, value: &str, known: &[&str]) -> Result<(), ConfigError> {
    if known.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{key} must be one of {}, got '{value}'",
            known.join(", ")
        )))
    }
}
