//! Speech stage: narrative → audio bytes.

use std::sync::Arc;

use crate::error::{StageError, StageResult};
use crate::providers::retry::{run_with_retry, RetryOptions};
use crate::providers::{SpeechProvider, SpeechResponse};
use crate::types::{AudioArtifact, Stage};

/// Synthesizes narratives through a [`SpeechProvider`].
pub struct SpeechGenerator {
    provider: Arc<dyn SpeechProvider>,
    validate_response: bool,
    retry: RetryOptions,
}

impl SpeechGenerator {
    /// With `validate_response` off, whatever the service answers is
    /// returned as audio, error payloads included.
    pub fn new(
        provider: Arc<dyn SpeechProvider>,
        validate_response: bool,
        retry: RetryOptions,
    ) -> Self {
        Self {
            provider,
            validate_response,
            retry,
        }
    }

    /// Synthesize `text` into audio.
    pub async fn synthesize(&self, text: &str) -> StageResult<AudioArtifact> {
        let response = if self.validate_response {
            run_with_retry(Stage::Speech, &self.retry, || async move {
                let response = self.provider.synthesize(text).await?;
                check_audio_response(&response)?;
                Ok::<_, StageError>(response)
            })
            .await?
        } else {
            let response = run_with_retry(Stage::Speech, &self.retry, || {
                self.provider.synthesize(text)
            })
            .await?;
            if !response.is_success() {
                tracing::warn!(
                    "Speech service answered HTTP {}; writing {} byte body unchecked",
                    response.status,
                    response.body.len()
                );
            }
            response
        };

        tracing::info!(
            "Synthesized {} bytes of audio ({})",
            response.body.len(),
            response.content_type.as_deref().unwrap_or("no content type")
        );
        Ok(AudioArtifact {
            bytes: response.body,
            content_type: response.content_type,
        })
    }
}

/// Reject responses that are not audio: non-2xx status, empty body, or a
/// JSON/text payload.
fn check_audio_response(response: &SpeechResponse) -> StageResult<()> {
    if !response.is_success() {
        let snippet: String = String::from_utf8_lossy(&response.body)
            .chars()
            .take(200)
            .collect();
        return Err(StageError::Speech {
            message: format!("HTTP {}: {snippet}", response.status),
            status_code: Some(response.status),
        });
    }
    if response.body.is_empty() {
        return Err(StageError::Speech {
            message: "Speech service returned an empty body".to_string(),
            status_code: Some(response.status),
        });
    }
    if let Some(ct) = response.content_type.as_deref() {
        let ct = ct.to_ascii_lowercase();
        if ct.starts_with("application/json") || ct.starts_with("text/") {
            return Err(StageError::Speech {
                message: format!("Expected audio, got content type '{ct}'"),
                status_code: Some(response.status),
            });
        }
    }
    Ok(())
}
