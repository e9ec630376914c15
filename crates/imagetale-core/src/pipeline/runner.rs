//! Pipeline orchestration: image → caption → story → speech.
//!
//! Stages run strictly one after another. Each stage yields a value or a
//! typed [`StageError`]; the runner turns the first error into a
//! [`RunError`] naming the stage and carrying whatever was produced before it.

use std::time::{Duration, Instant};

use crate::config::{Config, StoryFailurePolicy};
use crate::error::{ConfigError, PartialRun, RunError, StageError};
use crate::providers::{ProviderFactory, RetryOptions};
use crate::types::{ImageInput, Narrative, RunReport, Stage, StageTimings};

use super::caption::CaptionGenerator;
use super::speech::SpeechGenerator;
use super::store::ArtifactStore;
use super::story::{StoryGenerator, StoryOptions};
use super::validate::Validator;

/// Receives stage progress events from the runner.
pub trait ProgressReporter: Send + Sync {
    fn stage_started(&self, _stage: Stage) {}

    fn stage_finished(&self, _stage: Stage, _elapsed: Duration) {}
}

/// Discards progress events.
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// Logs progress events through `tracing`.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn stage_started(&self, stage: Stage) {
        tracing::debug!("Stage {stage} started");
    }

    fn stage_finished(&self, stage: Stage, elapsed: Duration) {
        tracing::info!("Stage {stage} finished in {}ms", elapsed.as_millis());
    }
}

/// The full image-to-speech pipeline.
pub struct Pipeline {
    validator: Validator,
    captioner: CaptionGenerator,
    storyteller: StoryGenerator,
    speaker: SpeechGenerator,
    store: ArtifactStore,
    story_policy: StoryFailurePolicy,
}

impl Pipeline {
    pub fn new(
        validator: Validator,
        captioner: CaptionGenerator,
        storyteller: StoryGenerator,
        speaker: SpeechGenerator,
        store: ArtifactStore,
        story_policy: StoryFailurePolicy,
    ) -> Self {
        Self {
            validator,
            captioner,
            storyteller,
            speaker,
            store,
            story_policy,
        }
    }

    /// Build the pipeline and its HTTP providers from config.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let retry = RetryOptions {
            attempts: config.pipeline.retry_attempts,
            delay_ms: config.pipeline.retry_delay_ms,
            timeout_ms: config.limits.request_timeout_ms,
        };
        let timeout = Duration::from_millis(config.limits.request_timeout_ms);

        let captioner =
            CaptionGenerator::new(ProviderFactory::caption(&config.caption, timeout)?, retry);
        let storyteller = StoryGenerator::new(
            ProviderFactory::story(&config.story, timeout)?,
            StoryOptions::from(&config.story),
            retry,
        );
        let speaker = SpeechGenerator::new(
            ProviderFactory::speech(&config.speech, timeout)?,
            config.speech.validate_response,
            retry,
        );

        tracing::debug!(
            "Pipeline: caption={} story={}:{} speech={} output={}",
            config.caption.model,
            config.story.provider,
            config.story.model(),
            config.speech.model,
            config.output_dir().display()
        );

        Ok(Self::new(
            Validator::new(config.limits.clone()),
            captioner,
            storyteller,
            speaker,
            ArtifactStore::from_config(config),
            config.story.on_failure,
        ))
    }

    /// Run every stage for one image.
    pub async fn run(
        &self,
        image: ImageInput,
        progress: &dyn ProgressReporter,
    ) -> Result<RunReport, RunError> {
        let mut timings = StageTimings::default();
        let mut partial = PartialRun::default();

        // Input: validate and save
        let started = begin(progress, Stage::Input);
        let (storage, image_path) = async {
            self.validator.validate(&image)?;
            let storage = self.store.begin_run(&image).await?;
            let image_path = storage.save_image(&image).await?;
            Ok::<_, StageError>((storage, image_path))
        }
        .await
        .map_err(|e| fail(Stage::Input, e, &partial))?;
        finish(progress, Stage::Input, started, &mut timings);

        // Caption
        let started = begin(progress, Stage::Caption);
        let caption = self
            .captioner
            .caption(&image)
            .await
            .map_err(|e| fail(Stage::Caption, e, &partial))?;
        partial.caption = Some(caption.clone());
        finish(progress, Stage::Caption, started, &mut timings);

        // Story
        let started = begin(progress, Stage::Story);
        let narrative = self.storyteller.generate(&caption).await;
        partial.narrative = Some(narrative.clone());
        if let Narrative::Fallback { reason, .. } = &narrative {
            if self.story_policy == StoryFailurePolicy::Abort {
                let err = StageError::Story {
                    message: reason.clone(),
                    status_code: None,
                };
                return Err(fail(Stage::Story, err, &partial));
            }
        }
        finish(progress, Stage::Story, started, &mut timings);

        // Speech: synthesize, then persist
        let started = begin(progress, Stage::Speech);
        let (audio, audio_path) = async {
            let audio = self.speaker.synthesize(narrative.text()).await?;
            let path = storage.save_audio(&audio).await?;
            Ok::<_, StageError>((audio, path))
        }
        .await
        .map_err(|e| fail(Stage::Speech, e, &partial))?;
        finish(progress, Stage::Speech, started, &mut timings);

        tracing::info!(
            "Run {} complete in {}ms: {} bytes of audio at {}",
            storage.id,
            timings.total_ms(),
            audio.len(),
            audio_path.display()
        );

        Ok(RunReport {
            run_id: storage.id.clone(),
            image_file: image.safe_file_name(),
            image_hash: image.content_hash(),
            image_path,
            caption,
            narrative,
            audio_path,
            audio_size: audio.len(),
            audio_content_type: audio.content_type.clone(),
            audio,
            timings,
        })
    }
}

fn begin(progress: &dyn ProgressReporter, stage: Stage) -> Instant {
    progress.stage_started(stage);
    Instant::now()
}

fn finish(
    progress: &dyn ProgressReporter,
    stage: Stage,
    started: Instant,
    timings: &mut StageTimings,
) {
    let elapsed = started.elapsed();
    timings.record(stage, elapsed.as_millis() as u64);
    progress.stage_finished(stage, elapsed);
}

fn fail(stage: Stage, source: StageError, partial: &PartialRun) -> RunError {
    tracing::error!("{stage} stage failed: {source}");
    RunError {
        stage,
        source,
        partial: partial.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsConfig;
    use crate::error::StageResult;
    use crate::providers::{
        CaptionProvider, CompletionProvider, CompletionRequest, CompletionResponse,
        SpeechProvider, SpeechResponse,
    };
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct FixedCaption(StageResult<Vec<String>>);

    #[async_trait]
    impl CaptionProvider for FixedCaption {
        fn name(&self) -> &str {
            "mock"
        }

        async fn caption(&self, _image: &ImageInput) -> StageResult<Vec<String>> {
            match &self.0 {
                Ok(c) => Ok(c.clone()),
                Err(_) => Err(StageError::Caption {
                    message: "HTTP 401: invalid token".to_string(),
                    status_code: Some(401),
                }),
            }
        }
    }

    struct FixedStory(Option<&'static str>);

    #[async_trait]
    impl CompletionProvider for FixedStory {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(&self, _request: &CompletionRequest) -> StageResult<CompletionResponse> {
            match self.0 {
                Some(text) => Ok(CompletionResponse {
                    text: text.to_string(),
                    model: "mock-v1".to_string(),
                    tokens_used: None,
                    latency_ms: 1,
                }),
                None => Err(StageError::Story {
                    message: "HTTP 429: quota".to_string(),
                    status_code: Some(429),
                }),
            }
        }
    }

    /// Records the text it was asked to speak.
    struct RecordingSpeech {
        spoken: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SpeechProvider for RecordingSpeech {
        fn name(&self) -> &str {
            "mock"
        }

        async fn synthesize(&self, text: &str) -> StageResult<SpeechResponse> {
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(SpeechResponse {
                status: 200,
                content_type: Some("audio/flac".to_string()),
                body: b"fLaC\0\0\0\x22".to_vec(),
            })
        }
    }

    /// Collects progress events.
    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    impl ProgressReporter for Events {
        fn stage_started(&self, stage: Stage) {
            self.0.lock().unwrap().push(format!("start:{stage}"));
        }

        fn stage_finished(&self, stage: Stage, _elapsed: Duration) {
            self.0.lock().unwrap().push(format!("end:{stage}"));
        }
    }

    fn retry() -> RetryOptions {
        RetryOptions {
            attempts: 0,
            delay_ms: 1,
            timeout_ms: 1000,
        }
    }

    fn pipeline(
        dir: &std::path::Path,
        caption: StageResult<Vec<String>>,
        story: Option<&'static str>,
        policy: StoryFailurePolicy,
    ) -> (Pipeline, Arc<RecordingSpeech>) {
        let speech = Arc::new(RecordingSpeech {
            spoken: Mutex::new(Vec::new()),
        });
        let pipeline = Pipeline::new(
            Validator::new(LimitsConfig::default()),
            CaptionGenerator::new(Arc::new(FixedCaption(caption)), retry()),
            StoryGenerator::new(Arc::new(FixedStory(story)), StoryOptions::default(), retry()),
            SpeechGenerator::new(speech.clone(), true, retry()),
            ArtifactStore::new(dir.to_path_buf(), "generated_audio.flac", true, false),
            policy,
        );
        (pipeline, speech)
    }

    fn image() -> ImageInput {
        ImageInput::from_bytes("beach.jpg", vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3])
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline(
            dir.path(),
            Ok(vec!["a cat".to_string()]),
            Some("The cat slept."),
            StoryFailurePolicy::Continue,
        );
        let events = Events::default();
        pipeline.run(image(), &events).await.unwrap();
        assert_eq!(
            *events.0.lock().unwrap(),
            vec![
                "start:input",
                "end:input",
                "start:caption",
                "end:caption",
                "start:story",
                "end:story",
                "start:speech",
                "end:speech"
            ]
        );
    }

    #[tokio::test]
    async fn test_fallback_text_is_spoken_with_continue_policy() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, speech) = pipeline(
            dir.path(),
            Ok(vec!["a cat".to_string()]),
            None,
            StoryFailurePolicy::Continue,
        );
        let report = pipeline.run(image(), &NoProgress).await.unwrap();
        assert!(report.narrative.is_fallback());
        assert_eq!(
            *speech.spoken.lock().unwrap(),
            vec!["Error generating story(quota exceeded)".to_string()]
        );
    }

    #[tokio::test]
    async fn test_abort_policy_stops_before_speech() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, speech) = pipeline(
            dir.path(),
            Ok(vec!["a cat".to_string()]),
            None,
            StoryFailurePolicy::Abort,
        );
        let err = pipeline.run(image(), &NoProgress).await.unwrap_err();
        assert_eq!(err.stage, Stage::Story);
        assert_eq!(err.partial.caption.as_deref(), Some("a cat"));
        assert!(speech.spoken.lock().unwrap().is_empty());
        assert!(!dir.path().join("generated_audio.flac").exists());
    }

    #[tokio::test]
    async fn test_caption_failure_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, speech) = pipeline(
            dir.path(),
            Err(StageError::Caption {
                message: String::new(),
                status_code: None,
            }),
            Some("never"),
            StoryFailurePolicy::Continue,
        );
        let err = pipeline.run(image(), &NoProgress).await.unwrap_err();
        assert_eq!(err.stage, Stage::Caption);
        assert!(err.partial.caption.is_none());
        assert_eq!(err.source.status_code(), Some(401));
        assert!(speech.spoken.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_image_fails_input_stage() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline(
            dir.path(),
            Ok(vec!["a cat".to_string()]),
            Some("story"),
            StoryFailurePolicy::Continue,
        );
        let not_an_image = ImageInput::from_bytes("notes.jpg", b"plain text".to_vec());
        let err = pipeline.run(not_an_image, &NoProgress).await.unwrap_err();
        assert_eq!(err.stage, Stage::Input);
        assert!(!dir.path().join("notes.jpg").exists());
    }

    #[tokio::test]
    async fn test_report_fields() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline(
            dir.path(),
            Ok(vec!["a cat".to_string()]),
            Some("The cat slept."),
            StoryFailurePolicy::Continue,
        );
        let report = pipeline.run(image(), &NoProgress).await.unwrap();
        assert_eq!(report.image_file, "beach.jpg");
        assert_eq!(report.image_path, Some(dir.path().join("beach.jpg")));
        assert_eq!(report.audio_size, 8);
        assert_eq!(report.audio_content_type.as_deref(), Some("audio/flac"));
        assert_eq!(report.image_hash, image().content_hash());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["caption"], "a cat");
        assert_eq!(json["narrative"]["kind"], "generated");
        assert!(json.get("audio").is_none());
    }
}
