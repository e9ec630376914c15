//! Caption stage: image → short description.

use std::sync::Arc;

use crate::error::{StageError, StageResult};
use crate::providers::retry::{run_with_retry, RetryOptions};
use crate::providers::CaptionProvider;
use crate::types::{ImageInput, Stage};

/// Captions images through a [`CaptionProvider`], keeping the top candidate.
pub struct CaptionGenerator {
    provider: Arc<dyn CaptionProvider>,
    retry: RetryOptions,
}

impl CaptionGenerator {
    pub fn new(provider: Arc<dyn CaptionProvider>, retry: RetryOptions) -> Self {
        Self { provider, retry }
    }

    /// Caption `image`, returning the first (highest-ranked) candidate.
    ///
    /// An empty caption string is returned as-is; only an empty result set
    /// is an error.
    pub async fn caption(&self, image: &ImageInput) -> StageResult<String> {
        let candidates = run_with_retry(Stage::Caption, &self.retry, || {
            self.provider.caption(image)
        })
        .await?;

        let caption = candidates
            .into_iter()
            .next()
            .ok_or_else(|| StageError::Caption {
                message: format!("{} returned no captions", self.provider.name()),
                status_code: None,
            })?;

        tracing::info!("Caption for {}: {caption:?}", image.file_name);
        Ok(caption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct MockCaptioner {
        result: fn(u32) -> StageResult<Vec<String>>,
        calls: AtomicU32,
    }

    impl MockCaptioner {
        fn new(result: fn(u32) -> StageResult<Vec<String>>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl CaptionProvider for MockCaptioner {
        fn name(&self) -> &str {
            "mock"
        }

        async fn caption(&self, _image: &ImageInput) -> StageResult<Vec<String>> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)(idx)
        }
    }

    fn image() -> ImageInput {
        ImageInput::from_bytes("beach.jpg", vec![0xFF, 0xD8, 0xFF, 0xE0])
    }

    fn fast_retry() -> RetryOptions {
        RetryOptions {
            attempts: 1,
            delay_ms: 1,
            timeout_ms: 1000,
        }
    }

    #[tokio::test]
    async fn test_extracts_first_candidate() {
        let provider = MockCaptioner::new(|_| {
            Ok(vec!["a dog on a beach".to_string(), "a dog".to_string()])
        });
        let generator = CaptionGenerator::new(provider, fast_retry());
        assert_eq!(generator.caption(&image()).await.unwrap(), "a dog on a beach");
    }

    #[tokio::test]
    async fn test_empty_caption_passes_through() {
        let provider = MockCaptioner::new(|_| Ok(vec![String::new()]));
        let generator = CaptionGenerator::new(provider, fast_retry());
        assert_eq!(generator.caption(&image()).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_empty_result_set_is_error() {
        let provider = MockCaptioner::new(|_| Ok(Vec::new()));
        let generator = CaptionGenerator::new(provider, fast_retry());
        let err = generator.caption(&image()).await.unwrap_err();
        assert!(err.to_string().contains("no captions"));
    }

    #[tokio::test]
    async fn test_retries_model_loading() {
        let provider = MockCaptioner::new(|idx| {
            if idx == 0 {
                Err(StageError::Caption {
                    message: "Model is currently loading".to_string(),
                    status_code: Some(503),
                })
            } else {
                Ok(vec!["a red car".to_string()])
            }
        });
        let generator = CaptionGenerator::new(provider.clone(), fast_retry());
        assert_eq!(generator.caption(&image()).await.unwrap(), "a red car");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_propagates() {
        let provider = MockCaptioner::new(|_| {
            Err(StageError::Caption {
                message: "HTTP 401: invalid token".to_string(),
                status_code: Some(401),
            })
        });
        let generator = CaptionGenerator::new(provider, fast_retry());
        let err = generator.caption(&image()).await.unwrap_err();
        assert_eq!(err.status_code(), Some(401));
    }
}
