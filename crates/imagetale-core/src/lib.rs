//! Imagetale Core - turn a photo into a short spoken story.
//!
//! A run takes one image through three hosted models in sequence:
//!
//! ```text
//! Image → Validate → Caption (image-to-text) → Story (LLM) → Speech (TTS) → audio file
//! ```
//!
//! Each stage talks to its service through a provider trait, so any of them
//! can be swapped or mocked.
//!
//! # Usage
//!
//! ```rust,ignore
//! use imagetale_core::{Config, ImageInput, NoProgress, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> imagetale_core::Result<()> {
//!     let config = Config::load()?;
//!     let pipeline = Pipeline::from_config(&config)?;
//!
//!     let image = ImageInput::from_path(std::path::Path::new("./beach.jpg")).await?;
//!     let report = pipeline.run(image, &NoProgress).await?;
//!     println!("{}", report.narrative.text());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod providers;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, ImagetaleError, PartialRun, Result, RunError, StageError};
pub use output::{OutputFormat, OutputWriter};
pub use pipeline::{NoProgress, Pipeline, ProgressReporter};
pub use types::{AudioArtifact, ImageInput, Narrative, RunReport, Stage, STORY_FALLBACK_TEXT};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_pipeline_from_default_config() {
        // Providers resolve secrets lazily, so a missing token is not an error here.
        assert!(Pipeline::from_config(&Config::default()).is_ok());
    }
}
