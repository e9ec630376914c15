//! Pipeline stages and their orchestration.
//!
//! - **validate**: Pre-flight checks on the uploaded image
//! - **caption**: Image → caption via a captioning model
//! - **story**: Caption → short narrative via a language model
//! - **speech**: Narrative → audio via a text-to-speech model
//! - **store**: Where the image and audio land on disk
//! - **runner**: Runs the stages in order for one image

pub mod caption;
pub mod runner;
pub mod speech;
pub mod store;
pub mod story;
pub mod validate;

pub use caption::CaptionGenerator;
pub use runner::{LogProgress, NoProgress, Pipeline, ProgressReporter};
pub use speech::SpeechGenerator;
pub use store::{ArtifactStore, RunStorage};
pub use story::{story_prompt, StoryGenerator, StoryOptions};
pub use validate::Validator;
