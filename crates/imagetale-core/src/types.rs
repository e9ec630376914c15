//! Core data types flowing through the Imagetale pipeline.
//!
//! Every value here is transient: it is produced by one stage, consumed by
//! the next, and summarized in a [`RunReport`] at the end of a run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::pipeline::validate::detect_format;

/// Fixed text substituted for a story when the completion call fails.
pub const STORY_FALLBACK_TEXT: &str = "Error generating story(quota exceeded)";

/// The stages of a pipeline run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Validating and saving the uploaded image
    Input,
    /// Image → caption
    Caption,
    /// Caption → narrative
    Story,
    /// Narrative → audio
    Speech,
}

impl Stage {
    /// All stages in the order the runner executes them.
    pub const ALL: [Stage; 4] = [Stage::Input, Stage::Caption, Stage::Story, Stage::Speech];

    /// Short lowercase name used in logs and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::Caption => "caption",
            Stage::Story => "story",
            Stage::Speech => "speech",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded image: raw bytes plus the name it was uploaded under.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// File name as supplied by the user (may contain path components)
    pub file_name: String,
    /// Raw image bytes
    pub bytes: Vec<u8>,
    /// Detected format ("jpeg", "png", ...) or "unknown"
    pub format: String,
}

impl ImageInput {
    /// Wrap raw bytes, detecting the format from magic bytes.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let format = detect_format(&bytes).unwrap_or("unknown").to_string();
        Self {
            file_name: file_name.into(),
            bytes,
            format,
        }
    }

    /// Read an image from disk.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Ok(Self::from_bytes(file_name, bytes))
    }

    /// MIME type for the detected format.
    pub fn media_type(&self) -> &'static str {
        match self.format.as_str() {
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            _ => "image/jpeg",
        }
    }

    /// BLAKE3 hash of the image bytes.
    pub fn content_hash(&self) -> String {
        blake3::hash(&self.bytes).to_hex().to_string()
    }

    /// File name with any directory components stripped.
    ///
    /// Falls back to `upload.<ext>` when nothing usable remains.
    pub fn safe_file_name(&self) -> String {
        let candidate = Path::new(&self.file_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if candidate.is_empty() || candidate == "." || candidate == ".." {
            let ext = if self.format == "jpeg" || self.format == "unknown" {
                "jpg"
            } else {
                self.format.as_str()
            };
            format!("upload.{ext}")
        } else {
            candidate
        }
    }
}

/// Output of the story stage.
///
/// A failed completion call is not an error at this level: it yields a
/// `Fallback` whose text is [`STORY_FALLBACK_TEXT`], and the runner's policy
/// decides whether the run continues with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Narrative {
    Generated { text: String },
    Fallback { text: String, reason: String },
}

impl Narrative {
    /// Build the fallback narrative for a failed completion.
    pub fn fallback(reason: impl Into<String>) -> Self {
        Narrative::Fallback {
            text: STORY_FALLBACK_TEXT.to_string(),
            reason: reason.into(),
        }
    }

    /// The text handed to the speech stage.
    pub fn text(&self) -> &str {
        match self {
            Narrative::Generated { text } | Narrative::Fallback { text, .. } => text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Narrative::Fallback { .. })
    }

    /// Why the completion failed, for fallback narratives.
    pub fn fallback_reason(&self) -> Option<&str> {
        match self {
            Narrative::Fallback { reason, .. } => Some(reason),
            Narrative::Generated { .. } => None,
        }
    }
}

/// Audio bytes returned by the speech service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioArtifact {
    /// Raw response body
    pub bytes: Vec<u8>,
    /// Content-Type header reported by the service, if any
    pub content_type: Option<String>,
}

impl AudioArtifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Content type to present to a player, defaulting to FLAC.
    pub fn playback_type(&self) -> &str {
        match self.content_type.as_deref() {
            Some(ct) if ct.starts_with("audio/") => ct,
            _ => "audio/flac",
        }
    }

    /// `data:` URL embedding the audio, for inline playback.
    pub fn data_url(&self) -> String {
        use base64::Engine;
        format!(
            "data:{};base64,{}",
            self.playback_type(),
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Wall-clock time spent in each stage, in milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StageTimings {
    pub input_ms: u64,
    pub caption_ms: u64,
    pub story_ms: u64,
    pub speech_ms: u64,
}

impl StageTimings {
    pub fn record(&mut self, stage: Stage, elapsed_ms: u64) {
        match stage {
            Stage::Input => self.input_ms = elapsed_ms,
            Stage::Caption => self.caption_ms = elapsed_ms,
            Stage::Story => self.story_ms = elapsed_ms,
            Stage::Speech => self.speech_ms = elapsed_ms,
        }
    }

    pub fn total_ms(&self) -> u64 {
        self.input_ms + self.caption_ms + self.story_ms + self.speech_ms
    }
}

/// Summary of one completed pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Identifier of this run (also the directory name with per-run storage)
    pub run_id: String,

    // === Input ===
    /// Uploaded file name, path components stripped
    pub image_file: String,

    /// BLAKE3 hash of the uploaded bytes
    pub image_hash: String,

    /// Where the image was saved, if saving is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,

    // === Generated content ===
    pub caption: String,

    pub narrative: Narrative,

    // === Audio ===
    pub audio_path: PathBuf,

    pub audio_size: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_content_type: Option<String>,

    /// In-memory audio, for callers that serve it directly
    #[serde(skip)]
    pub audio: AudioArtifact,

    pub timings: StageTimings,
}
