//! Error types for the Imagetale pipeline.
//!
//! Errors are organized by stage so that every failure a caller sees names the
//! stage it came from (input, caption, story, speech) and, for remote calls,
//! the HTTP status the service answered with.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{Narrative, Stage};

/// Top-level error type for Imagetale operations.
#[derive(Error, Debug)]
pub enum ImagetaleError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A single stage failed outside of a pipeline run
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    /// A pipeline run stopped early
    #[error("Run error: {0}")]
    Run(#[from] RunError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Typed failure of one pipeline stage.
#[derive(Error, Debug)]
pub enum StageError {
    /// The uploaded image was rejected before any remote call
    #[error("Invalid image {file_name}: {message}")]
    InvalidImage { file_name: String, message: String },

    /// The uploaded image exceeds the configured size limit
    #[error("Image too large: {file_name} ({size_mb}MB > {max_mb}MB)")]
    ImageTooLarge {
        file_name: String,
        size_mb: u64,
        max_mb: u64,
    },

    /// Captioning model call failed
    #[error("Captioning failed: {message}")]
    Caption {
        message: String,
        status_code: Option<u16>,
    },

    /// Story completion call failed
    #[error("Story generation failed: {message}")]
    Story {
        message: String,
        status_code: Option<u16>,
    },

    /// Text-to-speech call failed or returned something that is not audio
    #[error("Speech synthesis failed: {message}")]
    Speech {
        message: String,
        status_code: Option<u16>,
    },

    /// A remote service could not be reached (refused, DNS, reset)
    #[error("Could not reach the {stage} service: {message}")]
    Unreachable { stage: Stage, message: String },

    /// A remote call did not answer in time
    #[error("Timeout in {stage} stage after {timeout_ms}ms")]
    Timeout { stage: Stage, timeout_ms: u64 },

    /// Writing an artifact to disk failed
    #[error("Failed to write {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StageError {
    /// HTTP status reported by the remote service, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            StageError::Caption { status_code, .. }
            | StageError::Story { status_code, .. }
            | StageError::Speech { status_code, .. } => *status_code,
            _ => None,
        }
    }
}

/// Work completed before a run stopped.
#[derive(Debug, Clone, Default)]
pub struct PartialRun {
    pub caption: Option<String>,
    pub narrative: Option<Narrative>,
}

/// A pipeline run that stopped at `stage`.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct RunError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
    pub partial: PartialRun,
}

/// Convenience type alias for Imagetale results.
pub type Result<T> = std::result::Result<T, ImagetaleError>;

/// Convenience type alias for single-stage results.
pub type StageResult<T> = std::result::Result<T, StageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_only_for_remote_stages() {
        let err = StageError::Speech {
            message: "HTTP 503".to_string(),
            status_code: Some(503),
        };
        assert_eq!(err.status_code(), Some(503));

        let err = StageError::Timeout {
            stage: Stage::Caption,
            timeout_ms: 10,
        };
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn test_run_error_names_stage() {
        let err = RunError {
            stage: Stage::Caption,
            source: StageError::Caption {
                message: "connection refused".to_string(),
                status_code: None,
            },
            partial: PartialRun::default(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("caption stage failed"), "got: {msg}");
        assert!(msg.contains("connection refused"));
    }
}
