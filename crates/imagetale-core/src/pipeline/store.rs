//! Artifact persistence: where a run's image and audio land on disk.
//!
//! By default every run writes to the same two paths in the output
//! directory, overwriting the previous run. With `per_run_dirs` each run gets
//! its own `{dir}/{run_id}` directory, so overlapping runs never share a path.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::error::{StageError, StageResult};
use crate::types::{AudioArtifact, ImageInput};

/// Decides artifact paths and writes artifacts.
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    audio_file: String,
    save_image: bool,
    per_run_dirs: bool,
    sequence: AtomicU64,
}

impl ArtifactStore {
    pub fn new(root: PathBuf, audio_file: &str, save_image: bool, per_run_dirs: bool) -> Self {
        Self {
            root,
            audio_file: audio_file.to_string(),
            save_image,
            per_run_dirs,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.output_dir(),
            &config.output.audio_file,
            config.output.save_image,
            config.output.per_run_dirs,
        )
    }

    /// Allocate the storage for one run and create its directory.
    pub async fn begin_run(&self, image: &ImageInput) -> StageResult<RunStorage> {
        let id = self.next_run_id(image);
        let dir = if self.per_run_dirs {
            self.root.join(&id)
        } else {
            self.root.clone()
        };
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StageError::Persist {
                path: dir.clone(),
                source,
            })?;
        Ok(RunStorage {
            id,
            dir,
            audio_file: self.audio_file.clone(),
            save_image: self.save_image,
        })
    }

    /// `{hash prefix}-{unix millis}-{sequence}`, unique within the process.
    fn next_run_id(&self, image: &ImageInput) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let hash = image.content_hash();
        format!("{}-{millis}-{seq}", &hash[..12])
    }
}

/// Storage allocated to one run.
#[derive(Debug, Clone)]
pub struct RunStorage {
    pub id: String,
    pub dir: PathBuf,
    audio_file: String,
    save_image: bool,
}

impl RunStorage {
    /// Path the audio will be written to.
    pub fn audio_path(&self) -> PathBuf {
        self.dir.join(&self.audio_file)
    }

    /// Write the uploaded image under its (sanitized) file name.
    ///
    /// Returns `None` when image saving is disabled.
    pub async fn save_image(&self, image: &ImageInput) -> StageResult<Option<PathBuf>> {
        if !self.save_image {
            return Ok(None);
        }
        let path = self.dir.join(image.safe_file_name());
        write_file(&path, &image.bytes).await?;
        Ok(Some(path))
    }

    /// Write the audio bytes verbatim, replacing any previous file.
    pub async fn save_audio(&self, audio: &AudioArtifact) -> StageResult<PathBuf> {
        let path = self.audio_path();
        write_file(&path, &audio.bytes).await?;
        Ok(path)
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> StageResult<()> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| StageError::Persist {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg(name: &str, extra: usize) -> ImageInput {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.extend(std::iter::repeat(7u8).take(extra));
        ImageInput::from_bytes(name, bytes)
    }

    #[tokio::test]
    async fn test_fixed_paths_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf(), "generated_audio.flac", true, false);

        let run = store.begin_run(&jpeg("beach.jpg", 100)).await.unwrap();
        run.save_audio(&AudioArtifact {
            bytes: vec![1; 64],
            content_type: None,
        })
        .await
        .unwrap();

        let run = store.begin_run(&jpeg("beach.jpg", 10)).await.unwrap();
        let image_path = run.save_image(&jpeg("beach.jpg", 10)).await.unwrap().unwrap();
        let audio_path = run
            .save_audio(&AudioArtifact {
                bytes: vec![2; 8],
                content_type: None,
            })
            .await
            .unwrap();

        assert_eq!(audio_path, dir.path().join("generated_audio.flac"));
        assert_eq!(std::fs::read(&audio_path).unwrap(), vec![2; 8]);
        assert_eq!(std::fs::metadata(&image_path).unwrap().len(), 14);
    }

    #[tokio::test]
    async fn test_per_run_dirs_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf(), "generated_audio.flac", true, true);
        let image = jpeg("beach.jpg", 0);

        let a = store.begin_run(&image).await.unwrap();
        let b = store.begin_run(&image).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.audio_path(), b.audio_path());
        assert!(a.dir.starts_with(dir.path()));
        assert!(a.dir.is_dir());
    }

    #[tokio::test]
    async fn test_save_image_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf(), "out.flac", false, false);
        let image = jpeg("beach.jpg", 0);
        let run = store.begin_run(&image).await.unwrap();
        assert!(run.save_image(&image).await.unwrap().is_none());
        assert!(!dir.path().join("beach.jpg").exists());
    }

    #[tokio::test]
    async fn test_image_name_cannot_escape_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("out"), "out.flac", true, false);
        let image = jpeg("../escape.jpg", 0);
        let run = store.begin_run(&image).await.unwrap();
        let path = run.save_image(&image).await.unwrap().unwrap();
        assert_eq!(path, dir.path().join("out").join("escape.jpg"));
    }
}
