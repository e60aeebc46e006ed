//! Session-scoped scratch storage for captured frames.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use keyreel_common::config::ScratchConfig;
use keyreel_common::error::{ReelError, ReelResult};

/// Digits in a frame file name (`000042.png`).
pub const FRAME_NUMBER_WIDTH: usize = 6;

/// Still-image extension used for captured frames.
pub const FRAME_EXTENSION: &str = "png";

/// Encoder input pattern matching [`frame_file_name`].
pub const FRAME_INPUT_PATTERN: &str = "%06d.png";

/// File name of the frame with the given capture sequence number.
pub fn frame_file_name(sequence: usize) -> String {
    format!(
        "{sequence:0width$}.{FRAME_EXTENSION}",
        width = FRAME_NUMBER_WIDTH
    )
}

/// Creates and releases scratch directories under a common root.
#[derive(Debug, Clone)]
pub struct ScratchStorage {
    root: PathBuf,
    prefix: String,
}

impl ScratchStorage {
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
        }
    }

    pub fn from_config(config: &ScratchConfig) -> Self {
        Self::new(config.root_dir(), config.prefix.clone())
    }

    /// Directory scratch directories are created under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh scratch directory.
    ///
    /// The name combines the prefix, the process id, and a random token, so
    /// two sessions never share a directory even within one process.
    pub fn acquire(&self) -> ReelResult<ScratchDirectory> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let name = format!("{}-{}-{}", self.prefix, std::process::id(), token);
        let path = self.root.join(name);

        std::fs::create_dir_all(&path).map_err(|e| {
            ReelError::storage(format!(
                "Failed to create scratch directory {}: {e}",
                path.display()
            ))
        })?;

        tracing::debug!(path = %path.display(), "Created scratch directory");
        Ok(ScratchDirectory {
            path,
            released: false,
        })
    }

    /// Recursively delete a scratch directory. Safe to call repeatedly.
    pub fn release(&self, dir: &mut ScratchDirectory) -> ReelResult<()> {
        dir.release()
    }
}

/// A scratch directory owned by one export session.
///
/// Dropping an unreleased directory removes it.
#[derive(Debug)]
pub struct ScratchDirectory {
    path: PathBuf,
    released: bool,
}

impl ScratchDirectory {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the frame with the given sequence number.
    pub fn frame_path(&self, sequence: usize) -> PathBuf {
        self.path.join(frame_file_name(sequence))
    }

    /// Counting pattern over all frames, for the encoder's `-i` argument.
    pub fn input_pattern(&self) -> PathBuf {
        self.path.join(FRAME_INPUT_PATTERN)
    }

    /// Frame files currently present, sorted by name.
    pub fn frame_files(&self) -> ReelResult<Vec<PathBuf>> {
        let mut frames = Vec::new();
        for entry in std::fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(FRAME_EXTENSION) {
                frames.push(path);
            }
        }
        frames.sort();
        Ok(frames)
    }

    /// Number of frame files currently present.
    pub fn frame_count(&self) -> ReelResult<usize> {
        Ok(self.frame_files()?.len())
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Recursively delete the directory. A missing directory counts as
    /// released.
    pub fn release(&mut self) -> ReelResult<()> {
        if self.released {
            return Ok(());
        }

        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Removed scratch directory");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ReelError::storage(format!(
                    "Failed to remove scratch directory {}: {e}",
                    self.path.display()
                )));
            }
        }

        self.released = true;
        Ok(())
    }
}

impl Drop for ScratchDirectory {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(error = %e, "Scratch directory left behind");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_file_name() {
        assert_eq!(frame_file_name(0), "000000.png");
        assert_eq!(frame_file_name(42), "000042.png");
        assert_eq!(frame_file_name(1_234_567), "1234567.png");
    }

    #[test]
    fn test_acquire_creates_unique_directories() {
        let root = tempfile::tempdir().unwrap();
        let storage = ScratchStorage::new(root.path(), "keyreel-test");

        let a = storage.acquire().unwrap();
        let b = storage.acquire().unwrap();

        assert!(a.path().is_dir());
        assert!(b.path().is_dir());
        assert_ne!(a.path(), b.path());
        let name = a.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(&format!("keyreel-test-{}-", std::process::id())));
    }

    #[test]
    fn test_release_is_recursive_and_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let storage = ScratchStorage::new(root.path(), "keyreel-test");
        let mut dir = storage.acquire().unwrap();

        std::fs::write(dir.frame_path(0), b"png").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("x"), b"x").unwrap();

        storage.release(&mut dir).unwrap();
        assert!(!dir.path().exists());
        assert!(dir.is_released());

        storage.release(&mut dir).unwrap();
    }

    #[test]
    fn test_release_tolerates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let storage = ScratchStorage::new(root.path(), "keyreel-test");
        let mut dir = storage.acquire().unwrap();

        std::fs::remove_dir_all(dir.path()).unwrap();
        dir.release().unwrap();
    }

    #[test]
    fn test_drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let storage = ScratchStorage::new(root.path(), "keyreel-test");
        let path = {
            let dir = storage.acquire().unwrap();
            dir.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_frame_listing_and_pattern() {
        let root = tempfile::tempdir().unwrap();
        let storage = ScratchStorage::new(root.path(), "keyreel-test");
        let dir = storage.acquire().unwrap();

        std::fs::write(dir.frame_path(1), b"b").unwrap();
        std::fs::write(dir.frame_path(0), b"a").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let frames = dir.frame_files().unwrap();
        assert_eq!(frames, vec![dir.frame_path(0), dir.frame_path(1)]);
        assert_eq!(dir.frame_count().unwrap(), 2);
        assert!(dir.input_pattern().ends_with("%06d.png"));
    }
}
