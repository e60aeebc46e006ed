//! Encoder executable discovery.

use std::path::{Path, PathBuf};

use keyreel_common::config::EncoderConfig;
use keyreel_common::error::{ReelError, ReelResult};

/// Finds the encoder executable.
///
/// Candidates, in order: the configured override, the executable next to
/// the running application, the same name in the application's parent
/// directory, then a fixed fallback path.
#[derive(Debug, Clone)]
pub struct EncoderLocator {
    override_path: Option<PathBuf>,
    app_dir: Option<PathBuf>,
    executable_name: String,
    fallback_path: PathBuf,
}

impl EncoderLocator {
    pub fn new(executable_name: impl Into<String>, fallback_path: impl Into<PathBuf>) -> Self {
        Self {
            override_path: None,
            app_dir: None,
            executable_name: executable_name.into(),
            fallback_path: fallback_path.into(),
        }
    }

    /// Locator for the running application, honouring the config override.
    pub fn from_config(config: &EncoderConfig) -> Self {
        let app_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));

        Self {
            override_path: config.path.clone(),
            app_dir,
            executable_name: config.executable_name.clone(),
            fallback_path: config.fallback_path.clone(),
        }
    }

    pub fn with_override(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    pub fn with_app_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.app_dir = Some(dir.into());
        self
    }

    /// Every path [`EncoderLocator::locate`] tries, in order.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(4);
        if let Some(path) = &self.override_path {
            candidates.push(path.clone());
        }
        if let Some(dir) = &self.app_dir {
            candidates.push(dir.join(&self.executable_name));
            if let Some(parent) = dir.parent() {
                candidates.push(parent.join(&self.executable_name));
            }
        }
        candidates.push(self.fallback_path.clone());
        candidates
    }

    /// First candidate that exists and can be executed.
    pub fn locate(&self) -> ReelResult<PathBuf> {
        let candidates = self.candidates();
        for candidate in &candidates {
            let usable = is_executable(candidate);
            tracing::debug!(path = %candidate.display(), usable, "Encoder candidate");
            if usable {
                return Ok(candidate.clone());
            }
        }

        Err(ReelError::EncoderUnavailable {
            searched: candidates,
        })
    }

    pub fn is_available(&self) -> bool {
        self.locate().is_ok()
    }
}

/// A regular file that, on Unix, carries an execute bit.
pub fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}
