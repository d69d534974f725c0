//! Per-attempt scratch directories for downloaded reference images.
//!
//! [`ScratchSpace::with_scratch_dir`] hands the closure a fresh subdirectory
//! of the scratch root and removes it on every exit path. Removal failures are
//! logged and swallowed so they never replace the closure's own result. A
//! drop guard covers panics and cancelled futures; a hard process crash can
//! still leave a directory behind.

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::CoreError;

/// Prefix for per-attempt subdirectories.
const ATTEMPT_PREFIX: &str = "attempt-";

/// Owns the scratch root. Cheap to share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
}

/// A single attempt's directory. Only valid inside `with_scratch_dir`.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchSpace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run `f` with a fresh scratch directory, deleting it afterwards.
    pub async fn with_scratch_dir<T, F, Fut>(&self, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(ScratchDir) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let dir = self.create_attempt_dir().await?;
        let mut guard = CleanupGuard {
            path: Some(dir.path.clone()),
        };

        let outcome = f(dir).await;

        if let Some(path) = guard.path.take() {
            if let Err(err) = tokio::fs::remove_dir_all(&path).await {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %err, "Failed to remove scratch directory");
                }
            }
        }
        outcome
    }

    async fn create_attempt_dir(&self) -> Result<ScratchDir, CoreError> {
        let path = self
            .root
            .join(format!("{ATTEMPT_PREFIX}{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&path).await.map_err(|e| {
            CoreError::Internal(format!(
                "failed to create scratch directory {}: {e}",
                path.display()
            ))
        })?;
        Ok(ScratchDir { path })
    }
}

impl ScratchDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `bytes` to a file directly inside this directory.
    ///
    /// `name` must be a bare file name; anything with a path separator or a
    /// parent component is rejected so writes cannot escape the directory.
    pub async fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, CoreError> {
        let is_bare = Path::new(name)
            .file_name()
            .is_some_and(|file_name| file_name == name);
        if !is_bare {
            return Err(CoreError::Validation(format!(
                "invalid scratch file name '{name}'"
            )));
        }
        let path = self.path.join(name);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            CoreError::Internal(format!("failed to write {}: {e}", path.display()))
        })?;
        Ok(path)
    }
}

/// Synchronous fallback removal for panics and dropped futures.
struct CleanupGuard {
    path: Option<PathBuf>,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(err) = std::fs::remove_dir_all(&path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %err, "Failed to remove scratch directory");
                }
            }
        }
    }
}
