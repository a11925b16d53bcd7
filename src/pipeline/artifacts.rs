//! Temporary file tracking for a single run.

use std::path::{Path, PathBuf};

/// Every temporary file a run creates is registered here before it is
/// written. [`RunArtifacts::cleanup`] deletes them all; dropping the guard
/// without cleaning up (a cancelled run) deletes them synchronously.
#[derive(Debug, Default)]
pub struct RunArtifacts {
    paths: Vec<PathBuf>,
}

impl RunArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    pub fn tracked(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Delete every tracked file. Failures come back as warnings; files that
    /// are already gone are not failures.
    pub async fn cleanup(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();
        for path in self.paths.drain(..) {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove temporary file");
                    warnings.push(format!("Could not remove temporary file {}: {}", path.display(), e));
                }
            }
        }
        warnings
    }
}

impl Drop for RunArtifacts {
    fn drop(&mut self) {
        for path in &self.paths {
            remove_quietly(path);
        }
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove temporary file on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_cleanup_removes_tracked_files() {
        let dir = TempDir::new().unwrap();
        let mut artifacts = RunArtifacts::new();
        for i in 0..3 {
            let path = dir.path().join(format!("part{}.mp3", i));
            std::fs::write(&path, b"x").unwrap();
            artifacts.track(path);
        }
        // Never written; must not produce a warning.
        artifacts.track(dir.path().join("part3.mp3"));

        let warnings = artifacts.cleanup().await;
        assert!(warnings.is_empty());
        assert!(artifacts.tracked().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_failure_becomes_warning() {
        let dir = TempDir::new().unwrap();
        let not_a_file = dir.path().join("subdir");
        std::fs::create_dir(&not_a_file).unwrap();

        let mut artifacts = RunArtifacts::new();
        artifacts.track(&not_a_file);

        let warnings = artifacts.cleanup().await;
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("subdir"));
    }

    #[test]
    fn test_drop_removes_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("segment.mp3");
        std::fs::write(&path, b"x").unwrap();

        {
            let mut artifacts = RunArtifacts::new();
            artifacts.track(&path);
        }

        assert!(!path.exists());
    }
}
