//! Read-only access to the bundled resource pack.
//!
//! The mapping file and the audio tracks ship together in one directory
//! tree. Behind a trait so the mapping loader can be exercised against an
//! in-memory store in tests.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

/// Read-only view of packaged resources, addressed by relative path
/// (forward slashes, e.g. `tracks/docks.mp3`).
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Whether the resource exists in the pack.
    async fn exists(&self, path: &str) -> bool;

    /// Read a UTF-8 resource in full.
    async fn read_text(&self, path: &str) -> Result<String>;
}

/// Resource pack rooted at a directory on disk.
pub struct PackDir {
    root: PathBuf,
}

impl PackDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl ResourceStore for PackDir {
    async fn exists(&self, path: &str) -> bool {
        tokio::fs::try_exists(self.resolve(path)).await.unwrap_or(false)
    }

    async fn read_text(&self, path: &str) -> Result<String> {
        let full = self.resolve(path);
        tokio::fs::read_to_string(&full)
            .await
            .with_context(|| format!("reading resource {}", full.display()))
    }
}
