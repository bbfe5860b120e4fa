use crate::error::PipelineError;

use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub container: String,
    pub key: String,
}

impl SourceLocation {
    pub fn new(container: &str, key: &str) -> Self {
        Self {
            container: container.to_string(),
            key: key.to_string(),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (container, key) = raw.split_once('/')?;
        if container.is_empty() || key.is_empty() {
            return None;
        }
        Some(Self::new(container, key))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}

#[async_trait]
pub trait ObjectSource: Send + Sync {
    async fn fetch(&self, location: &SourceLocation) -> Result<Vec<u8>, PipelineError>;
}

pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn resolve(&self, location: &SourceLocation) -> io::Result<PathBuf> {
        let container = Path::new(&location.container);
        let key = Path::new(&location.key);
        let plain = |p: &Path| p.components().all(|c| matches!(c, Component::Normal(_)));

        if !plain(container) || container.components().count() != 1 || !plain(key) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "container and key must be relative paths inside the store",
            ));
        }
        Ok(self.root.join(container).join(key))
    }
}

#[async_trait]
impl ObjectSource for DirectorySource {
    async fn fetch(&self, location: &SourceLocation) -> Result<Vec<u8>, PipelineError> {
        let unavailable = |source| PipelineError::SourceUnavailable {
            location: location.to_string(),
            source,
        };

        let path = self.resolve(location).map_err(unavailable)?;
        debug!(path = %path.display(), "Reading object");
        tokio::fs::read(&path).await.map_err(unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_location() {
        assert_eq!(
            SourceLocation::parse("uploads/2024/jan.csv"),
            Some(SourceLocation::new("uploads", "2024/jan.csv"))
        );
        assert_eq!(SourceLocation::parse("uploads"), None);
        assert_eq!(SourceLocation::parse("/jan.csv"), None);
        assert_eq!(SourceLocation::parse("uploads/"), None);
    }

    #[tokio::test]
    async fn test_fetch_existing_object() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("uploads")).unwrap();
        std::fs::write(root.path().join("uploads/jan.csv"), "id,date,transaction,email").unwrap();

        let source = DirectorySource::new(root.path());
        let bytes = source
            .fetch(&SourceLocation::new("uploads", "jan.csv"))
            .await
            .unwrap();

        assert_eq!(bytes, b"id,date,transaction,email");
    }

    #[tokio::test]
    async fn test_missing_object_is_unavailable() {
        let root = TempDir::new().unwrap();
        let source = DirectorySource::new(root.path());

        match source.fetch(&SourceLocation::new("uploads", "nope.csv")).await {
            Err(PipelineError::SourceUnavailable { location, .. }) => {
                assert_eq!(location, "uploads/nope.csv");
            }
            other => panic!("Expected SourceUnavailable error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_key_cannot_escape_the_store() {
        let root = TempDir::new().unwrap();
        let source = DirectorySource::new(root.path());

        for location in [
            SourceLocation::new("uploads", "../secret.csv"),
            SourceLocation::new("..", "secret.csv"),
            SourceLocation::new("uploads", "/etc/passwd"),
        ] {
            assert!(matches!(
                source.fetch(&location).await,
                Err(PipelineError::SourceUnavailable { .. })
            ));
        }
    }
}
