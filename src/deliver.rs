//! Hand-off of finished books.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};

/// Receives each successfully built book.
pub trait Delivery {
    /// Deliver `content` under `filename`, with `subject` describing it.
    fn deliver(&self, subject: &str, content: &[u8], filename: &str) -> Result<()>;
}

/// Writes books into a directory.
#[derive(Debug, Clone)]
pub struct DirectoryDelivery {
    dir: PathBuf,
}

impl DirectoryDelivery {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Delivery for DirectoryDelivery {
    fn deliver(&self, subject: &str, content: &[u8], filename: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            Error::Delivery(format!("cannot create {}: {e}", self.dir.display()))
        })?;

        let path = self.dir.join(filename);
        fs::write(&path, content)
            .map_err(|e| Error::Delivery(format!("cannot write {}: {e}", path.display())))?;

        info!(subject, path = %path.display(), bytes = content.len(), "Delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_into_nested_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let delivery = DirectoryDelivery::new(tmp.path().join("out/books"));

        delivery
            .deliver("Convert: Rust", b"PK\x03\x04", "Rust.epub")
            .unwrap();

        let written = fs::read(tmp.path().join("out/books/Rust.epub")).unwrap();
        assert_eq!(written, b"PK\x03\x04");
    }

    #[test]
    fn test_unwritable_target() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, b"x").unwrap();

        let delivery = DirectoryDelivery::new(&blocker);
        let err = delivery.deliver("s", b"data", "a.epub").unwrap_err();
        assert!(matches!(err, Error::Delivery(_)));
    }
}
