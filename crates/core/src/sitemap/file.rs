//! Access to the generated static sitemap on disk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::{Mutex, MutexGuard};

use crate::Error;

/// The static sitemap file.
///
/// Reads are lock-free; writers that read-modify-write must hold
/// [`StaticSitemapFile::lock`] for the whole cycle. Writes replace the file
/// atomically via a sibling temp file and rename, so readers see either the
/// old or the new document.
#[derive(Debug)]
pub struct StaticSitemapFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl StaticSitemapFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the exclusive writer lock.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    /// Read the whole file as UTF-8.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` when the file does not exist, `Error::Io` otherwise.
    pub async fn read(&self) -> Result<String, Error> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::NotFound(format!("static sitemap {} does not exist", self.path.display())),
            _ => Error::Io(format!("failed to read {}: {e}", self.path.display())),
        })
    }

    /// Replace the whole file with `contents`.
    pub async fn write(&self, contents: &str) -> Result<(), Error> {
        let temp_path = self.temp_path();

        tokio::fs::write(&temp_path, contents)
            .await
            .map_err(|e| Error::Io(format!("failed to write temp file {}: {e}", temp_path.display())))?;

        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(Error::Io(format!(
                "failed to rename {} to {}: {e}",
                temp_path.display(),
                self.path.display()
            )));
        }

        tracing::debug!(path = %self.path.display(), bytes = contents.len(), "wrote static sitemap");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "sitemap.xml".into(), |n| n.to_string_lossy().into_owned());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let file = StaticSitemapFile::new(dir.path().join("sitemap.xml"));

        let result = file.read().await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let file = StaticSitemapFile::new(dir.path().join("sitemap.xml"));

        file.write("<urlset/>").await.unwrap();
        assert_eq!(file.read().await.unwrap(), "<urlset/>");

        file.write("<urlset></urlset>").await.unwrap();
        assert_eq!(file.read().await.unwrap(), "<urlset></urlset>");
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = StaticSitemapFile::new(dir.path().join("sitemap.xml"));
        file.write("<urlset/>").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["sitemap.xml"]);
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = StaticSitemapFile::new(dir.path().join("public").join("sitemap.xml"));

        let result = file.write("<urlset/>").await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
