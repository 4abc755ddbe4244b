//! File storage module.
//!
//! Uploaded files live under one root directory, grouped by upload date:
//! `<root>/YYYY/YYYY-MM-DD/<title>_<hash>.<ext>`. The database stores the
//! path relative to the root.

use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

/// SHA-256 hash of file content, hex encoded.
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Clean a title for use in a file name. Anything that is not
/// alphanumeric or '-' becomes '_'.
pub fn sanitize_component(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Lowercase extension of an uploaded file name.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// MIME type for a stored file extension.
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "epub" => "application/epub+zip",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Store for uploaded files under a single root directory.
#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at the given directory, creating it if needed.
    pub fn new(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Derive the relative storage path for an upload.
    pub fn derive_path(title: &str, hash: &str, extension: &str, at: DateTime<Utc>) -> String {
        format!(
            "{}/{}/{}_{}.{}",
            at.format("%Y"),
            at.format("%Y-%m-%d"),
            sanitize_component(title),
            hash,
            extension
        )
    }

    /// Resolve a relative path against the root. Rejects absolute paths
    /// and any path that steps outside the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        if path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AppError::Invalid(format!("Invalid file path: {}", relative)));
        }

        Ok(self.root.join(path))
    }

    /// Write file content at the relative path, creating date directories.
    pub fn save(&self, relative: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, data)?;
        Ok(())
    }

    /// Check whether a stored file exists.
    pub fn exists(&self, relative: &str) -> bool {
        self.resolve(relative).map(|p| p.exists()).unwrap_or(false)
    }

    /// Remove a stored file. Reports whether a file was unlinked; a
    /// missing file is not an error.
    pub fn remove(&self, relative: &str) -> Result<bool> {
        let path = self.resolve(relative)?;
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_content_hash() {
        assert_eq!(
            content_hash(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("My Book: Part 2"), "My_Book__Part_2");
        assert_eq!(sanitize_component("plain-title"), "plain-title");
        assert_eq!(sanitize_component("..."), "file");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("report.PDF"), Some("pdf".to_string()));
        assert_eq!(extension_of("notes.tar.gz"), Some("gz".to_string()));
        assert_eq!(extension_of("no_extension"), None);
    }

    #[test]
    fn test_derive_path() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        let path = FileStore::derive_path("My Book", "abc123", "pdf", at);
        assert_eq!(path, "2024/2024-03-05/My_Book_abc123.pdf");
    }

    #[test]
    fn test_save_resolve_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        store.save("2024/2024-03-05/a_b.pdf", b"content").unwrap();
        assert!(store.exists("2024/2024-03-05/a_b.pdf"));

        let path = store.resolve("2024/2024-03-05/a_b.pdf").unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"content");
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        assert!(store.resolve("../outside.pdf").is_err());
        assert!(store.resolve("/etc/passwd").is_err());
        assert!(store.resolve("2024/../../outside.pdf").is_err());
    }

    #[test]
    fn test_remove_reports_unlink() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        store.save("2024/2024-03-05/a_b.pdf", b"content").unwrap();
        assert!(store.remove("2024/2024-03-05/a_b.pdf").unwrap());
        assert!(!store.remove("2024/2024-03-05/a_b.pdf").unwrap());
    }
}
