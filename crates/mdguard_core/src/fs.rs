//! File layer abstraction.
//!
//! Config probing, extends loading, ignore files and custom rule modules all
//! go through [`FileSystem`] so the host can substitute its own file layer,
//! or none at all for documents that do not live on a file system.

use std::path::Path;

use async_trait::async_trait;

use crate::CoreError;

/// Kind of a file-layer entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
    SymbolicLink,
    Other,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub file_type: FileType,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, file_type: FileType) -> Self {
        Self {
            name: name.into(),
            file_type,
        }
    }
}

/// Asynchronous file layer used by the resolver and the ignore matcher.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Returns the type of the entry at `path`, following symbolic links.
    async fn stat(&self, path: &Path) -> Result<FileType, CoreError>;

    /// Reads a whole file as UTF-8 text.
    async fn read_file(&self, path: &Path) -> Result<String, CoreError>;

    /// Lists a directory without following symbolic links.
    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>, CoreError>;

    /// Whether this file layer can answer anything at all.
    fn is_available(&self) -> bool {
        true
    }
}

/// File layer backed by the local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeFs;

#[async_trait]
impl FileSystem for NativeFs {
    async fn stat(&self, path: &Path) -> Result<FileType, CoreError> {
        let metadata = tokio::fs::metadata(path).await?;
        Ok(to_file_type(metadata.file_type()))
    }

    async fn read_file(&self, path: &Path) -> Result<String, CoreError> {
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>, CoreError> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            entries.push(DirEntry::new(
                entry.file_name().to_string_lossy(),
                to_file_type(file_type),
            ));
        }
        Ok(entries)
    }
}

fn to_file_type(file_type: std::fs::FileType) -> FileType {
    if file_type.is_symlink() {
        FileType::SymbolicLink
    } else if file_type.is_dir() {
        FileType::Directory
    } else if file_type.is_file() {
        FileType::File
    } else {
        FileType::Other
    }
}

/// File layer for documents with no backing file system.
///
/// Every call fails, which degrades config resolution to settings only and
/// the ignore matcher to glob lists only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullFs;

#[async_trait]
impl FileSystem for NullFs {
    async fn stat(&self, _path: &Path) -> Result<FileType, CoreError> {
        Err(CoreError::Unavailable)
    }

    async fn read_file(&self, _path: &Path) -> Result<String, CoreError> {
        Err(CoreError::Unavailable)
    }

    async fn read_dir(&self, _path: &Path) -> Result<Vec<DirEntry>, CoreError> {
        Err(CoreError::Unavailable)
    }

    fn is_available(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn native_fs_reads_and_lists() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".markdownlint.json"), "{}").unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();

        let fs = NativeFs;
        let mut entries = fs.read_dir(dir.path()).await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(
            entries,
            vec![
                DirEntry::new(".markdownlint.json", FileType::File),
                DirEntry::new("docs", FileType::Directory),
            ]
        );
        assert_eq!(
            fs.read_file(&dir.path().join(".markdownlint.json"))
                .await
                .unwrap(),
            "{}"
        );
        assert_eq!(
            fs.stat(&dir.path().join("docs")).await.unwrap(),
            FileType::Directory
        );
    }

    #[tokio::test]
    async fn native_fs_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = NativeFs
            .read_file(&dir.path().join("missing.json"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn null_fs_always_fails() {
        let fs = NullFs;
        assert!(!fs.is_available());
        assert!(fs.read_file(Path::new("/a")).await.is_err());
        assert!(fs.read_dir(Path::new("/")).await.is_err());
        assert!(fs.stat(Path::new("/")).await.is_err());
    }
}
