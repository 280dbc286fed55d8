//! Workspace folders and workspace-relative paths.

use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::document::{Document, FILE_SYSTEM_SCHEMES};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceFolder {
    pub uri: Url,
    pub name: String,
}

impl WorkspaceFolder {
    pub fn new(uri: Url, name: impl Into<String>) -> Self {
        Self {
            uri,
            name: name.into(),
        }
    }

    /// Builds a folder from a local directory.
    pub fn from_path(path: &Path) -> Option<Self> {
        let uri = Url::from_directory_path(path).ok()?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Some(Self::new(uri, name))
    }

    /// Path of the folder on its file layer.
    pub fn fs_path(&self) -> Option<PathBuf> {
        if self.uri.scheme() == "file" {
            self.uri.to_file_path().ok()
        } else {
            Some(PathBuf::from(self.uri.path()))
        }
    }

    pub fn is_file_scheme(&self) -> bool {
        self.uri.scheme() == "file"
    }

    /// Whether the folder has a browsable file layer behind it.
    pub fn has_file_system(&self) -> bool {
        FILE_SYSTEM_SCHEMES.contains(&self.uri.scheme())
    }

    fn contains(&self, uri: &Url) -> bool {
        if self.uri.scheme() != uri.scheme() || self.uri.authority() != uri.authority() {
            return false;
        }
        let folder = self.uri.path().trim_end_matches('/');
        let path = uri.path();
        path == folder
            || path
                .strip_prefix(folder)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// The set of folders open in the host.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceFolders {
    folders: Vec<WorkspaceFolder>,
}

impl WorkspaceFolders {
    pub fn new(folders: Vec<WorkspaceFolder>) -> Self {
        Self { folders }
    }

    pub fn folders(&self) -> &[WorkspaceFolder] {
        &self.folders
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    /// Innermost folder containing `uri`.
    pub fn folder_for(&self, uri: &Url) -> Option<&WorkspaceFolder> {
        self.folders
            .iter()
            .filter(|f| f.contains(uri))
            .max_by_key(|f| f.uri.path().trim_end_matches('/').len())
    }

    /// Identity used for the durable trust allow-list.
    pub fn identity(&self) -> Option<String> {
        self.folders.first().map(|f| f.uri.to_string())
    }

    /// Forward-slash path of `document` relative to its workspace folder.
    ///
    /// Documents outside every folder get their full path, and documents
    /// without a path get their URI.
    pub fn relative_path(&self, document: &Document) -> String {
        let Some(path) = document.fs_path() else {
            return document.uri.to_string();
        };
        if let Some(root) = self.folder_for(&document.uri).and_then(|f| f.fs_path())
            && let Ok(relative) = path.strip_prefix(&root)
        {
            return posix_path(relative);
        }
        posix_path(&path)
    }
}

/// Renders `path` with `/` separators regardless of platform.
pub fn posix_path(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        match component {
            Component::RootDir => out.push('/'),
            Component::Prefix(prefix) => out.push_str(&prefix.as_os_str().to_string_lossy()),
            Component::CurDir => {}
            Component::ParentDir => {
                push_segment(&mut out, "..");
            }
            Component::Normal(name) => push_segment(&mut out, &name.to_string_lossy()),
        }
    }
    out
}

fn push_segment(out: &mut String, segment: &str) {
    if !out.is_empty() && !out.ends_with('/') {
        out.push('/');
    }
    out.push_str(segment);
}
