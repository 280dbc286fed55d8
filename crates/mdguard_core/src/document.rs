//! Documents handed to the core by the host.

use std::path::PathBuf;

use url::Url;

/// Schemes whose documents are linted at all.
pub const LINTABLE_SCHEMES: &[&str] = &["untitled", "file", "vscode-vfs", "vscode-test-web", "gist"];

/// Schemes backed by a browsable file layer.
pub const FILE_SYSTEM_SCHEMES: &[&str] = &["file", "vscode-vfs", "vscode-test-web"];

/// Line endings recognised when splitting a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
    Cr,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Cr => "\r",
        }
    }
}

/// A snapshot of an open document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub uri: Url,
    pub text: String,
    pub language_id: String,
    pub version: i32,
}

impl Document {
    pub fn new(uri: Url, text: impl Into<String>, language_id: impl Into<String>, version: i32) -> Self {
        Self {
            uri,
            text: text.into(),
            language_id: language_id.into(),
            version,
        }
    }

    /// Lines of the document without their terminators.
    pub fn lines(&self) -> Vec<&str> {
        split_lines(&self.text)
    }

    /// Returns line `index` (0-based).
    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines().get(index).copied()
    }

    pub fn line_count(&self) -> usize {
        self.lines().len()
    }

    /// The most common line ending, `\n` when the document has none.
    pub fn line_ending(&self) -> LineEnding {
        dominant_line_ending(&self.text)
    }

    pub fn scheme(&self) -> &str {
        self.uri.scheme()
    }

    /// Whether the document has a browsable file layer behind it.
    pub fn has_file_system(&self) -> bool {
        FILE_SYSTEM_SCHEMES.contains(&self.scheme())
    }

    /// Whether the document should be linted for the given language list.
    pub fn is_lintable(&self, languages: &[String]) -> bool {
        LINTABLE_SCHEMES.contains(&self.scheme())
            && languages.iter().any(|l| *l == self.language_id)
    }

    /// Path of the document on its file layer.
    ///
    /// `file` URIs map to native paths; other file-system schemes use the
    /// URI path as-is.
    pub fn fs_path(&self) -> Option<PathBuf> {
        match self.scheme() {
            "file" => self.uri.to_file_path().ok(),
            scheme if FILE_SYSTEM_SCHEMES.contains(&scheme) => Some(PathBuf::from(self.uri.path())),
            _ => None,
        }
    }

    /// Name reported to the engine: the file path, or the URI for documents
    /// without one.
    pub fn name(&self) -> String {
        match self.fs_path() {
            Some(path) => path.to_string_lossy().into_owned(),
            None => self.uri.to_string(),
        }
    }
}

/// Splits text on `\r\n`, `\r` and `\n`.
///
/// A trailing terminator yields a final empty line, so `"a\n"` is
/// `["a", ""]`.
pub fn split_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }
    lines.push(&text[start..]);
    lines
}

/// Returns the most frequent line ending of `text`.
pub fn dominant_line_ending(text: &str) -> LineEnding {
    let bytes = text.as_bytes();
    let (mut lf, mut crlf, mut cr) = (0usize, 0usize, 0usize);
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => lf += 1,
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                crlf += 1;
                i += 1;
            }
            b'\r' => cr += 1,
            _ => {}
        }
        i += 1;
    }
    if crlf > lf && crlf >= cr {
        LineEnding::CrLf
    } else if cr > lf && cr > crlf {
        LineEnding::Cr
    } else {
        LineEnding::Lf
    }
}

/// Length of `s` in UTF-16 code units.
///
/// Columns exchanged with the engine and the editor are counted in these
/// units.
pub fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Converts a UTF-16 column into a byte offset within `s`.
///
/// Columns past the end clamp to `s.len()`; a column inside a surrogate
/// pair rounds up to the next character boundary.
pub fn utf16_to_byte(s: &str, column: usize) -> usize {
    let mut units = 0;
    for (offset, ch) in s.char_indices() {
        if units >= column {
            return offset;
        }
        units += ch.len_utf16();
    }
    s.len()
}
