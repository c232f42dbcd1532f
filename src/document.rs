//! Input document description: declared type and size.
//!
//! The engine never opens the document's bytes itself; the remote service is
//! the sole content-understanding oracle. All the engine needs locally is the
//! path (to upload), the byte size (to route and budget tokens), and the
//! declared type (to phrase instructions).

use crate::error::ExtractError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Declared type of an input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Docx,
    Doc,
}

impl DocumentType {
    /// Human-readable name used in prompts and log lines.
    pub fn display_name(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "PDF",
            DocumentType::Docx => "Word (.docx)",
            DocumentType::Doc => "Word (.doc)",
        }
    }

    /// The lowercase type tag (`pdf`, `docx`, `doc`).
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Docx => "docx",
            DocumentType::Doc => "doc",
        }
    }

    /// Infer the type from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentType::Pdf),
            "docx" => Some(DocumentType::Docx),
            "doc" => Some(DocumentType::Doc),
            _ => None,
        }
    }

    /// Infer the type from a file path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentType {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| {
            ExtractError::InvalidConfig(format!(
                "unknown document type '{s}' (expected pdf, docx, or doc)"
            ))
        })
    }
}

/// A local document about to be extracted. Read-only to the engine;
/// lifetime is one extraction call.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    pub path: PathBuf,
    pub byte_size: u64,
    pub doc_type: DocumentType,
}

impl DocumentSource {
    /// Stat the file and build a source record.
    ///
    /// A missing path is a config error, fatal and never retried.
    pub async fn open(path: &Path, doc_type: DocumentType) -> Result<Self, ExtractError> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|_| ExtractError::FileNotFound {
                path: path.to_path_buf(),
            })?;
        if !meta.is_file() {
            return Err(ExtractError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            byte_size: meta.len(),
            doc_type,
        })
    }
}
