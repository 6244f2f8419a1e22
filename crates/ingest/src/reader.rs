use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::document::Document;
use crate::formats;

/// Extensions the loader can turn into text.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "txt", "md", "text"];

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Unsupported file format '{extension}': {path}")]
    Unsupported { path: PathBuf, extension: String },

    #[error("Failed to read file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File is not valid UTF-8 text: {0}")]
    InvalidEncoding(PathBuf),

    #[error("Failed to extract text from {format} file {path}: {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error("File contains no text: {0}")]
    Empty(PathBuf),

    #[error("Failed to scan directory {path}: {message}")]
    Directory { path: PathBuf, message: String },
}

/// One entry found while walking a directory.
#[derive(Debug)]
pub enum Discovered {
    File(PathBuf),
    /// An entry below the root that could not be inspected, such as a
    /// dangling symlink or an unreadable subdirectory.
    Unreadable { path: PathBuf, error: LoadError },
}

impl Discovered {
    pub fn path(&self) -> &Path {
        match self {
            Discovered::File(path) | Discovered::Unreadable { path, .. } => path,
        }
    }
}

pub struct FileReader;

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

impl FileReader {
    pub fn is_supported(path: &Path) -> bool {
        extension_of(path)
            .map(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
            .unwrap_or(false)
    }

    pub async fn read_file(path: &Path) -> Result<Document, LoadError> {
        Self::read_file_as(path, None).await
    }

    /// Read `path` but identify the document by `original_name`.
    pub async fn read_file_as(path: &Path, original_name: Option<&str>) -> Result<Document, LoadError> {
        let extension = extension_of(path).unwrap_or_default();
        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(LoadError::Unsupported {
                path: path.to_path_buf(),
                extension,
            });
        }

        let bytes = fs::read(path).await.map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let content = match extension.as_str() {
            "pdf" => Self::extract_binary(path, "PDF", bytes, formats::pdf_text).await?,
            "docx" => Self::extract_binary(path, "DOCX", bytes, formats::docx_text).await?,
            _ => String::from_utf8(bytes).map_err(|_| LoadError::InvalidEncoding(path.to_path_buf()))?,
        };

        if content.trim().is_empty() {
            return Err(LoadError::Empty(path.to_path_buf()));
        }

        debug!(path = %path.display(), chars = content.chars().count(), "Loaded document");
        Ok(Document::new(path, original_name, content))
    }

    /// Run a CPU-bound extractor off the async workers. A panicking parser
    /// is reported as a parse error for this file only.
    async fn extract_binary(
        path: &Path,
        format: &'static str,
        bytes: Vec<u8>,
        extract: fn(&[u8]) -> Result<String, String>,
    ) -> Result<String, LoadError> {
        let parse_error = |message: String| LoadError::Parse {
            path: path.to_path_buf(),
            format,
            message,
        };

        tokio::task::spawn_blocking(move || extract(&bytes))
            .await
            .map_err(|e| parse_error(format!("extractor aborted: {}", e)))?
            .map_err(parse_error)
    }

    /// Recursively list supported files under `dir`, sorted for a stable batch
    /// order. Entries that cannot be inspected are returned as `Unreadable`;
    /// only a root that cannot be walked is an error.
    pub fn discover(dir: &Path) -> Result<Vec<Discovered>, LoadError> {
        if !dir.is_dir() {
            return Err(LoadError::Directory {
                path: dir.to_path_buf(),
                message: "not a directory".to_string(),
            });
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(LoadError::Directory {
                        path: dir.to_path_buf(),
                        message: err.to_string(),
                    });
                }
                Err(err) => {
                    let path = err.path().unwrap_or(dir).to_path_buf();
                    // Known non-resume files are not worth a failed result
                    if extension_of(&path).is_some() && !Self::is_supported(&path) {
                        debug!(path = %path.display(), error = %err, "Skipping unreadable unsupported entry");
                        continue;
                    }

                    warn!(path = %path.display(), error = %err, "Unreadable directory entry");
                    let message = err.to_string();
                    let error = match err.into_io_error() {
                        Some(source) => LoadError::Io {
                            path: path.clone(),
                            source,
                        },
                        None => LoadError::Directory {
                            path: path.clone(),
                            message,
                        },
                    };
                    found.push(Discovered::Unreadable { path, error });
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if Self::is_supported(path) {
                found.push(Discovered::File(path.to_path_buf()));
            } else {
                debug!(path = %path.display(), "Skipping unsupported file");
            }
        }

        found.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(found)
    }
}
