use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// A loaded resume. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    pub display_name: String,
    pub source_path: PathBuf,
    pub file_format: String,
    pub raw_text: String,
}

impl Document {
    /// Build a document from text read at `source_path`.
    ///
    /// `original_name` overrides the display name and the identity source. Uploads
    /// staged in a temporary file use it so that re-uploading the same resume maps
    /// onto the same `document_id`.
    pub fn new(source_path: &Path, original_name: Option<&str>, raw_text: String) -> Self {
        let identity_path = match original_name {
            Some(name) => PathBuf::from(name),
            None => source_path.to_path_buf(),
        };
        let absolute = std::path::absolute(&identity_path).unwrap_or(identity_path.clone());

        let display_name = identity_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| identity_path.to_string_lossy().to_string());

        let file_format = identity_path
            .extension()
            .map(|e| e.to_string_lossy().to_uppercase())
            .unwrap_or_default();

        let document_id = generate_doc_id(&display_name, &absolute.to_string_lossy());

        Self {
            document_id,
            display_name,
            source_path: source_path.to_path_buf(),
            file_format,
            raw_text,
        }
    }

    pub fn source(&self) -> String {
        self.source_path.to_string_lossy().to_string()
    }
}

/// Stable document ID: file name plus a short hash of the absolute path.
pub fn generate_doc_id(display_name: &str, absolute_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(absolute_path.as_bytes());
    let result = hasher.finalize();
    format!("{}_{}", display_name, &hex::encode(&result[..4]))
}
