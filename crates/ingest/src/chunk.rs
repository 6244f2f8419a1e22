use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkType {
    /// Aligned with a detected resume section
    Section,
    /// Plain sliding window, no structural information
    FixedWindow,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Section => "section",
            ChunkType::FixedWindow => "fixed-window",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: String,
    pub chunk_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub source: String,
    pub offset: (usize, usize), // [start, end) character positions
    pub chunk_type: ChunkType,
    pub section_name: Option<String>,
}

impl Chunk {
    pub fn new(
        doc_id: String,
        chunk_index: usize,
        text: String,
        source: String,
        offset: (usize, usize),
        chunk_type: ChunkType,
        section_name: Option<String>,
    ) -> Self {
        let chunk_id = Self::generate_chunk_id(&doc_id, chunk_index);

        Self {
            doc_id,
            chunk_id,
            chunk_index,
            text,
            source,
            offset,
            chunk_type,
            section_name,
        }
    }

    /// Record key derived from (document, position) only, so a re-ingested
    /// document overwrites its previous records instead of adding new ones.
    pub fn generate_chunk_id(doc_id: &str, chunk_index: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(doc_id.as_bytes());
        hasher.update(b":");
        hasher.update(chunk_index.to_string().as_bytes());
        let result = hasher.finalize();

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&result[..16]);
        Uuid::from_bytes(bytes).to_string()
    }

    /// First `max_chars` characters, for previews in metadata and listings.
    pub fn preview(&self, max_chars: usize) -> String {
        self.text.chars().take(max_chars).collect()
    }
}
