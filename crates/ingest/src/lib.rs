pub mod chunk;
pub mod chunker;
pub mod document;
pub mod formats;
pub mod reader;

pub use chunk::{Chunk, ChunkType};
pub use chunker::{ChunkStrategy, Chunker, ChunkerConfig, detect_section};
pub use document::{Document, generate_doc_id};
pub use reader::{Discovered, FileReader, LoadError, SUPPORTED_EXTENSIONS};
