pub mod embeddings;
pub mod memory;
pub mod qdrant_index;
pub mod record;
pub mod retry;
pub mod store;

pub use embeddings::{Embedder, EmbeddingClient, HashEmbedder};
pub use memory::{InMemoryStore, cosine_similarity};
pub use qdrant_index::QdrantStore;
pub use record::{IndexedRecord, build_metadata};
pub use retry::{RetryConfig, RetryPolicy};
pub use store::{
    CollectionStats, DocumentSummary, MetadataFilter, ScoredRecord, StoreError, StoredRecord, VectorStore,
    sort_by_chunk_index, summarize_documents, validate_collection_name,
};
