use anyhow::{Context, Result};
use extract::{ExtractedMetadata, LlmProvider, MetadataExtractor};
use futures::stream::{self, StreamExt};
use index::{Embedder, IndexedRecord, StoreError, VectorStore};
use ingest::{Chunk, Chunker, Discovered, Document, FileReader, LoadError};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::IngestError;
use crate::result::IngestResult;
use crate::settings::PipelineSettings;

/// Load, chunk, extract, embed and upsert resumes into a collection.
pub struct IngestPipeline {
    settings: PipelineSettings,
    chunker: Chunker,
    extractor: Option<MetadataExtractor>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl IngestPipeline {
    /// `llm` is only used when `enable_llm_parsing` is set; without it every
    /// document gets `ExtractedMetadata::not_extracted()`.
    pub fn new(
        settings: PipelineSettings,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        llm: Option<Arc<dyn LlmProvider>>,
    ) -> Result<Self> {
        let chunker = Chunker::new(settings.chunker.clone()).context("Invalid chunker settings")?;
        anyhow::ensure!(settings.upsert_batch_size > 0, "upsert_batch_size must be at least 1");
        anyhow::ensure!(settings.max_concurrent_files > 0, "max_concurrent_files must be at least 1");

        let extractor = llm
            .filter(|_| settings.enable_llm_parsing)
            .map(MetadataExtractor::new);

        Ok(Self {
            settings,
            chunker,
            extractor,
            embedder,
            store,
        })
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Ingest one file. Never fails: load errors are reported in the result.
    pub async fn process_file(&self, path: &Path, collection: &str) -> IngestResult {
        let started = Instant::now();

        match FileReader::read_file(path).await {
            Ok(document) => self.process_document(document, collection).await,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to load document");
                failed_before_load(path, IngestError::load(err), started)
            }
        }
    }

    /// Ingest an already loaded document.
    pub async fn process_document(&self, document: Document, collection: &str) -> IngestResult {
        let started = Instant::now();
        let mut result = IngestResult::new(
            document.display_name.clone(),
            Some(document.document_id.clone()),
            document.source(),
        );

        self.run(&document, collection, &mut result).await;
        result.failed_chunks.sort_unstable();
        result.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            document = %document.display_name,
            document_id = %document.document_id,
            collection,
            status = ?result.status(),
            chunks_written = result.chunks_written,
            chunks_total = result.chunks_total,
            duration_ms = result.duration_ms,
            "Document processed"
        );
        result
    }

    /// Ingest every supported file under `dir`, up to `max_concurrent_files`
    /// at a time. Results come back in path order, one per discovered entry,
    /// including entries that could not be read. Only a directory that cannot
    /// be walked is an error.
    pub async fn process_directory(&self, dir: &Path, collection: &str) -> Result<Vec<IngestResult>, LoadError> {
        let entries = FileReader::discover(dir)?;
        info!(directory = %dir.display(), entries = entries.len(), collection, "Processing directory");

        // Once up front so concurrent documents do not race to create it
        let collection_error = self.ensure_collection(collection).await.err();

        let results: Vec<IngestResult> = stream::iter(entries)
            .map(|entry| {
                let collection_error = collection_error.clone();
                async move {
                    let started = Instant::now();
                    match (entry, collection_error) {
                        (Discovered::Unreadable { path, error }, _) => {
                            failed_before_load(&path, IngestError::load(error), started)
                        }
                        (Discovered::File(path), Some(err)) => failed_before_load(&path, err, started),
                        (Discovered::File(path), None) => self.process_file(&path, collection).await,
                    }
                }
            })
            .buffered(self.settings.max_concurrent_files)
            .collect()
            .await;

        let failed = results.iter().filter(|r| !r.is_success()).count();
        info!(
            directory = %dir.display(),
            documents = results.len(),
            not_succeeded = failed,
            "Directory processed"
        );
        Ok(results)
    }

    async fn run(&self, document: &Document, collection: &str, result: &mut IngestResult) {
        if let Err(err) = self.ensure_collection(collection).await {
            result.errors.push(err);
            return;
        }

        if self.settings.skip_existing {
            match self.store.document_exists(collection, &document.document_id).await {
                Ok(true) => {
                    debug!(document_id = %document.document_id, "Document already indexed, skipping");
                    result.skipped = true;
                    return;
                }
                Ok(false) => {}
                Err(err) => {
                    result.errors.push(IngestError::Store {
                        chunk_index: None,
                        message: err.to_string(),
                    });
                    return;
                }
            }
        }

        let chunks = self.chunker.chunk_document(document);
        result.chunks_total = chunks.len();
        if chunks.is_empty() {
            result.errors.push(IngestError::load("document produced no chunks"));
            return;
        }

        let metadata = self.extract_metadata(document, result).await;
        result.parsing_method = Some(metadata.parsing_method);

        let records = self.embed_chunks(document, &chunks, &metadata, result).await;
        self.write_records(collection, &records, result).await;

        // Stale tail of a longer earlier version
        if result.failed_chunks.is_empty() {
            match self
                .store
                .prune_document(collection, &document.document_id, chunks.len())
                .await
            {
                Ok(0) => {}
                Ok(pruned) => debug!(document_id = %document.document_id, pruned, "Pruned stale chunks"),
                Err(err) => result.errors.push(IngestError::Store {
                    chunk_index: None,
                    message: format!("pruning stale chunks: {}", err),
                }),
            }
        }
    }

    async fn ensure_collection(&self, collection: &str) -> Result<(), IngestError> {
        let exists = self
            .store
            .collection_exists(collection)
            .await
            .map_err(IngestError::collection)?;
        if exists {
            return Ok(());
        }

        if !self.settings.create_collection_if_missing {
            return Err(IngestError::collection(StoreError::CollectionNotFound(
                collection.to_string(),
            )));
        }

        match self.store.create_collection(collection).await {
            Ok(()) => {
                info!(collection, "Created collection");
                Ok(())
            }
            // Another document in the batch got there first
            Err(StoreError::CollectionExists(_)) => Ok(()),
            Err(err) => Err(IngestError::collection(err)),
        }
    }

    async fn extract_metadata(&self, document: &Document, result: &mut IngestResult) -> ExtractedMetadata {
        let Some(extractor) = &self.extractor else {
            return ExtractedMetadata::not_extracted();
        };

        let extraction = extractor.extract(&document.raw_text).await;
        if let Some(err) = extraction.error {
            result.errors.push(IngestError::Extraction {
                message: err.to_string(),
            });
        }
        extraction.metadata
    }

    /// One embedding call per chunk; a failed chunk is recorded and skipped.
    async fn embed_chunks(
        &self,
        document: &Document,
        chunks: &[Chunk],
        metadata: &ExtractedMetadata,
        result: &mut IngestResult,
    ) -> Vec<IndexedRecord> {
        let mut records = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            match self.embedder.embed(&chunk.text).await {
                Ok(vector) => records.push(IndexedRecord::new(document, chunk, metadata, chunks.len(), vector)),
                Err(err) => {
                    warn!(
                        document_id = %document.document_id,
                        chunk_index = chunk.chunk_index,
                        error = %err,
                        "Embedding failed"
                    );
                    result.failed_chunks.push(chunk.chunk_index);
                    result.errors.push(IngestError::Embedding {
                        chunk_index: chunk.chunk_index,
                        message: err.to_string(),
                    });
                }
            }
        }

        records
    }

    /// Upsert in batches. A failed batch is retried record by record so only
    /// the records the store rejects are reported.
    async fn write_records(&self, collection: &str, records: &[IndexedRecord], result: &mut IngestResult) {
        for batch in records.chunks(self.settings.upsert_batch_size) {
            match self.store.upsert(collection, batch).await {
                Ok(()) => result.chunks_written += batch.len(),
                Err(err) => {
                    warn!(collection, batch = batch.len(), error = %err, "Batch upsert failed, retrying records individually");

                    for record in batch {
                        match self.store.upsert(collection, std::slice::from_ref(record)).await {
                            Ok(()) => result.chunks_written += 1,
                            Err(err) => {
                                let chunk_index = record.chunk_index();
                                if let Some(index) = chunk_index {
                                    result.failed_chunks.push(index);
                                }
                                result.errors.push(IngestError::Store {
                                    chunk_index,
                                    message: err.to_string(),
                                });
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Result for a path that never became a document.
fn failed_before_load(path: &Path, error: IngestError, started: Instant) -> IngestResult {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let mut result = IngestResult::new(name, None, path.display().to_string());
    result.errors.push(error);
    result.duration_ms = started.elapsed().as_millis() as u64;
    result
}
