use extract::ExtractedMetadata;
use ingest::{Chunk, Document};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

const PREVIEW_CHARS: usize = 100;

/// The unit stored in the vector database: one per chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: Map<String, Value>,
}

impl IndexedRecord {
    pub fn new(
        document: &Document,
        chunk: &Chunk,
        extracted: &ExtractedMetadata,
        total_chunks: usize,
        vector: Vec<f32>,
    ) -> Self {
        Self {
            id: chunk.chunk_id.clone(),
            document_id: document.document_id.clone(),
            text: chunk.text.clone(),
            vector,
            metadata: build_metadata(document, chunk, extracted, total_chunks),
        }
    }

    pub fn chunk_index(&self) -> Option<usize> {
        self.metadata
            .get("chunk_index")
            .and_then(Value::as_u64)
            .map(|i| i as usize)
    }
}

/// Denormalised metadata: document identity, chunk position and the
/// document's extraction result copied onto every chunk.
pub fn build_metadata(
    document: &Document,
    chunk: &Chunk,
    extracted: &ExtractedMetadata,
    total_chunks: usize,
) -> Map<String, Value> {
    let mut metadata = Map::new();

    // Document identity
    metadata.insert("document_id".into(), json!(document.document_id));
    metadata.insert("document_name".into(), json!(document.display_name));
    metadata.insert("source_path".into(), json!(document.source()));
    metadata.insert("file_format".into(), json!(document.file_format));
    metadata.insert("source".into(), json!(format!("{} resume", document.file_format)));
    metadata.insert("content_type".into(), json!("resume"));

    // Chunk position
    metadata.insert("chunk_index".into(), json!(chunk.chunk_index));
    metadata.insert("total_chunks".into(), json!(total_chunks));
    metadata.insert("chunk_type".into(), json!(chunk.chunk_type.as_str()));
    metadata.insert("section_name".into(), json!(chunk.section_name));
    metadata.insert("chunk_preview".into(), json!(chunk.preview(PREVIEW_CHARS)));

    // Provenance
    metadata.insert("parsing_method".into(), json!(extracted.parsing_method.as_str()));
    metadata.insert("extraction_model".into(), json!(extracted.extraction_model));
    metadata.insert("ingested_at".into(), json!(chrono::Utc::now().to_rfc3339()));

    // Extracted fields
    metadata.insert("candidate_name".into(), extracted.candidate_name.to_metadata_value());
    metadata.insert("contact_info".into(), extracted.contact_info.to_metadata_value());
    metadata.insert("key_skills".into(), extracted.key_skills.to_metadata_value());
    metadata.insert(
        "skills_count".into(),
        json!(extracted.key_skills.value().map_or(0, Vec::len)),
    );
    metadata.insert("experience_years".into(), extracted.experience_years.to_metadata_value());
    metadata.insert("education".into(), extracted.education.to_metadata_value());
    metadata.insert("certifications".into(), extracted.certifications.to_metadata_value());
    metadata.insert(
        "certifications_count".into(),
        json!(extracted.certifications.value().map_or(0, Vec::len)),
    );
    metadata.insert("job_titles".into(), extracted.job_titles.to_metadata_value());
    metadata.insert("industries".into(), extracted.industries.to_metadata_value());

    metadata
}
