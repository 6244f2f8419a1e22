use extract::{LlmProvider, NOT_FOUND, ProviderError};
use index::{Embedder, MetadataFilter, ScoredRecord, StoreError, StoredRecord, VectorStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

use crate::fit::{CandidateProfile, FitAnalysis, analyze_fit, fit_prompt};

/// Chunks placed in the answer prompt, at most.
const MAX_CONTEXT_CHUNKS: usize = 8;
/// Hits fetched per requested candidate when ranking resumes.
const HITS_PER_CANDIDATE: usize = 4;
/// Chunk-level keys left out of a resume's document metadata.
const CHUNK_KEYS: &[&str] = &["chunk_index", "chunk_type", "section_name", "chunk_preview"];

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("query text is empty")]
    EmptyQuery,

    #[error("failed to embed query: {0}")]
    Embedding(#[source] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to generate answer: {0}")]
    Generation(#[source] ProviderError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub chunk_id: String,
    pub document_id: String,
    pub document_name: String,
    pub candidate_name: Option<String>,
    pub section_name: Option<String>,
    pub text: String,
    pub relevance_score: f32,
    pub metadata: serde_json::Map<String, Value>,
}

impl From<ScoredRecord> for Source {
    fn from(record: ScoredRecord) -> Self {
        let text_of = |key: &str| {
            record
                .meta_str(key)
                .filter(|v| *v != NOT_FOUND && !v.is_empty())
                .map(str::to_string)
        };

        Self {
            document_id: text_of("document_id").unwrap_or_default(),
            document_name: text_of("document_name").unwrap_or_default(),
            candidate_name: text_of("candidate_name"),
            section_name: text_of("section_name"),
            chunk_id: record.id,
            text: record.text,
            relevance_score: record.score,
            metadata: record.metadata,
        }
    }
}

/// One resume and how well it matched a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub document_id: String,
    pub document_name: String,
    pub candidate_name: Option<String>,
    pub best_score: f32,
    pub matching_chunks: usize,
    pub key_skills: Vec<String>,
    pub experience_years: Option<u64>,
    pub certifications: Vec<String>,
    pub job_titles: Vec<String>,
    pub fit: FitAnalysis,
    pub best_chunk: Source,
}

/// All stored chunks of one resume, in document order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeDetail {
    pub document_id: String,
    pub document_name: String,
    pub file_format: Option<String>,
    pub source_path: Option<String>,
    pub candidate_name: Option<String>,
    pub chunk_count: usize,
    /// Document-level metadata shared by every chunk.
    pub metadata: serde_json::Map<String, Value>,
    pub chunks: Vec<ResumeChunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeChunk {
    pub chunk_id: String,
    pub chunk_index: Option<usize>,
    pub section_name: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<Source>,
    pub query_time_ms: u64,
}

pub struct QueryEngine {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LlmProvider>,
}

impl QueryEngine {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, llm: Arc<dyn LlmProvider>) -> Self {
        Self { embedder, store, llm }
    }

    /// Top-`k` chunks by similarity to `query`, optionally restricted to
    /// records whose metadata matches `filter`.
    pub async fn search(
        &self,
        collection: &str,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Source>, QueryError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        // Step 1: Embed the query
        let vector = self.embedder.embed(query).await.map_err(QueryError::Embedding)?;

        // Step 2: Similarity search
        let hits = self.store.query(collection, &vector, k, filter).await?;
        debug!(collection, k, hits = hits.len(), "Similarity search");

        Ok(hits.into_iter().map(Source::from).collect())
    }

    /// Best-matching resumes. Chunk hits are grouped by document, then the
    /// model rates each resume's fit; ranking is by that rating with the best
    /// chunk similarity breaking ties.
    pub async fn rank_candidates(
        &self,
        collection: &str,
        query: &str,
        top_n: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<CandidateMatch>, QueryError> {
        let k = top_n.max(1) * HITS_PER_CANDIDATE;
        let sources = self.search(collection, query, k, filter).await?;

        // Hits arrive best first, so each group's first source is its best
        let mut groups: Vec<Vec<Source>> = Vec::new();
        let mut position: HashMap<String, usize> = HashMap::new();
        for source in sources {
            match position.get(&source.document_id) {
                Some(&i) => groups[i].push(source),
                None => {
                    position.insert(source.document_id.clone(), groups.len());
                    groups.push(vec![source]);
                }
            }
        }

        let mut candidates = Vec::with_capacity(groups.len());
        for group in groups {
            candidates.push(self.assess(query.trim(), group).await);
        }

        candidates.sort_by(|a, b| {
            b.fit
                .relevance_score
                .total_cmp(&a.fit.relevance_score)
                .then_with(|| b.best_score.total_cmp(&a.best_score))
                .then_with(|| a.document_name.cmp(&b.document_name))
        });
        candidates.truncate(top_n);
        info!(collection, candidates = candidates.len(), "Ranked candidates");
        Ok(candidates)
    }

    async fn assess(&self, query: &str, mut group: Vec<Source>) -> CandidateMatch {
        group.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        let best = group[0].clone();
        let metadata = &best.metadata;

        let key_skills = string_list(metadata.get("key_skills"));
        let certifications = string_list(metadata.get("certifications"));
        let job_titles = string_list(metadata.get("job_titles"));
        let experience_years = metadata.get("experience_years").and_then(Value::as_u64);
        let name = best.candidate_name.clone().unwrap_or_else(|| best.document_name.clone());

        let profile = CandidateProfile {
            name: &name,
            key_skills: &key_skills,
            experience_years,
            certifications: &certifications,
            job_titles: &job_titles,
        };
        let fit = analyze_fit(self.llm.as_ref(), &fit_prompt(query, &profile, &group)).await;
        debug!(document = %best.document_name, score = fit.relevance_score, method = ?fit.method, "Rated fit");

        CandidateMatch {
            document_id: best.document_id.clone(),
            document_name: best.document_name.clone(),
            candidate_name: best.candidate_name.clone(),
            best_score: best.relevance_score,
            matching_chunks: group.len(),
            key_skills,
            experience_years,
            certifications,
            job_titles,
            fit,
            best_chunk: best,
        }
    }

    /// Every chunk of one resume, or `None` when nothing is stored under
    /// `document_id`.
    pub async fn get_resume(&self, collection: &str, document_id: &str) -> Result<Option<ResumeDetail>, QueryError> {
        let records = self.store.get_document(collection, document_id).await?;
        debug!(collection, document_id, chunks = records.len(), "Loaded resume");
        Ok(resume_detail(document_id, records))
    }

    /// Answer `question` from the `k` most relevant chunks.
    pub async fn answer(
        &self,
        collection: &str,
        question: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<RagAnswer, QueryError> {
        let started = Instant::now();
        let sources = self.search(collection, question, k, filter).await?;

        let answer = if sources.is_empty() {
            "No relevant resumes were found for this question.".to_string()
        } else {
            let context = build_context(&sources);
            self.llm
                .complete(&answer_prompt(question.trim(), &context))
                .await
                .map_err(QueryError::Generation)?
        };

        let query_time_ms = started.elapsed().as_millis() as u64;
        info!(collection, sources = sources.len(), query_time_ms, "Answered question");

        Ok(RagAnswer {
            answer: answer.trim().to_string(),
            sources,
            query_time_ms,
        })
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn resume_detail(document_id: &str, records: Vec<StoredRecord>) -> Option<ResumeDetail> {
    let first = records.first()?;
    let text_of = |key: &str| {
        first
            .metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|v| *v != NOT_FOUND && !v.is_empty())
            .map(str::to_string)
    };

    let mut metadata = first.metadata.clone();
    for key in CHUNK_KEYS {
        metadata.remove(*key);
    }

    Some(ResumeDetail {
        document_id: document_id.to_string(),
        document_name: text_of("document_name").unwrap_or_else(|| document_id.to_string()),
        file_format: text_of("file_format"),
        source_path: text_of("source_path"),
        candidate_name: text_of("candidate_name"),
        chunk_count: records.len(),
        metadata,
        chunks: records
            .into_iter()
            .map(|record| ResumeChunk {
                chunk_index: record.chunk_index(),
                section_name: record
                    .metadata
                    .get("section_name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                chunk_id: record.id,
                text: record.text,
            })
            .collect(),
    })
}

/// Numbered context block; each chunk is tagged with its candidate and section.
pub fn build_context(sources: &[Source]) -> String {
    let mut context = String::new();

    for (i, source) in sources.iter().take(MAX_CONTEXT_CHUNKS).enumerate() {
        let candidate = source
            .candidate_name
            .as_deref()
            .unwrap_or(source.document_name.as_str());
        let section = source.section_name.as_deref().unwrap_or("Resume");

        context.push_str(&format!(
            "[{}] {} | {}\n{}\n\n",
            i + 1,
            candidate,
            section,
            source.text.trim()
        ));
    }

    context
}

fn answer_prompt(question: &str, context: &str) -> String {
    format!(
        r#"You are a recruiting assistant answering questions about candidates from their resumes.

RESUME EXCERPTS:
{}
QUESTION: {}

INSTRUCTIONS:
- Answer using only the resume excerpts above
- Name the candidates you refer to and cite excerpt numbers like [2]
- If the excerpts do not contain the answer, say so
- Keep the answer concise and factual

ANSWER:"#,
        context, question
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::{FitMethod, Recommendation};
    use async_trait::async_trait;
    use extract::{ExtractedMetadata, Field, ParsingMethod};
    use index::{HashEmbedder, InMemoryStore, IndexedRecord};
    use ingest::{Chunker, ChunkerConfig, Document};
    use std::path::Path;
    use std::sync::Mutex;

    const COLLECTION: &str = "resumes";

    /// Answers questions with a fixed sentence and fit prompts with the
    /// scripted reply for the named candidate.
    #[derive(Default)]
    struct EchoLlm {
        prompts: Mutex<Vec<String>>,
        fits: Vec<(&'static str, &'static str)>,
    }

    #[async_trait]
    impl LlmProvider for EchoLlm {
        fn model(&self) -> &str {
            "echo"
        }

        async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if prompt.starts_with("CANDIDATE FIT ANALYSIS") {
                return match self.fits.iter().find(|(name, _)| prompt.contains(&format!("Candidate: {}", name))) {
                    Some((_, reply)) => Ok(reply.to_string()),
                    None => Err(ProviderError::Timeout),
                };
            }
            Ok("  Jane Doe knows Rust [1].  ".to_string())
        }
    }

    fn metadata(name: &str, skills: &[&str], years: u32) -> ExtractedMetadata {
        let mut meta = ExtractedMetadata::failed("test");
        meta.candidate_name = Field::Found(name.to_string());
        meta.key_skills = Field::Found(skills.iter().map(|s| s.to_string()).collect());
        meta.experience_years = Field::Found(years);
        meta.parsing_method = ParsingMethod::LlmAssisted;
        meta
    }

    async fn seeded_engine() -> (QueryEngine, Arc<EchoLlm>) {
        seeded_engine_with(EchoLlm::default()).await
    }

    async fn seeded_engine_with(llm: EchoLlm) -> (QueryEngine, Arc<EchoLlm>) {
        let embedder = Arc::new(HashEmbedder::new(128));
        let store = Arc::new(InMemoryStore::new());
        store.create_collection(COLLECTION).await.unwrap();

        let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
        let resumes = [
            (
                "/r/jane.txt",
                "Summary\nBackend engineer.\n\nSkills\nRust, Tokio, Kubernetes\n",
                metadata("Jane Doe", &["Rust", "Kubernetes"], 7),
            ),
            (
                "/r/omar.txt",
                "Summary\nData engineer.\n\nSkills\nPython, Spark, Airflow\n",
                metadata("Omar Said", &["Python", "Spark"], 4),
            ),
        ];

        for (path, text, meta) in resumes {
            let document = Document::new(Path::new(path), None, text.to_string());
            let chunks = chunker.chunk_document(&document);
            let records: Vec<IndexedRecord> = chunks
                .iter()
                .map(|c| {
                    let vector = embedder.embed_sync(&c.text);
                    IndexedRecord::new(&document, c, &meta, chunks.len(), vector)
                })
                .collect();
            store.upsert(COLLECTION, &records).await.unwrap();
        }

        let llm = Arc::new(llm);
        (QueryEngine::new(embedder, store, llm.clone()), llm)
    }

    #[tokio::test]
    async fn test_search_ranks_relevant_chunk_first() {
        let (engine, _) = seeded_engine().await;
        let sources = engine.search(COLLECTION, "Rust, Tokio, Kubernetes", 2, None).await.unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].candidate_name.as_deref(), Some("Jane Doe"));
        assert_eq!(sources[0].section_name.as_deref(), Some("Skills"));
        assert!(sources[0].relevance_score >= sources[1].relevance_score);
    }

    #[tokio::test]
    async fn test_search_with_filter() {
        let (engine, _) = seeded_engine().await;
        let filter = MetadataFilter::new().with("key_skills", "Spark");
        let sources = engine.search(COLLECTION, "engineer", 10, Some(&filter)).await.unwrap();

        assert_eq!(sources.len(), 2);
        assert!(sources.iter().all(|s| s.document_name == "omar.txt"));
    }

    #[tokio::test]
    async fn test_rank_candidates_groups_by_resume() {
        let (engine, _) = seeded_engine().await;
        let candidates = engine
            .rank_candidates(COLLECTION, "Python Spark Airflow", 5, None)
            .await
            .unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].candidate_name.as_deref(), Some("Omar Said"));
        assert_eq!(candidates[0].matching_chunks, 2);
        assert_eq!(candidates[0].experience_years, Some(4));
        assert_eq!(candidates[0].key_skills, vec!["Python", "Spark"]);

        let top = engine.rank_candidates(COLLECTION, "Python", 1, None).await.unwrap();
        assert_eq!(top.len(), 1);
    }

    #[tokio::test]
    async fn test_rank_candidates_orders_by_fit() {
        let llm = EchoLlm {
            fits: vec![
                (
                    "Jane Doe",
                    r#"Sure. {"relevance_score": 9, "fit_summary": "Seven years of backend work.",
                       "key_strengths": ["Rust", "Kubernetes"], "potential_concerns": ["No Spark"],
                       "recommendation": "Strong Match"}"#,
                ),
                ("Omar Said", r#"{"relevance_score": 4, "recommendation": "Moderate Match"}"#),
            ],
            ..Default::default()
        };
        let (engine, llm) = seeded_engine_with(llm).await;

        // Omar has the closer chunks, the model prefers Jane
        let candidates = engine
            .rank_candidates(COLLECTION, "Python Spark Airflow", 5, None)
            .await
            .unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].candidate_name.as_deref(), Some("Jane Doe"));
        assert!(candidates[0].best_score < candidates[1].best_score);
        assert_eq!(candidates[0].fit.relevance_score, 9.0);
        assert_eq!(candidates[0].fit.recommendation, Recommendation::Strong);
        assert_eq!(candidates[0].fit.key_strengths, vec!["Rust", "Kubernetes"]);
        assert_eq!(candidates[0].fit.method, FitMethod::Llm);
        assert_eq!(candidates[1].fit.recommendation, Recommendation::Moderate);

        let prompts = llm.prompts.lock().unwrap();
        let omar = prompts.iter().find(|p| p.contains("Candidate: Omar Said")).unwrap();
        assert!(omar.contains("Python Spark Airflow"));
        assert!(omar.contains("Skills: Python, Spark"));
        assert!(omar.contains("Experience: 4 years"));
    }

    #[tokio::test]
    async fn test_rank_candidates_falls_back_on_bad_analysis() {
        let llm = EchoLlm {
            fits: vec![("Jane Doe", "Jane looks strong to me.")],
            ..Default::default()
        };
        let (engine, _) = seeded_engine_with(llm).await;

        let candidates = engine
            .rank_candidates(COLLECTION, "Rust Kubernetes", 5, None)
            .await
            .unwrap();

        // Unparseable answer scores 5, a failed call scores 3
        assert_eq!(candidates[0].candidate_name.as_deref(), Some("Jane Doe"));
        assert_eq!(candidates[0].fit.relevance_score, 5.0);
        assert_eq!(candidates[0].fit.method, FitMethod::Unparsed);
        assert_eq!(candidates[0].fit.potential_concerns, vec!["Analysis incomplete"]);
        assert_eq!(candidates[1].fit.relevance_score, 3.0);
        assert_eq!(candidates[1].fit.method, FitMethod::Failed);
        assert!(candidates[1].fit.fit_summary.starts_with("Could not analyze fit"));
    }

    #[tokio::test]
    async fn test_get_resume_returns_chunks_in_order() {
        let (engine, llm) = seeded_engine().await;
        let jane = Document::new(Path::new("/r/jane.txt"), None, String::new()).document_id;

        let resume = engine.get_resume(COLLECTION, &jane).await.unwrap().unwrap();
        assert_eq!(resume.document_name, "jane.txt");
        assert_eq!(resume.candidate_name.as_deref(), Some("Jane Doe"));
        assert_eq!(resume.chunk_count, 2);
        assert_eq!(resume.chunks[0].chunk_index, Some(0));
        assert_eq!(resume.chunks[0].section_name.as_deref(), Some("Summary"));
        assert!(resume.chunks[1].text.contains("Rust, Tokio, Kubernetes"));
        assert!(!resume.metadata.contains_key("chunk_index"));
        assert_eq!(resume.metadata["experience_years"], 7);

        assert!(engine.get_resume(COLLECTION, "missing").await.unwrap().is_none());
        assert!(matches!(
            engine.get_resume("ghost", &jane).await,
            Err(QueryError::Store(StoreError::CollectionNotFound(_)))
        ));
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_answer_uses_numbered_context() {
        let (engine, llm) = seeded_engine().await;
        let answer = engine
            .answer(COLLECTION, "Who knows Rust?", 3, None)
            .await
            .unwrap();

        assert_eq!(answer.answer, "Jane Doe knows Rust [1].");
        assert_eq!(answer.sources.len(), 3);

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("[1] "));
        assert!(prompts[0].contains("QUESTION: Who knows Rust?"));
    }

    #[tokio::test]
    async fn test_answer_without_hits_skips_llm() {
        let (engine, llm) = seeded_engine().await;
        let filter = MetadataFilter::new().with("candidate_name", "Nobody");
        let answer = engine.answer(COLLECTION, "Who?", 3, Some(&filter)).await.unwrap();

        assert!(answer.sources.is_empty());
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_and_missing_collection() {
        let (engine, _) = seeded_engine().await;
        assert!(matches!(
            engine.search(COLLECTION, "   ", 3, None).await,
            Err(QueryError::EmptyQuery)
        ));
        assert!(matches!(
            engine.search("ghost", "rust", 3, None).await,
            Err(QueryError::Store(StoreError::CollectionNotFound(_)))
        ));
    }
}
