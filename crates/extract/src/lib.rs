pub mod llm;
pub mod normalizer;
pub mod prompt;
pub mod schema;

pub use llm::{LlmProvider, OllamaClient, ProviderError};
pub use normalizer::SkillNormalizer;
pub use schema::{ExtractedMetadata, Field, NOT_FOUND, ParsingMethod, SchemaError};

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone)]
pub enum ExtractionError {
    #[error("model call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("could not parse model output: {0}")]
    Parse(#[from] SchemaError),
}

/// Outcome of one extraction. `metadata` is always usable; `error` is set when
/// the extractor degraded to the all-`NotFound` record.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub metadata: ExtractedMetadata,
    pub error: Option<ExtractionError>,
}

impl Extraction {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

pub struct MetadataExtractor {
    llm: Arc<dyn LlmProvider>,
    normalizer: SkillNormalizer,
}

impl MetadataExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            normalizer: SkillNormalizer::new(),
        }
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Extract the resume schema from a whole document. Never fails: provider
    /// errors and unparseable output degrade to `ExtractedMetadata::failed`.
    pub async fn extract(&self, raw_text: &str) -> Extraction {
        let prompt = prompt::build_extraction_prompt(raw_text);

        let result = match self.attempt(&prompt, ParsingMethod::LlmAssisted).await {
            Err(ExtractionError::Parse(reason)) => {
                // Only parse failures get a second chance
                warn!(model = self.model(), error = %reason, "Extraction output unparseable, retrying with simplified prompt");
                let retry_prompt = prompt::build_simplified_prompt(raw_text);
                self.attempt(&retry_prompt, ParsingMethod::LlmSimplified).await
            }
            other => other,
        };

        match result {
            Ok(metadata) => {
                debug!(
                    model = self.model(),
                    method = metadata.parsing_method.as_str(),
                    fields_found = metadata.found_count(),
                    "Metadata extracted"
                );
                Extraction {
                    metadata,
                    error: None,
                }
            }
            Err(error) => {
                warn!(model = self.model(), error = %error, "Metadata extraction failed");
                Extraction {
                    metadata: ExtractedMetadata::failed(self.model()),
                    error: Some(error),
                }
            }
        }
    }

    async fn attempt(
        &self,
        prompt: &str,
        method: ParsingMethod,
    ) -> Result<ExtractedMetadata, ExtractionError> {
        let response = self.llm.complete(prompt).await?;
        let object = schema::parse_response(&response)?;

        Ok(ExtractedMetadata::from_json(
            &object,
            &self.normalizer,
            method,
            self.model(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records the prompts it received.
    struct ScriptedLlm {
        responses: Mutex<VecDeque<Result<String, ProviderError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<Result<String, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Transport("script exhausted".into())))
        }
    }

    const RESUME: &str = "Jane Doe\nSkills: Rust, Kafka\n7 years of backend work";

    #[tokio::test]
    async fn test_successful_extraction() {
        let llm = ScriptedLlm::new(vec![Ok(
            r#"{"candidate_name": "Jane Doe", "key_skills": ["Rust", "Kafka"], "experience_years": 7}"#.into(),
        )]);
        let extractor = MetadataExtractor::new(llm.clone());

        let extraction = extractor.extract(RESUME).await;

        assert!(!extraction.is_failed());
        assert_eq!(extraction.metadata.candidate_name, Field::Found("Jane Doe".into()));
        assert_eq!(extraction.metadata.parsing_method, ParsingMethod::LlmAssisted);
        assert_eq!(extraction.metadata.extraction_model, "scripted");
        assert_eq!(extraction.metadata.education, Field::NotFound);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_parse_error_retries_once_with_simplified_prompt() {
        let llm = ScriptedLlm::new(vec![
            Ok("I think the candidate is Jane.".into()),
            Ok(r#"{"candidate_name": "Jane Doe"}"#.into()),
        ]);
        let extractor = MetadataExtractor::new(llm.clone());

        let extraction = extractor.extract(RESUME).await;

        assert!(!extraction.is_failed());
        assert_eq!(extraction.metadata.parsing_method, ParsingMethod::LlmSimplified);
        assert_eq!(llm.calls(), 2);
        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[1].len() < prompts[0].len());
    }

    #[tokio::test]
    async fn test_two_parse_errors_degrade_to_failed() {
        let llm = ScriptedLlm::new(vec![Ok("nope".into()), Ok("[\"still nope\"]".into())]);
        let extractor = MetadataExtractor::new(llm.clone());

        let extraction = extractor.extract(RESUME).await;

        assert!(matches!(extraction.error, Some(ExtractionError::Parse(_))));
        assert_eq!(extraction.metadata, ExtractedMetadata::failed("scripted"));
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_transport_error_is_not_retried() {
        let llm = ScriptedLlm::new(vec![
            Err(ProviderError::Transport("connection refused".into())),
            Ok(r#"{"candidate_name": "Jane Doe"}"#.into()),
        ]);
        let extractor = MetadataExtractor::new(llm.clone());

        let extraction = extractor.extract(RESUME).await;

        assert!(matches!(
            extraction.error,
            Some(ExtractionError::Provider(ProviderError::Transport(_)))
        ));
        assert_eq!(extraction.metadata.parsing_method, ParsingMethod::Failed);
        assert_eq!(extraction.metadata.found_count(), 0);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_provider_error_on_retry_is_reported() {
        let llm = ScriptedLlm::new(vec![Ok("garbage".into()), Err(ProviderError::RateLimited)]);
        let extractor = MetadataExtractor::new(llm.clone());

        let extraction = extractor.extract(RESUME).await;

        assert!(matches!(
            extraction.error,
            Some(ExtractionError::Provider(ProviderError::RateLimited))
        ));
        assert_eq!(extraction.metadata.parsing_method, ParsingMethod::Failed);
    }
}
