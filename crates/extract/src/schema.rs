use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;
use thiserror::Error;

use crate::normalizer::SkillNormalizer;
use crate::prompt::{MAX_CERTIFICATIONS, MAX_INDUSTRIES, MAX_JOB_TITLES, MAX_SKILLS};

/// Marker stored in place of a field the extractor did not find.
pub const NOT_FOUND: &str = "not_found";

static JSON_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));
static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid regex"));

/// A schema field: either a validated value or an explicit "not found".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Field<T> {
    Found(T),
    NotFound,
}

impl<T> Field<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Found(v) => Some(v),
            Field::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Field::Found(_))
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Field::NotFound, Field::Found)
    }
}

impl<T: Serialize> Field<T> {
    /// Value written into vector store metadata.
    pub fn to_metadata_value(&self) -> Value {
        match self {
            Field::Found(v) => serde_json::to_value(v).unwrap_or(Value::Null),
            Field::NotFound => Value::String(NOT_FOUND.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsingMethod {
    /// Full prompt parsed on the first attempt
    LlmAssisted,
    /// Parsed after the simplified retry prompt
    LlmSimplified,
    /// Extractor ran and produced nothing usable
    Failed,
    /// Extractor was not invoked (LLM parsing disabled)
    Basic,
}

impl ParsingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParsingMethod::LlmAssisted => "llm_assisted",
            ParsingMethod::LlmSimplified => "llm_simplified",
            ParsingMethod::Failed => "failed",
            ParsingMethod::Basic => "basic",
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum SchemaError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub candidate_name: Field<String>,
    pub key_skills: Field<Vec<String>>,
    pub experience_years: Field<u32>,
    pub certifications: Field<Vec<String>>,
    pub education: Field<String>,
    pub contact_info: Field<String>,
    pub job_titles: Field<Vec<String>>,
    pub industries: Field<Vec<String>>,
    pub parsing_method: ParsingMethod,
    pub extraction_model: String,
}

impl ExtractedMetadata {
    fn empty(parsing_method: ParsingMethod, extraction_model: String) -> Self {
        Self {
            candidate_name: Field::NotFound,
            key_skills: Field::NotFound,
            experience_years: Field::NotFound,
            certifications: Field::NotFound,
            education: Field::NotFound,
            contact_info: Field::NotFound,
            job_titles: Field::NotFound,
            industries: Field::NotFound,
            parsing_method,
            extraction_model,
        }
    }

    /// Metadata for documents ingested with LLM parsing disabled.
    pub fn not_extracted() -> Self {
        Self::empty(ParsingMethod::Basic, "none".to_string())
    }

    /// Metadata for documents where the extractor ran and failed.
    pub fn failed(extraction_model: &str) -> Self {
        Self::empty(ParsingMethod::Failed, extraction_model.to_string())
    }

    /// Validate a parsed model response against the schema. Mistyped or empty
    /// fields become `NotFound`; they do not fail the whole record.
    pub fn from_json(
        object: &Map<String, Value>,
        normalizer: &SkillNormalizer,
        parsing_method: ParsingMethod,
        extraction_model: &str,
    ) -> Self {
        let text = |key: &str| text_field(object.get(key), normalizer);
        let list = |key: &str, max: usize| list_field(object.get(key), normalizer, max);

        Self {
            candidate_name: text("candidate_name"),
            key_skills: list("key_skills", MAX_SKILLS),
            experience_years: years_field(object.get("experience_years")),
            certifications: list("certifications", MAX_CERTIFICATIONS),
            education: text("education"),
            contact_info: text("contact_info"),
            job_titles: list("job_titles", MAX_JOB_TITLES),
            industries: list("industries", MAX_INDUSTRIES),
            parsing_method,
            extraction_model: extraction_model.to_string(),
        }
    }

    pub fn found_count(&self) -> usize {
        [
            self.candidate_name.is_found(),
            self.key_skills.is_found(),
            self.experience_years.is_found(),
            self.certifications.is_found(),
            self.education.is_found(),
            self.contact_info.is_found(),
            self.job_titles.is_found(),
            self.industries.is_found(),
        ]
        .iter()
        .filter(|found| **found)
        .count()
    }
}

/// Parse a model response into a JSON object, tolerating prose or code
/// fences around the object.
pub fn parse_response(response: &str) -> Result<Map<String, Value>, SchemaError> {
    let value = match serde_json::from_str::<Value>(response.trim()) {
        Ok(value) => value,
        Err(direct_err) => {
            let candidate = JSON_OBJECT
                .find(response)
                .ok_or_else(|| SchemaError::InvalidJson(direct_err.to_string()))?;
            serde_json::from_str::<Value>(candidate.as_str())
                .map_err(|e| SchemaError::InvalidJson(e.to_string()))?
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        Value::Array(_) => Err(SchemaError::NotAnObject("array")),
        Value::String(_) => Err(SchemaError::NotAnObject("string")),
        Value::Number(_) => Err(SchemaError::NotAnObject("number")),
        Value::Bool(_) => Err(SchemaError::NotAnObject("boolean")),
        Value::Null => Err(SchemaError::NotAnObject("null")),
    }
}

fn text_field(value: Option<&Value>, normalizer: &SkillNormalizer) -> Field<String> {
    let raw = match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join("; "),
        _ => return Field::NotFound,
    };

    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalizer.is_placeholder(&cleaned) {
        Field::NotFound
    } else {
        Field::Found(cleaned)
    }
}

fn list_field(value: Option<&Value>, normalizer: &SkillNormalizer, max: usize) -> Field<Vec<String>> {
    let items: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => s.split([',', ';']).map(str::to_string).collect(),
        _ => return Field::NotFound,
    };

    let normalized = normalizer.normalize_list(items, max);
    if normalized.is_empty() {
        Field::NotFound
    } else {
        Field::Found(normalized)
    }
}

fn years_field(value: Option<&Value>) -> Field<u32> {
    let years = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => LEADING_NUMBER.find(s).and_then(|m| m.as_str().parse::<f64>().ok()),
        _ => None,
    };

    match years {
        Some(y) if y.is_finite() && y >= 0.0 && y < 100.0 => Field::Found(y.trunc() as u32),
        _ => Field::NotFound,
    }
}
