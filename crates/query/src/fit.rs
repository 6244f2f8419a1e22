//! LLM assessment of how well one resume fits a query.

use extract::schema::parse_response;
use extract::{LlmProvider, SkillNormalizer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::search::Source;

/// Resume text sent with each fit prompt.
pub const MAX_FIT_CONTENT_CHARS: usize = 1500;
/// Matching chunks quoted per candidate.
pub const MAX_FIT_CHUNKS: usize = 3;
const MAX_STRENGTHS: usize = 5;
const MAX_CONCERNS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "Strong Match")]
    Strong,
    #[serde(rename = "Good Match")]
    Good,
    #[serde(rename = "Moderate Match")]
    Moderate,
    #[serde(rename = "Weak Match")]
    Weak,
}

impl Recommendation {
    /// Label as written by the model, e.g. "Strong Match" or "weak".
    fn parse(label: &str) -> Option<Self> {
        let label = label.to_lowercase();
        [
            ("strong", Self::Strong),
            ("good", Self::Good),
            ("moderate", Self::Moderate),
            ("weak", Self::Weak),
        ]
        .into_iter()
        .find(|(word, _)| label.contains(word))
        .map(|(_, rec)| rec)
    }

    fn from_score(score: f32) -> Self {
        match score {
            s if s >= 8.0 => Self::Strong,
            s if s >= 6.0 => Self::Good,
            s if s >= 4.0 => Self::Moderate,
            _ => Self::Weak,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strong => "Strong Match",
            Self::Good => "Good Match",
            Self::Moderate => "Moderate Match",
            Self::Weak => "Weak Match",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMethod {
    /// Parsed from the model's JSON
    Llm,
    /// Model answered but the answer had no usable score
    Unparsed,
    /// Model call failed
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitAnalysis {
    /// 1 to 10.
    pub relevance_score: f32,
    pub fit_summary: String,
    pub key_strengths: Vec<String>,
    pub potential_concerns: Vec<String>,
    pub recommendation: Recommendation,
    pub method: FitMethod,
}

impl FitAnalysis {
    fn unparsed() -> Self {
        Self {
            relevance_score: 5.0,
            fit_summary: "Analysis could not be completed, but the resume contains relevant information.".into(),
            key_strengths: vec!["Contains relevant content".into()],
            potential_concerns: vec!["Analysis incomplete".into()],
            recommendation: Recommendation::Moderate,
            method: FitMethod::Unparsed,
        }
    }

    fn failed(reason: &str) -> Self {
        Self {
            relevance_score: 3.0,
            fit_summary: format!("Could not analyze fit: {}", reason),
            key_strengths: vec!["Resume found in search results".into()],
            potential_concerns: vec!["Analysis incomplete".into()],
            recommendation: Recommendation::Moderate,
            method: FitMethod::Failed,
        }
    }

    /// Read the model's answer. `None` when it has no numeric score.
    pub fn from_response(response: &str) -> Option<Self> {
        let object = parse_response(response).ok()?;
        let relevance_score = score_field(object.get("relevance_score"))?.clamp(1.0, 10.0);

        let normalizer = SkillNormalizer::new();
        let recommendation = object
            .get("recommendation")
            .and_then(Value::as_str)
            .and_then(Recommendation::parse)
            .unwrap_or_else(|| Recommendation::from_score(relevance_score));

        Some(Self {
            relevance_score,
            fit_summary: object
                .get("fit_summary")
                .and_then(Value::as_str)
                .map(|s| normalizer.clean(s))
                .unwrap_or_default(),
            key_strengths: list_field(&object, "key_strengths", &normalizer, MAX_STRENGTHS),
            potential_concerns: list_field(&object, "potential_concerns", &normalizer, MAX_CONCERNS),
            recommendation,
            method: FitMethod::Llm,
        })
    }
}

fn score_field(value: Option<&Value>) -> Option<f32> {
    match value? {
        Value::Number(n) => n.as_f64().map(|n| n as f32),
        Value::String(s) => s
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .find(|part| !part.is_empty())
            .and_then(|part| part.parse().ok()),
        _ => None,
    }
}

fn list_field(object: &Map<String, Value>, key: &str, normalizer: &SkillNormalizer, max: usize) -> Vec<String> {
    match object.get(key) {
        Some(Value::Array(items)) => normalizer.normalize_list(items.iter().filter_map(Value::as_str), max),
        Some(Value::String(s)) => normalizer.normalize_list(s.split([',', ';']), max),
        _ => Vec::new(),
    }
}

/// What the prompt says about the candidate besides the quoted text.
pub struct CandidateProfile<'a> {
    pub name: &'a str,
    pub key_skills: &'a [String],
    pub experience_years: Option<u64>,
    pub certifications: &'a [String],
    pub job_titles: &'a [String],
}

pub fn fit_prompt(query: &str, profile: &CandidateProfile<'_>, chunks: &[Source]) -> String {
    let listed = |items: &[String], empty: &str| {
        if items.is_empty() {
            empty.to_string()
        } else {
            items.join(", ")
        }
    };
    let content: String = chunks
        .iter()
        .take(MAX_FIT_CHUNKS)
        .map(|s| s.text.trim())
        .collect::<Vec<_>>()
        .join("\n")
        .chars()
        .take(MAX_FIT_CONTENT_CHARS)
        .collect();
    let experience = profile
        .experience_years
        .map(|y| format!("{} years", y))
        .unwrap_or_else(|| "Not specified".to_string());

    format!(
        r#"CANDIDATE FIT ANALYSIS
Rate how well this candidate's qualifications fit the requirements: {query}

Candidate: {name}
Skills: {skills}
Experience: {experience}
Certifications: {certifications}
Recent roles: {roles}

RESUME CONTENT:
{content}

Return only a JSON object in this format:
{{
  "relevance_score": <number 1-10>,
  "fit_summary": "<2-3 sentences on the candidate's relevant qualifications and experience>",
  "key_strengths": ["<strength>", "<strength>", "<strength>"],
  "potential_concerns": ["<concern>"],
  "recommendation": "<Strong Match|Good Match|Moderate Match|Weak Match>"
}}

Describe only what the candidate offers, not what is being looked for.

Score guidelines:
- 9-10: exceptional qualifications and experience
- 7-8: strong qualifications and experience
- 5-6: good qualifications with some gaps
- 3-4: moderate qualifications, significant gaps
- 1-2: limited relevant qualifications"#,
        query = query,
        name = profile.name,
        skills = listed(profile.key_skills, "Not specified"),
        experience = experience,
        certifications = listed(profile.certifications, "None listed"),
        roles = listed(profile.job_titles, "Not specified"),
        content = content,
    )
}

/// Ask the model for a fit analysis. Never fails: unusable answers and
/// provider errors fall back to neutral scores.
pub async fn analyze_fit(llm: &dyn LlmProvider, prompt: &str) -> FitAnalysis {
    match llm.complete(prompt).await {
        Ok(response) => FitAnalysis::from_response(&response).unwrap_or_else(|| {
            warn!(model = llm.model(), "Fit analysis unparseable, using neutral score");
            FitAnalysis::unparsed()
        }),
        Err(err) => {
            warn!(model = llm.model(), error = %err, "Fit analysis failed");
            FitAnalysis::failed(&err.to_string())
        }
    }
}
