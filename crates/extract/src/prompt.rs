/// Characters of resume text sent with the full extraction prompt.
pub const MAX_PROMPT_CHARS: usize = 4000;
/// Characters sent with the simplified retry prompt.
pub const MAX_RETRY_PROMPT_CHARS: usize = 1500;

pub const MAX_SKILLS: usize = 10;
pub const MAX_CERTIFICATIONS: usize = 5;
pub const MAX_JOB_TITLES: usize = 3;
pub const MAX_INDUSTRIES: usize = 3;

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn build_extraction_prompt(resume_text: &str) -> String {
    format!(
        r#"Analyze the following resume content and extract key information.

INSTRUCTIONS:
1. Read the whole resume before answering
2. Output ONLY valid JSON, nothing else
3. Use the exact schema below
4. Use null for any field the resume does not mention

SCHEMA:
{{
  "candidate_name": "Full name of the candidate",
  "contact_info": "Email, phone and location as a single string",
  "key_skills": ["main technical and professional skills, max {skills}"],
  "experience_years": 0,
  "education": "Highest degree and field as a single string",
  "certifications": ["certifications mentioned, max {certs}"],
  "job_titles": ["most recent job titles, max {titles}"],
  "industries": ["industries or domains, max {industries}"]
}}

RULES:
- experience_years is the estimated total years of professional experience, as a number
- Do not invent values that are not supported by the text
- Output ONLY the JSON object, no markdown, no explanations

RESUME CONTENT:
{content}

JSON OUTPUT:"#,
        skills = MAX_SKILLS,
        certs = MAX_CERTIFICATIONS,
        titles = MAX_JOB_TITLES,
        industries = MAX_INDUSTRIES,
        content = truncate_chars(resume_text, MAX_PROMPT_CHARS)
    )
}

/// Shorter prompt used once after the model returned output that could not be parsed.
pub fn build_simplified_prompt(resume_text: &str) -> String {
    format!(
        r#"Return a single JSON object with these keys: candidate_name, contact_info, key_skills, experience_years, education, certifications, job_titles, industries.
Use null when unknown. No markdown, no code blocks, no explanations. Just the raw JSON object.

RESUME:
{}"#,
        truncate_chars(resume_text, MAX_RETRY_PROMPT_CHARS)
    )
}
