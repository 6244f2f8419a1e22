use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static EDGE_PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s.,;:!?'\-•*]+|[\s.,;:!?'\-•*]+$").expect("valid regex"));

/// Values models commonly emit instead of leaving a field empty.
const PLACEHOLDERS: &[&str] = &["n/a", "na", "none", "null", "unknown", "not found", "not specified", "-"];

/// Cleans list-valued fields (skills, certifications, titles) returned by the model.
#[derive(Debug, Default, Clone)]
pub struct SkillNormalizer;

impl SkillNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Collapse whitespace and strip bullets and punctuation from both ends.
    pub fn clean(&self, value: &str) -> String {
        let collapsed = WHITESPACE.replace_all(value, " ");
        EDGE_PUNCTUATION.replace_all(&collapsed, "").to_string()
    }

    pub fn is_placeholder(&self, value: &str) -> bool {
        let lowered = value.trim().to_lowercase();
        lowered.is_empty() || PLACEHOLDERS.contains(&lowered.as_str())
    }

    /// Clean, drop placeholders, de-duplicate case-insensitively (first spelling
    /// wins) and keep at most `max` entries.
    pub fn normalize_list<I, S>(&self, items: I, max: usize) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        items
            .into_iter()
            .map(|item| self.clean(item.as_ref()))
            .filter(|item| !self.is_placeholder(item))
            .filter(|item| seen.insert(item.to_lowercase()))
            .take(max)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean() {
        let normalizer = SkillNormalizer::new();

        assert_eq!(normalizer.clean("  Rust  "), "Rust");
        assert_eq!(normalizer.clean("• Machine   Learning."), "Machine Learning");
        assert_eq!(normalizer.clean("C++"), "C++");
        assert_eq!(normalizer.clean("Node.js,"), "Node.js");
    }

    #[test]
    fn test_dedup_keeps_first_spelling() {
        let normalizer = SkillNormalizer::new();
        let skills = normalizer.normalize_list(["Python", "python ", "PYTHON", "Java", "JavaScript"], 10);

        // Java and JavaScript are different skills
        assert_eq!(skills, vec!["Python", "Java", "JavaScript"]);
    }

    #[test]
    fn test_placeholders_and_limit() {
        let normalizer = SkillNormalizer::new();
        let items = ["N/A", "", "Go", "Rust", "SQL"];

        assert_eq!(normalizer.normalize_list(items, 2), vec!["Go", "Rust"]);
        assert!(normalizer.is_placeholder("Unknown"));
    }
}
