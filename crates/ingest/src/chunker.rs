use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, ChunkType};
use crate::document::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkStrategy {
    FixedWindow,
    SectionAware,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    pub strategy: ChunkStrategy,
    /// Window length in characters
    pub window_chars: usize,
    /// Characters shared by consecutive windows
    pub overlap_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::SectionAware,
            window_chars: 500,
            overlap_chars: 100,
        }
    }
}

impl ChunkerConfig {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.window_chars > 0, "window_chars must be greater than 0");
        anyhow::ensure!(
            self.overlap_chars < self.window_chars,
            "overlap_chars ({}) must be smaller than window_chars ({})",
            self.overlap_chars,
            self.window_chars
        );
        Ok(())
    }
}

/// (alias, canonical section name). Aliases are matched after normalization.
const SECTION_ALIASES: &[(&str, &str)] = &[
    ("summary", "Summary"),
    ("professional summary", "Summary"),
    ("career summary", "Summary"),
    ("objective", "Summary"),
    ("career objective", "Summary"),
    ("profile", "Summary"),
    ("about me", "Summary"),
    ("experience", "Experience"),
    ("work experience", "Experience"),
    ("professional experience", "Experience"),
    ("employment history", "Experience"),
    ("work history", "Experience"),
    ("employment", "Experience"),
    ("education", "Education"),
    ("academic background", "Education"),
    ("education and training", "Education"),
    ("skills", "Skills"),
    ("technical skills", "Skills"),
    ("key skills", "Skills"),
    ("core competencies", "Skills"),
    ("competencies", "Skills"),
    ("certifications", "Certifications"),
    ("certificates", "Certifications"),
    ("licenses and certifications", "Certifications"),
    ("licenses & certifications", "Certifications"),
    ("projects", "Projects"),
    ("key projects", "Projects"),
    ("publications", "Publications"),
    ("awards", "Awards"),
    ("honors", "Awards"),
    ("honors and awards", "Awards"),
    ("languages", "Languages"),
    ("interests", "Interests"),
    ("hobbies", "Interests"),
    ("references", "References"),
    ("volunteer experience", "Volunteer"),
    ("volunteering", "Volunteer"),
    ("contact", "Contact Information"),
    ("contact information", "Contact Information"),
    ("contact details", "Contact Information"),
];

const PREAMBLE_SECTION: &str = "Header";
const MAX_HEADER_CHARS: usize = 40;

/// Detect a resume section header line and return its canonical name.
pub fn detect_section(line: &str) -> Option<&'static str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_HEADER_CHARS {
        return None;
    }

    // Emphasis and the trailing colon can nest either way: `**Skills**:`, `**Skills:**`
    let stripped = trimmed
        .trim_start_matches('#')
        .trim_matches(|c: char| matches!(c, '*' | '_' | ':') || c.is_whitespace());

    let normalized = stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    SECTION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, canonical)| *canonical)
}

/// A span of the text in character positions.
struct Span {
    name: Option<&'static str>,
    start: usize,
    end: usize,
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        self.chunk_text(&document.document_id, &document.raw_text, &document.source())
    }

    pub fn chunk_text(&self, doc_id: &str, text: &str, source: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();

        let pieces: Vec<(usize, usize, ChunkType, Option<&'static str>)> = match self.config.strategy {
            ChunkStrategy::FixedWindow => self.fixed_pieces(0, chars.len()),
            ChunkStrategy::SectionAware => {
                let sections = self.split_by_headings(text);
                if sections.iter().all(|s| s.name.is_none()) {
                    // No structure found, fall back to plain windows
                    self.fixed_pieces(0, chars.len())
                } else {
                    sections
                        .into_iter()
                        .filter(|s| chars[s.start..s.end].iter().any(|c| !c.is_whitespace()))
                        .flat_map(|s| {
                            let name = s.name.unwrap_or(PREAMBLE_SECTION);
                            self.windows(s.start, s.end)
                                .into_iter()
                                .map(move |(start, end)| (start, end, ChunkType::Section, Some(name)))
                        })
                        .collect()
                }
            }
        };

        pieces
            .into_iter()
            .enumerate()
            .map(|(index, (start, end, chunk_type, section))| {
                Chunk::new(
                    doc_id.to_string(),
                    index,
                    chars[start..end].iter().collect(),
                    source.to_string(),
                    (start, end),
                    chunk_type,
                    section.map(str::to_string),
                )
            })
            .collect()
    }

    fn fixed_pieces(&self, start: usize, end: usize) -> Vec<(usize, usize, ChunkType, Option<&'static str>)> {
        self.windows(start, end)
            .into_iter()
            .map(|(s, e)| (s, e, ChunkType::FixedWindow, None))
            .collect()
    }

    /// Sliding windows over [start, end). The last window always ends at `end`.
    fn windows(&self, start: usize, end: usize) -> Vec<(usize, usize)> {
        let mut windows = Vec::new();
        if start >= end {
            return windows;
        }

        let step = self.config.window_chars - self.config.overlap_chars;
        let mut window_start = start;
        loop {
            let window_end = (window_start + self.config.window_chars).min(end);
            windows.push((window_start, window_end));
            if window_end == end {
                break;
            }
            window_start += step;
        }

        windows
    }

    /// Split on section headers. Spans cover the whole text without gaps.
    fn split_by_headings(&self, text: &str) -> Vec<Span> {
        let mut sections = Vec::new();
        let mut current = Span {
            name: None,
            start: 0,
            end: 0,
        };
        let mut position = 0;

        for line in text.split_inclusive('\n') {
            let line_len = line.chars().count();

            if let Some(name) = detect_section(line) {
                if position > current.start {
                    current.end = position;
                    sections.push(current);
                }
                current = Span {
                    name: Some(name),
                    start: position,
                    end: position,
                };
            }

            position += line_len;
        }

        current.end = position;
        if current.end > current.start {
            sections.push(current);
        }

        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(window: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkerConfig {
            strategy: ChunkStrategy::FixedWindow,
            window_chars: window,
            overlap_chars: overlap,
        })
        .unwrap()
    }

    fn reassemble(chunks: &[Chunk]) -> String {
        let mut out = String::new();
        let mut covered: usize = 0;
        for chunk in chunks {
            let skip = covered.saturating_sub(chunk.offset.0);
            out.extend(chunk.text.chars().skip(skip));
            covered = chunk.offset.1;
        }
        out
    }

    const RESUME: &str = "Jane Doe\njane@example.com | Berlin\n\n\
## Summary\nBackend engineer with a focus on data pipelines.\n\n\
EXPERIENCE:\nAcme Corp - Senior Engineer (2018-2024)\nBuilt ingestion services in Rust.\n\n\
Education\nBSc Computer Science, TU Berlin\n\n\
**Skills**\nRust, Python, Kafka, PostgreSQL\n";

    #[test]
    fn test_fixed_window_counts() {
        let chunker = fixed(500, 100);
        let text: String = "abcdefghij".repeat(120);
        let chunks = chunker.chunk_text("doc", &text, "resume.txt");

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].offset, (0, 500));
        assert_eq!(chunks[1].offset, (400, 900));
        assert_eq!(chunks[2].offset, (800, 1200));
        assert!(chunks.iter().all(|c| c.chunk_type == ChunkType::FixedWindow));
    }

    #[test]
    fn test_fixed_window_is_lossless() {
        let chunker = fixed(37, 11);
        let text = format!("{}ünïcødé ✓ text\n", RESUME.repeat(3));
        let chunks = chunker.chunk_text("doc", &text, "resume.txt");

        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn test_indices_are_contiguous() {
        for strategy in [ChunkStrategy::FixedWindow, ChunkStrategy::SectionAware] {
            let chunker = Chunker::new(ChunkerConfig {
                strategy,
                window_chars: 40,
                overlap_chars: 8,
            })
            .unwrap();
            let chunks = chunker.chunk_text("doc", RESUME, "resume.txt");

            let indices: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
            let expected: Vec<usize> = (0..chunks.len()).collect();
            assert_eq!(indices, expected, "strategy {:?}", strategy);
        }
    }

    #[test]
    fn test_section_aware_tags_sections() {
        let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
        let chunks = chunker.chunk_text("doc", RESUME, "resume.txt");

        let names: Vec<&str> = chunks
            .iter()
            .map(|c| c.section_name.as_deref().unwrap())
            .collect();
        assert_eq!(names, vec!["Header", "Summary", "Experience", "Education", "Skills"]);
        assert!(chunks.iter().all(|c| c.chunk_type == ChunkType::Section));
        assert!(chunks[2].text.starts_with("EXPERIENCE:"));
        assert_eq!(chunks.iter().map(|c| c.text.as_str()).collect::<String>(), RESUME);
    }

    #[test]
    fn test_long_section_is_windowed() {
        let body = "Led a team of engineers. ".repeat(20);
        let text = format!("Experience\n{}", body);
        let chunker = Chunker::new(ChunkerConfig {
            strategy: ChunkStrategy::SectionAware,
            window_chars: 100,
            overlap_chars: 20,
        })
        .unwrap();

        let chunks = chunker.chunk_text("doc", &text, "resume.txt");
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.section_name.as_deref() == Some("Experience")));
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn test_fallback_without_headers() {
        let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
        let text = "Just a paragraph about someone who writes software. ".repeat(30);
        let chunks = chunker.chunk_text("doc", &text, "resume.txt");

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chunk_type == ChunkType::FixedWindow));
        assert!(chunks.iter().all(|c| c.section_name.is_none()));
    }

    #[test]
    fn test_deterministic() {
        let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
        let first = chunker.chunk_text("doc", RESUME, "resume.txt");
        let second = chunker.chunk_text("doc", RESUME, "resume.txt");

        let ids = |chunks: &[Chunk]| chunks.iter().map(|c| c.chunk_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn test_empty_text() {
        let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
        assert!(chunker.chunk_text("doc", "", "resume.txt").is_empty());
    }

    #[test]
    fn test_invalid_config() {
        let bad = ChunkerConfig {
            strategy: ChunkStrategy::FixedWindow,
            window_chars: 100,
            overlap_chars: 100,
        };
        assert!(Chunker::new(bad).is_err());
    }

    #[test]
    fn test_detect_section() {
        assert_eq!(detect_section("## Work Experience"), Some("Experience"));
        assert_eq!(detect_section("SKILLS:"), Some("Skills"));
        assert_eq!(detect_section("  **Education**  \n"), Some("Education"));
        assert_eq!(detect_section("**Skills**:"), Some("Skills"));
        assert_eq!(detect_section("__Certifications:__"), Some("Certifications"));
        assert_eq!(detect_section("### *Projects* :"), Some("Projects"));
        assert_eq!(detect_section("I have experience with Rust"), None);
        assert_eq!(detect_section(""), None);
    }
}
