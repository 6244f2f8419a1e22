//! Command-line interface definitions

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use index::MetadataFilter;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "resume-rag")]
#[command(about = "Resume ingestion and retrieval over a vector database", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Collection to operate on (defaults to the configured one)
    #[arg(short, long, global = true, env = "RESUME_RAG_COLLECTION")]
    pub collection: Option<String>,

    /// Settings file used instead of ./resume-rag.yaml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a resume file or every resume under a directory
    Ingest {
        path: PathBuf,

        /// Skip LLM metadata extraction
        #[arg(long)]
        no_llm: bool,

        /// Leave documents that are already indexed untouched
        #[arg(long)]
        skip_existing: bool,
    },

    /// List indexed resumes
    List,

    /// Print every chunk of one resume
    Show {
        /// Document id as printed by `list`
        document_id: String,
    },

    /// Show collection statistics
    Stats,

    /// List collections
    Collections,

    /// Create a collection
    Create { name: String },

    /// Delete a collection and everything in it
    Delete { name: String },

    /// Remove every record from a collection
    Clear { name: String },

    /// Similarity search over resume chunks
    Search {
        query: String,

        /// Number of chunks to return
        #[arg(short, default_value = "4")]
        k: usize,

        /// Rank whole resumes instead of chunks
        #[arg(long)]
        candidates: bool,

        /// Metadata equality filter, e.g. `key_skills=Rust` (repeatable)
        #[arg(short, long = "filter", value_parser = parse_filter_pair)]
        filters: Vec<(String, Value)>,
    },

    /// Answer a question from the indexed resumes
    Ask {
        question: String,

        /// Number of chunks given to the model
        #[arg(short, default_value = "4")]
        k: usize,

        /// Metadata equality filter, e.g. `file_format=MD` (repeatable)
        #[arg(short, long = "filter", value_parser = parse_filter_pair)]
        filters: Vec<(String, Value)>,
    },
}

/// `key=value`; numeric and boolean values are compared as JSON scalars.
pub fn parse_filter_pair(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("expected key=value, got {:?}", raw))?;

    let key = key.trim();
    anyhow::ensure!(!key.is_empty(), "filter key is empty in {:?}", raw);

    let value = value.trim();
    let value = match serde_json::from_str::<Value>(value) {
        Ok(v @ (Value::Number(_) | Value::Bool(_))) => v,
        _ => Value::String(value.to_string()),
    };
    Ok((key.to_string(), value))
}

pub fn build_filter(pairs: &[(String, Value)]) -> Option<MetadataFilter> {
    if pairs.is_empty() {
        return None;
    }
    Some(
        pairs
            .iter()
            .fold(MetadataFilter::new(), |f, (k, v)| f.with(k.clone(), v.clone())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from([
            "resume-rag",
            "--collection",
            "engineers",
            "search",
            "rust backend",
            "-k",
            "6",
            "--filter",
            "key_skills=Rust",
            "-f",
            "experience_years=7",
        ])
        .unwrap();

        assert_eq!(cli.collection.as_deref(), Some("engineers"));
        match cli.command {
            Commands::Search { query, k, candidates, filters } => {
                assert_eq!(query, "rust backend");
                assert_eq!(k, 6);
                assert!(!candidates);
                assert_eq!(filters[0], ("key_skills".to_string(), json!("Rust")));
                assert_eq!(filters[1], ("experience_years".to_string(), json!(7)));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_ingest_flags() {
        let cli = Cli::try_parse_from(["resume-rag", "ingest", "./resumes", "--no-llm", "--skip-existing"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Ingest { no_llm: true, skip_existing: true, .. }
        ));
    }

    #[test]
    fn test_parse_show() {
        let cli = Cli::try_parse_from(["resume-rag", "--json", "show", "jane.txt_1a2b3c4d"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Show { ref document_id } if document_id == "jane.txt_1a2b3c4d"));
        assert!(Cli::try_parse_from(["resume-rag", "show"]).is_err());
    }

    #[test]
    fn test_filter_pairs() {
        assert!(parse_filter_pair("no_equals").is_err());
        assert!(parse_filter_pair("=value").is_err());
        assert_eq!(parse_filter_pair("name = Jane Doe").unwrap().1, json!("Jane Doe"));

        let filter = build_filter(&[("file_format".into(), json!("MD"))]).unwrap();
        assert_eq!(filter, MetadataFilter::new().with("file_format", "MD"));
        assert!(build_filter(&[]).is_none());
    }
}
