use anyhow::{Context, Result};
use index::{MetadataFilter, VectorStore};
use pipeline::{IngestPipeline, IngestStatus, IngestSummary, Settings};
use query::QueryEngine;
use std::path::Path;

use crate::table::{list_table, render_list, truncate};

const PREVIEW_CHARS: usize = 80;

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn ingest(pipeline: &IngestPipeline, path: &Path, collection: &str, json: bool) -> Result<()> {
    let results = if path.is_dir() {
        pipeline.process_directory(path, collection).await?
    } else {
        vec![pipeline.process_file(path, collection).await]
    };
    let summary = IngestSummary::from_results(&results);

    if json {
        print_json(&serde_json::json!({ "summary": summary, "results": results }))?;
    } else {
        let mut table = list_table(&["document", "status", "chunks", "parsing", "errors"]);
        for result in &results {
            let errors: Vec<String> = result.errors.iter().map(ToString::to_string).collect();
            table.add_row(vec![
                result.document_name.clone(),
                format!("{:?}", result.status()).to_lowercase(),
                format!("{}/{}", result.chunks_written, result.chunks_total),
                result
                    .parsing_method
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| "-".to_string()),
                truncate(&errors.join("; "), PREVIEW_CHARS),
            ]);
        }
        println!("{}", render_list("document", table, results.len()));
        println!(
            "\nIngested into '{}': {} succeeded, {} partial, {} failed, {} skipped, {} chunks written",
            collection, summary.succeeded, summary.partial, summary.failed, summary.skipped, summary.chunks_written
        );
    }

    if !results.is_empty() && results.iter().all(|r| r.status() == IngestStatus::Failed) {
        anyhow::bail!("no document could be ingested");
    }
    Ok(())
}

pub async fn list(store: &dyn VectorStore, collection: &str, json: bool) -> Result<()> {
    let documents = store.list_documents(collection).await?;
    if json {
        return print_json(&documents);
    }

    let mut table = list_table(&["document", "format", "chunks", "id"]);
    for doc in &documents {
        table.add_row(vec![
            doc.document_name.clone(),
            doc.file_format.clone(),
            doc.chunk_count.to_string(),
            doc.document_id.clone(),
        ]);
    }
    println!("{}", render_list("resume", table, documents.len()));
    Ok(())
}

pub async fn show(engine: &QueryEngine, collection: &str, document_id: &str, json: bool) -> Result<()> {
    let Some(resume) = engine.get_resume(collection, document_id).await? else {
        anyhow::bail!("No resume '{}' in collection '{}'", document_id, collection);
    };
    if json {
        return print_json(&resume);
    }

    println!("Resume:    {}", resume.document_name);
    println!("Candidate: {}", resume.candidate_name.as_deref().unwrap_or("-"));
    println!("Format:    {}", resume.file_format.as_deref().unwrap_or("-"));
    println!("Source:    {}", resume.source_path.as_deref().unwrap_or("-"));
    println!();

    let mut table = list_table(&["#", "section", "text"]);
    for chunk in &resume.chunks {
        table.add_row(vec![
            chunk.chunk_index.map(|i| i.to_string()).unwrap_or_else(|| "-".to_string()),
            chunk.section_name.clone().unwrap_or_else(|| "-".to_string()),
            truncate(&chunk.text, PREVIEW_CHARS),
        ]);
    }
    println!("{}", render_list("chunk", table, resume.chunk_count));
    Ok(())
}

pub async fn stats(store: &dyn VectorStore, collection: &str, json: bool) -> Result<()> {
    let stats = store.get_stats(collection).await?;
    if json {
        return print_json(&stats);
    }

    println!("Collection: {}", collection);
    println!("Records:    {}", stats.item_count);
    println!("Resumes:    {}", stats.document_count);
    if stats.document_count > 0 {
        println!(
            "Avg chunks: {:.1}",
            stats.item_count as f64 / stats.document_count as f64
        );
    }
    Ok(())
}

pub async fn collections(store: &dyn VectorStore, json: bool) -> Result<()> {
    let names = store.list_collections().await?;
    if json {
        return print_json(&names);
    }

    let mut table = list_table(&["collection"]);
    for name in &names {
        table.add_row(vec![name.clone()]);
    }
    println!("{}", render_list("collection", table, names.len()));
    Ok(())
}

pub async fn create(store: &dyn VectorStore, name: &str) -> Result<()> {
    store
        .create_collection(name)
        .await
        .with_context(|| format!("Failed to create collection '{}'", name))?;
    println!("Created collection '{}'", name);
    Ok(())
}

pub async fn delete(store: &dyn VectorStore, name: &str) -> Result<()> {
    store
        .delete_collection(name)
        .await
        .with_context(|| format!("Failed to delete collection '{}'", name))?;
    println!("Deleted collection '{}'", name);
    Ok(())
}

pub async fn clear(store: &dyn VectorStore, name: &str) -> Result<()> {
    store
        .clear_collection(name)
        .await
        .with_context(|| format!("Failed to clear collection '{}'", name))?;
    println!("Cleared collection '{}'", name);
    Ok(())
}

pub async fn search(
    engine: &QueryEngine,
    collection: &str,
    query: &str,
    k: usize,
    filter: Option<&MetadataFilter>,
    json: bool,
) -> Result<()> {
    let sources = engine.search(collection, query, k, filter).await?;
    if json {
        return print_json(&sources);
    }

    let mut table = list_table(&["score", "candidate", "section", "excerpt"]);
    for source in &sources {
        table.add_row(vec![
            format!("{:.3}", source.relevance_score),
            source
                .candidate_name
                .clone()
                .unwrap_or_else(|| source.document_name.clone()),
            source.section_name.clone().unwrap_or_else(|| "-".to_string()),
            truncate(&source.text, PREVIEW_CHARS),
        ]);
    }
    println!("{}", render_list("match", table, sources.len()));
    Ok(())
}

pub async fn candidates(
    engine: &QueryEngine,
    collection: &str,
    query: &str,
    top_n: usize,
    filter: Option<&MetadataFilter>,
    json: bool,
) -> Result<()> {
    let candidates = engine.rank_candidates(collection, query, top_n, filter).await?;
    if json {
        return print_json(&candidates);
    }

    let mut table = list_table(&["rank", "fit", "match", "similarity", "candidate", "years", "skills", "document"]);
    for (i, candidate) in candidates.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            format!("{:.1}/10", candidate.fit.relevance_score),
            candidate.fit.recommendation.as_str().to_string(),
            format!("{:.3}", candidate.best_score),
            candidate.candidate_name.clone().unwrap_or_else(|| "-".to_string()),
            candidate
                .experience_years
                .map(|y| y.to_string())
                .unwrap_or_else(|| "-".to_string()),
            truncate(&candidate.key_skills.join(", "), 40),
            candidate.document_name.clone(),
        ]);
    }
    println!("{}", render_list("candidate", table, candidates.len()));

    for (i, candidate) in candidates.iter().enumerate() {
        println!("\n[{}] {}", i + 1, candidate.fit.fit_summary);
        if !candidate.fit.key_strengths.is_empty() {
            println!("    Strengths: {}", candidate.fit.key_strengths.join(", "));
        }
        if !candidate.fit.potential_concerns.is_empty() {
            println!("    Concerns:  {}", candidate.fit.potential_concerns.join(", "));
        }
    }
    Ok(())
}

pub async fn ask(
    engine: &QueryEngine,
    collection: &str,
    question: &str,
    k: usize,
    filter: Option<&MetadataFilter>,
    json: bool,
) -> Result<()> {
    let answer = engine.answer(collection, question, k, filter).await?;
    if json {
        return print_json(&answer);
    }

    println!("{}\n", answer.answer);
    println!("Sources:");
    for (i, source) in answer.sources.iter().enumerate() {
        println!(
            "  [{}] {} ({}, score {:.3})",
            i + 1,
            source.candidate_name.as_deref().unwrap_or(&source.document_name),
            source.section_name.as_deref().unwrap_or("Resume"),
            source.relevance_score
        );
    }
    println!("\nAnswered in {} ms", answer.query_time_ms);
    Ok(())
}

/// Settings from `--config` when given, else the project-local file.
pub fn load_settings(config: Option<&Path>) -> Result<Settings> {
    let settings = match config {
        Some(path) => Settings::load_from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::load().context("Failed to load settings")?,
    };
    Ok(settings)
}
