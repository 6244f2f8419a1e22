mod args;
mod commands;
mod table;

use anyhow::Result;
use clap::Parser;
use pipeline::Providers;
use query::QueryEngine;

use crate::args::{Cli, Commands, build_filter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = commands::load_settings(cli.config.as_deref())?;
    pipeline::init_tracing(&settings.log)?;

    if let Commands::Ingest {
        no_llm,
        skip_existing,
        ..
    } = &cli.command
    {
        settings.pipeline.enable_llm_parsing &= !no_llm;
        settings.pipeline.skip_existing |= *skip_existing;
    }

    let collection = cli
        .collection
        .clone()
        .unwrap_or_else(|| settings.pipeline.collection.clone());
    tracing::debug!(collection = %collection, command = ?cli.command, "Running command");

    let providers = Providers::from_settings(&settings).await?;
    let store = providers.store.as_ref();
    let engine = || QueryEngine::new(providers.embedder.clone(), providers.store.clone(), providers.llm.clone());

    match &cli.command {
        Commands::Ingest { path, .. } => {
            let pipeline = providers.pipeline(&settings)?;
            commands::ingest(&pipeline, path, &collection, cli.json).await
        }
        Commands::List => commands::list(store, &collection, cli.json).await,
        Commands::Show { document_id } => commands::show(&engine(), &collection, document_id, cli.json).await,
        Commands::Stats => commands::stats(store, &collection, cli.json).await,
        Commands::Collections => commands::collections(store, cli.json).await,
        Commands::Create { name } => commands::create(store, name).await,
        Commands::Delete { name } => commands::delete(store, name).await,
        Commands::Clear { name } => commands::clear(store, name).await,
        Commands::Search {
            query,
            k,
            candidates,
            filters,
        } => {
            let filter = build_filter(filters);
            if *candidates {
                commands::candidates(&engine(), &collection, query, *k, filter.as_ref(), cli.json).await
            } else {
                commands::search(&engine(), &collection, query, *k, filter.as_ref(), cli.json).await
            }
        }
        Commands::Ask { question, k, filters } => {
            let filter = build_filter(filters);
            commands::ask(&engine(), &collection, question, *k, filter.as_ref(), cli.json).await
        }
    }
}
