mod batch;
mod cli;
mod commands;
mod config;
mod embedding;
mod errors;
mod export;
mod extraction;
mod ingest;
mod llm_client;
mod state;
mod store;
mod template;
mod treatment;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Cli;
use crate::config::Config;
use crate::embedding::cache::PgCacheStore;
use crate::embedding::{EmbeddingCache, HttpEmbedder};
use crate::llm_client::{LlmClient, ANALYSIS_MODEL, EXTRACTION_MODEL};
use crate::state::PipelineState;
use crate::store::DocumentStore;

/// Treatment rephrasing runs warmer than extraction so the four variants of a
/// resume read differently.
const TREATMENT_TEMPERATURE: f32 = 0.6;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume-pipeline v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL and make sure the collections exist
    let pool = store::create_pool(&config.database_url).await?;
    store::ensure_schema(&pool).await?;
    let document_store = DocumentStore::new(pool.clone());

    // Initialize LLM clients, one per pass
    let llm_extraction = LlmClient::new(config.anthropic_api_key.clone(), EXTRACTION_MODEL);
    let llm_analysis = llm_extraction.with_model(ANALYSIS_MODEL);
    let llm_treatment = llm_analysis
        .clone()
        .with_temperature(TREATMENT_TEMPERATURE);
    info!(
        "LLM clients initialized (extraction: {}, analysis: {})",
        EXTRACTION_MODEL, ANALYSIS_MODEL
    );

    // Initialize the embedding cache when the service is configured
    let embeddings = config.embeddings_api_key.clone().map(|api_key| {
        Arc::new(EmbeddingCache::new(
            Arc::new(PgCacheStore::new(pool.clone())),
            Arc::new(HttpEmbedder::new(
                config.embeddings_base_url.clone(),
                api_key,
                config.embedding_model.clone(),
            )),
        ))
    });
    match &embeddings {
        Some(cache) => info!("Embedding cache initialized (model: {})", cache.model_name()),
        None => info!("Embedding service not configured; embed/treat commands will refuse"),
    }

    let state = PipelineState {
        store: document_store,
        llm_extraction,
        llm_analysis,
        llm_treatment,
        embeddings,
        config,
    };

    commands::dispatch(state, cli).await
}
