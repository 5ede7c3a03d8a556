//! Cohort application binary - composition root.
//!
//! 1. Parse the command line and load configuration from TOML
//! 2. Initialise tracing
//! 3. `crawl`: scrape the ranking site into the corpus file
//! 4. `cluster`: embed, partition and summarize the corpus file
//! 5. `run`: both, in order
//!
//! Exits non-zero when the corpus cannot be read, the embedding model is
//! unavailable or the crawl fails. Summary fields that could not be
//! generated are left empty and do not affect the exit code.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use cohort_core::config::CohortConfig;
use cohort_core::error::{CohortError, Result};
use cohort_core::store;
use cohort_crawl::{Crawler, GlassDollarClient};
use cohort_insight::{ClusterPipeline, ClusterReport, ClusterSummarizer, GeminiClient, SystemClock};
use cohort_vector::embedding::{EmbeddingService, MockEmbedding, OnnxEmbeddingService};

use crate::cli::{CliArgs, Command};

async fn crawl(config: &CohortConfig) -> Result<()> {
    let client = GlassDollarClient::from_config(&config.crawl)?;
    tracing::info!(endpoint = %client.endpoint(), "Crawling corporate listing");

    let crawler = Crawler::new(client, config.crawl.concurrency);
    let corpus_path = config.output_path(&config.output.corpus_file);
    let records = crawler.crawl_to_file(&corpus_path).await?;

    tracing::info!(
        path = %corpus_path.display(),
        records = records.len(),
        "Corpus written"
    );
    Ok(())
}

async fn cluster(config: &CohortConfig) -> Result<ClusterReport> {
    let corpus_path = config.output_path(&config.output.corpus_file);
    let records = store::load_corpus(&corpus_path)?;

    match config.embedding.backend.as_str() {
        "mock" => {
            tracing::warn!("Using mock embeddings; text similarity is not semantic");
            cluster_with(MockEmbedding::new(), config, &records).await
        }
        "onnx" => {
            let model_dir = cohort_core::config::expand_home(&config.embedding.model_dir);
            let embedder = OnnxEmbeddingService::from_directory(&model_dir)?;
            tracing::info!(model_dir = %model_dir.display(), "ONNX embedding model loaded");
            cluster_with(embedder, config, &records).await
        }
        other => Err(CohortError::Config(format!(
            "unknown embedding backend {other:?}"
        ))),
    }
}

async fn cluster_with<E: EmbeddingService>(
    embedder: E,
    config: &CohortConfig,
    records: &[cohort_core::types::CorporationRecord],
) -> Result<ClusterReport> {
    let pipeline = ClusterPipeline::from_config(embedder, config);

    if !config.summarizer.enabled {
        tracing::info!("Summaries disabled");
        return pipeline.run_without_summaries(records).await;
    }

    let generator = match GeminiClient::from_config(&config.summarizer) {
        Ok(generator) => generator,
        Err(e) => {
            tracing::warn!(error = %e, "Summarizer unavailable; writing clusters without summaries");
            return pipeline.run_without_summaries(records).await;
        }
    };
    tracing::info!(model = %generator.model(), "Summarizing clusters");

    let mut summarizer = ClusterSummarizer::from_config(generator, SystemClock, &config.summarizer);
    pipeline.run(records, &mut summarizer).await
}

async fn execute(command: &Command, config: &CohortConfig) -> Result<()> {
    if matches!(command, Command::Crawl | Command::Run(_)) {
        crawl(config).await?;
    }
    if matches!(command, Command::Cluster(_) | Command::Run(_)) {
        let report = cluster(config).await?;
        tracing::info!(
            clusters = report.len(),
            absent_fields = report.absent_fields(),
            path = %config.output_path(&config.output.summaries_file).display(),
            "Clustering complete"
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Config is read before tracing so its log level can seed the filter.
    let config_file = args.resolve_config_path();
    let loaded = CohortConfig::load_or_default(&config_file);
    let config_level = loaded
        .as_ref()
        .map(|c| c.general.log_level.clone())
        .unwrap_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(args.resolve_log_level(&config_level))
            }),
        )
        .init();

    tracing::info!("Starting Cohort v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %config_file.display(), error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    args.apply_overrides(&mut config);
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return ExitCode::FAILURE;
    }
    tracing::info!(
        path = %config_file.display(),
        data_dir = %config.data_dir().display(),
        "Configuration ready"
    );

    match execute(&args.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Cohort failed");
            ExitCode::FAILURE
        }
    }
}
