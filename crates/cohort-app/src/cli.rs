//! CLI argument definitions for the `cohort` binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use cohort_core::config::CohortConfig;

/// Cohort - crawl corporate startup-partnership data and group similar
/// corporations into titled clusters.
#[derive(Parser, Debug)]
#[command(name = "cohort", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the corpus and the output artifacts.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Scrape the ranking site into the corpus file.
    Crawl,
    /// Cluster the corpus file and summarize each cluster.
    Cluster(ClusterArgs),
    /// Crawl, then cluster.
    Run(ClusterArgs),
}

#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct ClusterArgs {
    /// Number of clusters (K).
    #[arg(short = 'k', long = "clusters")]
    pub clusters: Option<usize>,

    /// Seed for k-means initialisation.
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Use deterministic hash embeddings instead of the ONNX model.
    #[arg(long = "mock-embeddings")]
    pub mock_embeddings: bool,

    /// Skip the generative summaries; titles and descriptions are left empty.
    #[arg(long = "no-summaries")]
    pub no_summaries: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > COHORT_CONFIG env var > ~/.cohort/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("COHORT_CONFIG") {
            if !p.is_empty() {
                return PathBuf::from(p);
            }
        }
        default_config_path()
    }

    /// Log filter directive when `RUST_LOG` is unset.
    ///
    /// Priority: --log-level flag > config file value > "info".
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        if let Some(ref level) = self.log_level {
            return level.clone();
        }
        if !config_level.trim().is_empty() {
            return config_level.to_string();
        }
        "info".to_string()
    }

    /// Apply command-line overrides on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut CohortConfig) {
        if let Some(ref dir) = self.data_dir {
            config.general.data_dir = dir.to_string_lossy().to_string();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        if let Command::Cluster(args) | Command::Run(args) = &self.command {
            if let Some(k) = args.clusters {
                config.partition.num_clusters = k;
            }
            if let Some(seed) = args.seed {
                config.partition.seed = seed;
            }
            if args.mock_embeddings {
                config.embedding.backend = "mock".to_string();
            }
            if args.no_summaries {
                config.summarizer.enabled = false;
            }
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".cohort").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".cohort").join("config.toml");
    }
    PathBuf::from("config.toml")
}
