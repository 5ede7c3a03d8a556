use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CohortError, Result};

/// Accepted values of `embedding.backend`.
pub const EMBEDDING_BACKENDS: [&str; 2] = ["onnx", "mock"];

/// Top-level configuration for the Cohort pipeline.
///
/// Loaded from `~/.cohort/config.toml` by default. Each section corresponds
/// to one stage of the crawl -> cluster -> summarize flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohortConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub partition: PartitionConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl CohortConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CohortConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, or defaults when the file does
    /// not exist. A file that exists but cannot be read or parsed is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("No config file at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CohortError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !EMBEDDING_BACKENDS.contains(&self.embedding.backend.as_str()) {
            return Err(CohortError::Config(format!(
                "embedding.backend must be one of {:?}, got {:?}",
                EMBEDDING_BACKENDS, self.embedding.backend
            )));
        }
        if self.partition.num_clusters == 0 {
            return Err(CohortError::Config(
                "partition.num_clusters must be at least 1".to_string(),
            ));
        }
        if self.similarity.text_weight < 0.0 || self.similarity.theme_weight < 0.0 {
            return Err(CohortError::Config(
                "similarity weights must be non-negative".to_string(),
            ));
        }
        if self.summarizer.max_attempts == 0 {
            return Err(CohortError::Config(
                "summarizer.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.summarizer.calls_per_window == 0 {
            return Err(CohortError::Config(
                "summarizer.calls_per_window must be at least 1".to_string(),
            ));
        }
        if self.crawl.concurrency == 0 {
            return Err(CohortError::Config(
                "crawl.concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Data directory with a leading `~` expanded to the home directory.
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.general.data_dir)
    }

    /// Resolve an output file name against the data directory.
    ///
    /// Absolute paths are returned unchanged.
    pub fn output_path(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }
}

/// Expand `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path.starts_with("~/") || path.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&path[2..])
    } else {
        PathBuf::from(path)
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the corpus and every generated artifact.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.cohort/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Ranking site scraper settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// GraphQL endpoint of the ranking site.
    pub endpoint: String,
    /// Maximum detail requests in flight.
    pub concurrency: usize,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://ranking.glassdollar.com/graphql".to_string(),
            concurrency: 8,
            timeout_secs: 30,
        }
    }
}

/// Text embedding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend: "onnx" or "mock".
    pub backend: String,
    /// Directory containing `model.onnx` and `tokenizer.json`.
    pub model_dir: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: "onnx".to_string(),
            model_dir: "~/.cohort/models/paraphrase-MiniLM-L6-v2".to_string(),
        }
    }
}

/// Weights of the combined distance metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Weight of the description (text) signal.
    pub text_weight: f64,
    /// Weight of the theme-overlap signal.
    pub theme_weight: f64,
    /// Clamp negative cosine similarities to zero before combining.
    pub clip_negative_cosine: bool,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            text_weight: 0.3,
            theme_weight: 0.7,
            clip_negative_cosine: true,
        }
    }
}

/// k-means partitioning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Target cluster count K.
    pub num_clusters: usize,
    /// Seed for centroid initialisation.
    pub seed: u64,
    /// Maximum Lloyd iterations per restart.
    pub max_iterations: usize,
    /// Number of seeded restarts; the lowest-inertia run wins.
    pub restarts: usize,
    /// Stop once total centroid movement falls below this value.
    pub tolerance: f64,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            num_clusters: 10,
            seed: 0,
            max_iterations: 300,
            restarts: 10,
            tolerance: 1e-4,
        }
    }
}

/// Generative summary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// Whether to call the generative service at all.
    pub enabled: bool,
    /// Generative model name.
    pub model: String,
    /// Base URL of the generative language API.
    pub base_url: String,
    /// API key. Falls back to `GEMINI_API_KEY` when unset.
    pub api_key: Option<String>,
    /// Attempts per prompt when the service reports rate limiting.
    pub max_attempts: u32,
    /// Backoff base; the wait after attempt `n` is `base^n` seconds.
    pub backoff_base_secs: u64,
    /// Calls permitted per throttle window.
    pub calls_per_window: u32,
    /// Throttle window length in seconds.
    pub window_secs: u64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "gemini-pro".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: None,
            max_attempts: 5,
            backoff_base_secs: 2,
            calls_per_window: 60,
            window_secs: 60,
            timeout_secs: 60,
        }
    }
}

impl SummarizerConfig {
    /// API key from config, else the `GEMINI_API_KEY` environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()))
    }
}

/// Artifact file names, relative to the data directory unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub corpus_file: String,
    pub clusters_file: String,
    pub summaries_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            corpus_file: "all_company_details.json".to_string(),
            clusters_file: "clusters.json".to_string(),
            summaries_file: "cluster_summaries.json".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_temp_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_config_default_values() {
        let config = CohortConfig::default();

        assert_eq!(config.general.data_dir, "~/.cohort/data");
        assert_eq!(config.general.log_level, "info");

        assert_eq!(
            config.crawl.endpoint,
            "https://ranking.glassdollar.com/graphql"
        );
        assert_eq!(config.crawl.concurrency, 8);

        assert_eq!(config.embedding.backend, "onnx");

        assert!((config.similarity.text_weight - 0.3).abs() < f64::EPSILON);
        assert!((config.similarity.theme_weight - 0.7).abs() < f64::EPSILON);
        assert!(config.similarity.clip_negative_cosine);

        assert_eq!(config.partition.num_clusters, 10);
        assert_eq!(config.partition.seed, 0);
        assert_eq!(config.partition.restarts, 10);

        assert!(config.summarizer.enabled);
        assert_eq!(config.summarizer.model, "gemini-pro");
        assert_eq!(config.summarizer.max_attempts, 5);
        assert_eq!(config.summarizer.backoff_base_secs, 2);
        assert_eq!(config.summarizer.calls_per_window, 60);
        assert_eq!(config.summarizer.window_secs, 60);

        assert_eq!(config.output.corpus_file, "all_company_details.json");
        assert_eq!(config.output.clusters_file, "clusters.json");
        assert_eq!(config.output.summaries_file, "cluster_summaries.json");
    }

    #[test]
    fn test_config_load_partial_toml() {
        let content = r#"
[partition]
num_clusters = 4
seed = 42

[similarity]
text_weight = 0.5
"#;
        let file = create_temp_config(content);
        let config = CohortConfig::load(file.path()).unwrap();

        assert_eq!(config.partition.num_clusters, 4);
        assert_eq!(config.partition.seed, 42);
        // Unset fields in a present section keep their defaults.
        assert_eq!(config.partition.max_iterations, 300);
        assert!((config.similarity.text_weight - 0.5).abs() < f64::EPSILON);
        assert!((config.similarity.theme_weight - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.summarizer.model, "gemini-pro");
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        let result = CohortConfig::load(file.path());
        assert!(matches!(result, Err(CohortError::Config(_))));
    }

    #[test]
    fn test_config_load_or_default_missing_file() {
        let config =
            CohortConfig::load_or_default(Path::new("/does/not/exist/config.toml")).unwrap();
        assert_eq!(config.partition.num_clusters, 10);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_config_load_or_default_rejects_malformed_file() {
        let file = create_temp_config("[partition\nnum_clusters = ");
        let result = CohortConfig::load_or_default(file.path());
        assert!(matches!(result, Err(CohortError::Config(_))));
    }

    #[test]
    fn test_config_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("dir").join("config.toml");

        let mut config = CohortConfig::default();
        config.partition.num_clusters = 7;
        config.save(&path).unwrap();

        let reloaded = CohortConfig::load(&path).unwrap();
        assert_eq!(reloaded.partition.num_clusters, 7);
    }

    #[test]
    fn test_config_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = CohortConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "~/.cohort/data");
        assert_eq!(config.partition.num_clusters, 10);
    }

    #[test]
    fn test_validate_rejects_zero_clusters() {
        let mut config = CohortConfig::default();
        config.partition.num_clusters = 0;
        assert!(matches!(config.validate(), Err(CohortError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let mut config = CohortConfig::default();
        config.similarity.theme_weight = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_backend() {
        let mut config = CohortConfig::default();
        config.embedding.backend = "Mock".to_string();
        match config.validate() {
            Err(CohortError::Config(msg)) => assert!(msg.contains("Mock")),
            other => panic!("unexpected {other:?}"),
        }

        config.embedding.backend = "mock".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(CohortConfig::default().validate().is_ok());
    }

    #[test]
    fn test_output_path_relative_and_absolute() {
        let mut config = CohortConfig::default();
        config.general.data_dir = "/var/cohort".to_string();
        assert_eq!(
            config.output_path("clusters.json"),
            PathBuf::from("/var/cohort/clusters.json")
        );
        assert_eq!(
            config.output_path("/tmp/out.json"),
            PathBuf::from("/tmp/out.json")
        );
    }

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("data"), PathBuf::from("data"));
        assert!(!expand_home("~/data").to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_resolve_api_key_prefers_config() {
        let config = SummarizerConfig {
            api_key: Some("from-config".to_string()),
            ..SummarizerConfig::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("from-config"));
    }
}
