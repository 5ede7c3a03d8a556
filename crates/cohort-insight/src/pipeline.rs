//! End-to-end clustering run.
//!
//! Loaded records flow through embedding, theme vectorization, the similarity
//! engine and the partitioner. The partition is persisted before any
//! summarization starts, so a failed or slow summarizer never loses the
//! clustering result.

use std::path::{Path, PathBuf};

use cohort_core::config::CohortConfig;
use cohort_core::error::{CohortError, Result};
use cohort_core::store;
use cohort_core::types::CorporationRecord;
use cohort_vector::embedding::EmbeddingService;
use cohort_vector::similarity::{
    text_similarity_matrix, theme_similarity_matrix, CombinedMetric, SquareMatrix,
};
use cohort_vector::theme::ThemeVocabulary;
use tracing::{info, instrument};

use crate::partition::KMeansPartitioner;
use crate::summarizer::{ClusterSummarizer, TextGenerator};
use crate::throttle::Clock;
use crate::types::{ClusterReport, Clusters};

/// Orchestrates one clustering run over a loaded corpus.
pub struct ClusterPipeline<E: EmbeddingService> {
    embedder: E,
    metric: CombinedMetric,
    partitioner: KMeansPartitioner,
    clusters_path: PathBuf,
    summaries_path: PathBuf,
}

impl<E: EmbeddingService> ClusterPipeline<E> {
    pub fn new(
        embedder: E,
        metric: CombinedMetric,
        partitioner: KMeansPartitioner,
        clusters_path: impl Into<PathBuf>,
        summaries_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            embedder,
            metric,
            partitioner,
            clusters_path: clusters_path.into(),
            summaries_path: summaries_path.into(),
        }
    }

    /// Metric, partitioner and artifact paths from config.
    pub fn from_config(embedder: E, config: &CohortConfig) -> Self {
        Self::new(
            embedder,
            CombinedMetric::from(&config.similarity),
            KMeansPartitioner::from(&config.partition),
            config.output_path(&config.output.clusters_file),
            config.output_path(&config.output.summaries_file),
        )
    }

    pub fn clusters_path(&self) -> &Path {
        &self.clusters_path
    }

    pub fn summaries_path(&self) -> &Path {
        &self.summaries_path
    }

    /// Combined distance matrix for `records`, in corpus order.
    pub async fn distance_matrix(&self, records: &[CorporationRecord]) -> Result<SquareMatrix> {
        let texts: Vec<String> = records.iter().map(|r| r.description.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        if embeddings.len() != records.len() {
            return Err(CohortError::EmbeddingUnavailable(format!(
                "expected {} vectors, got {}",
                records.len(),
                embeddings.len()
            )));
        }
        let dims = self.embedder.dimensions();
        if let Some(bad) = embeddings.iter().position(|v| v.len() != dims) {
            return Err(CohortError::EmbeddingUnavailable(format!(
                "vector for record '{}' has {} dimensions, expected {dims}",
                records[bad].id,
                embeddings[bad].len()
            )));
        }

        let vocabulary = ThemeVocabulary::from_records(records);
        let theme_vectors = vocabulary.vectorize_all(records);
        info!(
            records = records.len(),
            dimensions = dims,
            themes = vocabulary.len(),
            "Feature vectors built"
        );

        let text = text_similarity_matrix(&embeddings);
        let themes = theme_similarity_matrix(&theme_vectors);
        self.metric.combine(&text, &themes)
    }

    /// Embed, partition and persist the clusters file.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn partition(&self, records: &[CorporationRecord]) -> Result<Clusters> {
        let distances = self.distance_matrix(records).await?;
        let partition = self.partitioner.partition(&distances)?;
        let clusters = partition.group(records);

        store::write_json(&self.clusters_path, &clusters)?;
        info!(
            path = %self.clusters_path.display(),
            clusters = clusters.len(),
            "Clusters written"
        );
        Ok(clusters)
    }

    /// Full run: partition, summarize each cluster, persist the report.
    pub async fn run<G, C>(
        &self,
        records: &[CorporationRecord],
        summarizer: &mut ClusterSummarizer<G, C>,
    ) -> Result<ClusterReport>
    where
        G: TextGenerator,
        C: Clock,
    {
        let clusters = self.partition(records).await?;
        let report = summarizer.summarize_all(&clusters).await;
        self.write_report(&report)?;
        Ok(report)
    }

    /// Partition and persist a report whose titles and descriptions are absent.
    pub async fn run_without_summaries(
        &self,
        records: &[CorporationRecord],
    ) -> Result<ClusterReport> {
        let clusters = self.partition(records).await?;
        let report = ClusterReport::unsummarized(&clusters);
        self.write_report(&report)?;
        Ok(report)
    }

    fn write_report(&self, report: &ClusterReport) -> Result<()> {
        store::write_json(&self.summaries_path, report)?;
        info!(
            path = %self.summaries_path.display(),
            clusters = report.len(),
            "Cluster summaries written"
        );
        Ok(())
    }
}
