use std::collections::BTreeMap;

use cohort_core::types::CorporationRecord;
use serde::{Deserialize, Serialize};

/// Member records per cluster label, ascending by label. Only non-empty
/// clusters appear.
pub type Clusters = BTreeMap<usize, Vec<CorporationRecord>>;

/// Label assignment produced by the partitioner.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// `labels[i]` is the cluster of record `i`, in `0..k`.
    pub labels: Vec<usize>,
    /// Number of clusters actually requested from k-means.
    pub k: usize,
    /// Sum of squared distances of points to their centroid.
    pub inertia: f64,
}

impl Partition {
    /// Record indices per label. Empty clusters are dropped.
    pub fn members(&self) -> BTreeMap<usize, Vec<usize>> {
        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, &label) in self.labels.iter().enumerate() {
            groups.entry(label).or_default().push(i);
        }
        groups
    }

    /// Group `records` (in corpus order) by label.
    pub fn group(&self, records: &[CorporationRecord]) -> Clusters {
        self.members()
            .into_iter()
            .map(|(label, idx)| (label, idx.into_iter().map(|i| records[i].clone()).collect()))
            .collect()
    }
}

/// Generated title and description for one cluster.
///
/// `None` means the generative call failed after retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub title: Option<String>,
    pub description: Option<String>,
    pub companies: Vec<CorporationRecord>,
}

/// Final report: one summary per non-empty cluster, keyed by label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterReport {
    pub summaries: BTreeMap<usize, ClusterSummary>,
}

impl ClusterReport {
    /// Report with every title and description absent.
    pub fn unsummarized(clusters: &Clusters) -> Self {
        let summaries = clusters
            .iter()
            .map(|(&label, companies)| {
                (
                    label,
                    ClusterSummary {
                        title: None,
                        description: None,
                        companies: companies.clone(),
                    },
                )
            })
            .collect();
        Self { summaries }
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    /// Number of title or description fields left absent.
    pub fn absent_fields(&self) -> usize {
        self.summaries
            .values()
            .map(|s| usize::from(s.title.is_none()) + usize::from(s.description.is_none()))
            .sum()
    }
}
