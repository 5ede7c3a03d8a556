//! Theme vocabulary and theme-score vectors.

use std::collections::{BTreeSet, HashMap};

use cohort_core::types::CorporationRecord;
use tracing::debug;

/// Fixed mapping from theme name to vector position.
///
/// Built once per run from every theme observed in the corpus, in sorted
/// order, and never mutated afterwards. Every theme vector of a run must be
/// produced by the same vocabulary so positions line up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThemeVocabulary {
    themes: Vec<String>,
    index: HashMap<String, usize>,
}

impl ThemeVocabulary {
    /// Collect the union of theme names across `records`, sorted.
    pub fn from_records(records: &[CorporationRecord]) -> Self {
        let names: BTreeSet<&str> = records
            .iter()
            .flat_map(|r| r.startup_themes.iter().map(|t| t.theme.as_str()))
            .collect();

        let themes: Vec<String> = names.into_iter().map(str::to_string).collect();
        let index = themes
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        debug!(themes = themes.len(), "Theme vocabulary built");
        Self { themes, index }
    }

    pub fn len(&self) -> usize {
        self.themes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }

    /// Vector position of `theme`, if it is part of the vocabulary.
    pub fn index_of(&self, theme: &str) -> Option<usize> {
        self.index.get(theme).copied()
    }

    /// Theme name at vector position `i`.
    pub fn theme(&self, i: usize) -> Option<&str> {
        self.themes.get(i).map(String::as_str)
    }

    pub fn themes(&self) -> &[String] {
        &self.themes
    }

    /// Score vector for one record: position `i` holds the record's score
    /// for theme `i`, or 0 when absent. A theme listed twice keeps its last
    /// score; themes outside the vocabulary are ignored.
    pub fn vectorize(&self, record: &CorporationRecord) -> Vec<f64> {
        let mut vector = vec![0.0; self.themes.len()];
        for entry in &record.startup_themes {
            match self.index_of(&entry.theme) {
                Some(i) => vector[i] = f64::from(entry.score),
                None => debug!(theme = %entry.theme, record = %record.id, "Theme outside vocabulary"),
            }
        }
        vector
    }

    /// Score vectors for every record, in corpus order.
    pub fn vectorize_all(&self, records: &[CorporationRecord]) -> Vec<Vec<f64>> {
        records.iter().map(|r| self.vectorize(r)).collect()
    }
}
