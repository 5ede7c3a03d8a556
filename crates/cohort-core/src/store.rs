//! Flat-file persistence for the corpus and the pipeline artifacts.
//!
//! Everything is pretty-printed JSON so intermediate files can be inspected
//! (or recovered from) by hand.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::{CohortError, Result};
use crate::types::CorporationRecord;

/// Read the corpus file produced by the crawler.
///
/// Any failure (missing file, malformed JSON, missing required field,
/// invalid theme score, duplicate identifier) is reported as
/// [`CohortError::CorpusUnreadable`] so the pipeline aborts before any
/// computation starts.
pub fn load_corpus(path: &Path) -> Result<Vec<CorporationRecord>> {
    let content = std::fs::read_to_string(path).map_err(|e| CohortError::corpus(path, e))?;
    let records: Vec<CorporationRecord> =
        serde_json::from_str(&content).map_err(|e| CohortError::corpus(path, e))?;

    let mut seen = HashSet::with_capacity(records.len());
    for record in &records {
        if !seen.insert(record.id.as_str()) {
            return Err(CohortError::corpus(
                path,
                format!("duplicate corporation id '{}'", record.id),
            ));
        }
    }

    info!(path = %path.display(), records = records.len(), "Corpus loaded");
    Ok(records)
}

/// Write the corpus file.
pub fn save_corpus(path: &Path, records: &[CorporationRecord]) -> Result<()> {
    write_json(path, &records)?;
    info!(path = %path.display(), records = records.len(), "Corpus saved");
    Ok(())
}

/// Serialize `value` as pretty JSON, creating parent directories as needed.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    Ok(())
}
