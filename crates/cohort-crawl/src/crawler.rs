//! Walks the corporate listing and fetches every detail record.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use cohort_core::error::Result;
use cohort_core::store;
use cohort_core::types::CorporationRecord;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::CrawlError;
use crate::source::CorporateSource;

pub struct Crawler<S: CorporateSource> {
    source: Arc<S>,
    concurrency: usize,
}

impl<S: CorporateSource> Crawler<S> {
    /// `concurrency` bounds the number of detail fetches in flight.
    pub fn new(source: S, concurrency: usize) -> Self {
        Self {
            source: Arc::new(source),
            concurrency: concurrency.max(1),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Every corporate id in listing order, without duplicates.
    ///
    /// Pages are read from 1 until a page is missing or empty, or the number
    /// of ids collected reaches the count the listing reports. A failure on
    /// the first page is an error; a failure later ends pagination.
    pub async fn collect_ids(&self) -> std::result::Result<Vec<String>, CrawlError> {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        let mut page = 1u32;

        loop {
            let listing = match self.source.fetch_page(page).await {
                Ok(Some(listing)) => listing,
                Ok(None) => {
                    debug!(page, "Listing page missing; stopping");
                    break;
                }
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    warn!(page, error = %e, "Listing page failed; stopping");
                    break;
                }
            };
            if listing.ids.is_empty() {
                break;
            }

            for id in listing.ids {
                if seen.insert(id.clone()) {
                    ids.push(id);
                } else {
                    warn!(id = %id, page, "Duplicate corporate id in listing");
                }
            }
            if ids.len() >= listing.total_count {
                break;
            }
            page += 1;
        }

        info!(ids = ids.len(), pages = page, "Corporate listing collected");
        Ok(ids)
    }

    /// Detail records for every listed id, in listing order. Ids whose
    /// detail fetch fails are dropped.
    pub async fn crawl(&self) -> std::result::Result<Vec<CorporationRecord>, CrawlError> {
        let ids = self.collect_ids().await?;
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(ids.len());

        for id in ids {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| CrawlError::Task(e.to_string()))?;
            let source = Arc::clone(&self.source);
            handles.push(tokio::spawn(async move {
                let result = source.fetch_detail(&id).await;
                drop(permit);
                (id, result)
            }));
        }

        let total = handles.len();
        let mut records = Vec::with_capacity(total);
        for handle in handles {
            let (id, result) = handle
                .await
                .map_err(|e| CrawlError::Task(e.to_string()))?;
            match result {
                Ok(Some(record)) => records.push(record),
                Ok(None) => warn!(id = %id, "Corporate has no detail record; skipping"),
                Err(e) => warn!(id = %id, error = %e, "Detail fetch failed; skipping"),
            }
        }

        info!(
            fetched = records.len(),
            dropped = total - records.len(),
            "Crawl complete"
        );
        Ok(records)
    }

    /// Crawl and write the corpus file.
    pub async fn crawl_to_file(&self, path: &Path) -> Result<Vec<CorporationRecord>> {
        let records = self.crawl().await?;
        store::save_corpus(path, &records)?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::CorporatePage;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// In-memory listing split into fixed-size pages.
    struct FakeSource {
        ids: Vec<String>,
        page_size: usize,
        reported_count: usize,
        failing: HashSet<String>,
        missing: HashSet<String>,
        page_calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        page_errors: HashMap<u32, String>,
    }

    impl FakeSource {
        fn new(count: usize, page_size: usize) -> Self {
            Self {
                ids: (0..count).map(|i| format!("c{i:03}")).collect(),
                page_size,
                reported_count: count,
                failing: HashSet::new(),
                missing: HashSet::new(),
                page_calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                page_errors: HashMap::new(),
            }
        }
    }

    impl CorporateSource for FakeSource {
        async fn fetch_page(
            &self,
            page: u32,
        ) -> std::result::Result<Option<CorporatePage>, CrawlError> {
            self.page_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(msg) = self.page_errors.get(&page) {
                return Err(CrawlError::Http(msg.clone()));
            }
            let start = (page as usize - 1) * self.page_size;
            let ids = self
                .ids
                .iter()
                .skip(start)
                .take(self.page_size)
                .cloned()
                .collect();
            Ok(Some(CorporatePage {
                ids,
                total_count: self.reported_count,
            }))
        }

        async fn fetch_detail(
            &self,
            id: &str,
        ) -> std::result::Result<Option<CorporationRecord>, CrawlError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            // Later ids finish first so ordering has to be restored.
            let delay = 40u64.saturating_sub(id[1..].parse::<u64>().unwrap_or(0) * 3);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(id) {
                return Err(CrawlError::Status {
                    status: 500,
                    context: id.to_string(),
                });
            }
            if self.missing.contains(id) {
                return Ok(None);
            }
            Ok(Some(CorporationRecord::new(
                id,
                format!("Corp {id}"),
                "description",
                vec![],
            )))
        }
    }

    #[tokio::test]
    async fn test_collect_ids_stops_at_reported_count() {
        let crawler = Crawler::new(FakeSource::new(7, 3), 4);
        let ids = crawler.collect_ids().await.unwrap();
        assert_eq!(ids.len(), 7);
        assert_eq!(ids[0], "c000");
        assert_eq!(crawler.source().page_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_collect_ids_stops_on_empty_page() {
        let mut source = FakeSource::new(4, 2);
        source.reported_count = 100;
        let crawler = Crawler::new(source, 4);
        let ids = crawler.collect_ids().await.unwrap();
        assert_eq!(ids.len(), 4);
        assert_eq!(crawler.source().page_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_collect_ids_first_page_error_is_fatal() {
        let mut source = FakeSource::new(4, 2);
        source.page_errors.insert(1, "connection refused".to_string());
        let err = Crawler::new(source, 1).collect_ids().await.unwrap_err();
        assert!(matches!(err, CrawlError::Http(_)));
    }

    #[tokio::test]
    async fn test_collect_ids_later_page_error_ends_listing() {
        let mut source = FakeSource::new(6, 2);
        source.page_errors.insert(2, "timeout".to_string());
        let ids = Crawler::new(source, 1).collect_ids().await.unwrap();
        assert_eq!(ids, vec!["c000", "c001"]);
    }

    #[tokio::test]
    async fn test_crawl_preserves_listing_order() {
        let crawler = Crawler::new(FakeSource::new(10, 4), 5);
        let records = crawler.crawl().await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("c{i:03}")).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_crawl_bounds_concurrency() {
        let crawler = Crawler::new(FakeSource::new(12, 12), 3);
        crawler.crawl().await.unwrap();
        let max = crawler.source().max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 3, "max in flight was {max}");
        assert!(max >= 1);
    }

    #[tokio::test]
    async fn test_crawl_drops_failed_details() {
        let mut source = FakeSource::new(5, 5);
        source.failing.insert("c001".to_string());
        source.missing.insert("c003".to_string());
        let records = Crawler::new(source, 2).crawl().await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c000", "c002", "c004"]);
    }

    #[tokio::test]
    async fn test_crawl_to_file_writes_loadable_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all_company_details.json");
        let crawler = Crawler::new(FakeSource::new(3, 2), 2);
        crawler.crawl_to_file(&path).await.unwrap();

        let loaded = store::load_corpus(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[2].name, "Corp c002");
    }
}
