use std::future::Future;

use cohort_core::types::CorporationRecord;

use crate::error::CrawlError;

/// One page of the corporate listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorporatePage {
    pub ids: Vec<String>,
    /// Total number of corporates the listing reports.
    pub total_count: usize,
}

/// Paginated listing plus per-corporate detail lookup.
pub trait CorporateSource: Send + Sync + 'static {
    /// Listing page `page` (1-based). `None` when the page is missing.
    fn fetch_page(
        &self,
        page: u32,
    ) -> impl Future<Output = Result<Option<CorporatePage>, CrawlError>> + Send;

    /// Full record for `id`. `None` when the source has no such corporate.
    fn fetch_detail(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<CorporationRecord>, CrawlError>> + Send;
}
