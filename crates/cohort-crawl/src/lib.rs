//! Cohort Crawl crate - builds the corporate corpus from the ranking site.
//!
//! Provides:
//! - `CorporateSource`, the paginated listing + detail lookup boundary
//! - `GlassDollarClient`, the GraphQL implementation
//! - `Crawler`, which walks every page and fetches details concurrently

pub mod crawler;
pub mod error;
pub mod glassdollar;
pub mod source;

pub use crawler::Crawler;
pub use error::CrawlError;
pub use glassdollar::GlassDollarClient;
pub use source::{CorporatePage, CorporateSource};
