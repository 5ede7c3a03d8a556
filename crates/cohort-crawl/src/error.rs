use cohort_core::error::CohortError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("unexpected status {status} for {context}")]
    Status { status: u16, context: String },
    #[error("malformed response: {0}")]
    Response(String),
    #[error("fetch task failed: {0}")]
    Task(String),
}

impl From<reqwest::Error> for CrawlError {
    fn from(err: reqwest::Error) -> Self {
        CrawlError::Http(err.to_string())
    }
}

impl From<CrawlError> for CohortError {
    fn from(err: CrawlError) -> Self {
        CohortError::Crawl(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = CrawlError::Status {
            status: 502,
            context: "page 3".to_string(),
        };
        assert_eq!(err.to_string(), "unexpected status 502 for page 3");
    }

    #[test]
    fn test_into_cohort_error() {
        let err: CohortError = CrawlError::Response("no data".to_string()).into();
        assert!(matches!(err, CohortError::Crawl(_)));
        assert!(err.to_string().contains("malformed response: no data"));
    }
}
