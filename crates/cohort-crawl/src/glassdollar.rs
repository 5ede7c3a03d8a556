//! GraphQL client for the GlassDollar corporate ranking.

use std::time::Duration;

use cohort_core::config::CrawlConfig;
use cohort_core::types::CorporationRecord;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::CrawlError;
use crate::source::{CorporatePage, CorporateSource};

const CORPORATES_QUERY: &str = r#"
query Corporates($filters: CorporateFilters, $page: Int) {
  corporates(filters: $filters, page: $page) {
    rows {
      id
      name
      description
      logo_url
      hq_city
      hq_country
      website_url
      linkedin_url
      twitter_url
      startup_partners_count
    }
    count
  }
}
"#;

const CORPORATE_QUERY: &str = r#"
query ($id: String!) {
  corporate(id: $id) {
    name
    description
    logo_url
    hq_city
    hq_country
    website_url
    linkedin_url
    twitter_url
    startup_partners_count
    startup_partners {
      company_name
      logo_url: logo
      city
      website
      country
      theme_gd
    }
    startup_themes
  }
}
"#;

#[derive(Debug, Clone)]
pub struct GlassDollarClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GlassDollarClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, CrawlError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &CrawlConfig) -> Result<Self, CrawlError> {
        Self::new(
            config.endpoint.as_str(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, body: &Value, context: String) -> Result<Value, CrawlError> {
        let response = self.http.post(&self.endpoint).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Status {
                status: status.as_u16(),
                context,
            });
        }
        Ok(response.json().await?)
    }
}

impl CorporateSource for GlassDollarClient {
    async fn fetch_page(&self, page: u32) -> Result<Option<CorporatePage>, CrawlError> {
        let body = json!({
            "query": CORPORATES_QUERY,
            "variables": {
                "filters": { "hq_city": [], "industry": [] },
                "page": page,
            },
        });
        let response = self.post(&body, format!("page {page}")).await?;
        let parsed = parse_page(&response)?;
        debug!(page, rows = parsed.as_ref().map_or(0, |p| p.ids.len()), "Listing page fetched");
        Ok(parsed)
    }

    async fn fetch_detail(&self, id: &str) -> Result<Option<CorporationRecord>, CrawlError> {
        let body = json!({
            "query": CORPORATE_QUERY,
            "variables": { "id": id },
        });
        let response = self.post(&body, format!("corporate {id}")).await?;
        parse_detail(id, &response)
    }
}

/// Ids and total count from a `corporates` response. `None` when the
/// response carries no listing.
pub fn parse_page(response: &Value) -> Result<Option<CorporatePage>, CrawlError> {
    let corporates = &response["data"]["corporates"];
    if corporates.is_null() {
        return Ok(None);
    }

    let rows = corporates["rows"]
        .as_array()
        .ok_or_else(|| CrawlError::Response("corporates.rows is not a list".to_string()))?;
    let ids = rows
        .iter()
        .map(|row| match &row["id"] {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(CrawlError::Response(format!("row id is {other}"))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let total_count = corporates["count"]
        .as_u64()
        .ok_or_else(|| CrawlError::Response("corporates.count is missing".to_string()))?
        as usize;

    Ok(Some(CorporatePage { ids, total_count }))
}

/// Corporate record from a `corporate` response. The detail query does not
/// return the id, so it is filled in from the request.
pub fn parse_detail(id: &str, response: &Value) -> Result<Option<CorporationRecord>, CrawlError> {
    let mut corporate = match &response["data"]["corporate"] {
        Value::Object(map) => map.clone(),
        _ => return Ok(None),
    };
    corporate.insert("id".to_string(), Value::String(id.to_string()));

    serde_json::from_value(Value::Object(corporate))
        .map(Some)
        .map_err(|e| CrawlError::Response(format!("corporate {id}: {e}")))
}
