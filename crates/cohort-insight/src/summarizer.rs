//! Cluster summarization through a generative text service.
//!
//! Each non-empty cluster gets two prompts, one for a title and one for a
//! description. Rate-limited calls are retried with exponential backoff;
//! any other failure leaves that field absent without affecting the rest of
//! the report.

use std::future::Future;
use std::time::Duration;

use cohort_core::config::SummarizerConfig;
use cohort_core::types::CorporationRecord;
use tracing::{debug, info, warn};

use crate::error::GenerateError;
use crate::throttle::{Clock, Throttle};
use crate::types::{ClusterReport, ClusterSummary, Clusters};

/// Prompt in, text out.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, GenerateError>> + Send;
}

/// How often to retry a rate-limited call and how long to back off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls made for one prompt, first attempt included.
    pub max_attempts: u32,
    pub backoff_base_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&SummarizerConfig::default())
    }
}

impl From<&SummarizerConfig> for RetryPolicy {
    fn from(config: &SummarizerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff_base_secs: config.backoff_base_secs,
        }
    }
}

impl RetryPolicy {
    /// Wait after the `attempt`-th rate-limited call (1-based): base^attempt seconds.
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.backoff_base_secs.saturating_pow(attempt))
    }
}

/// Produces titles and descriptions for clusters, one call at a time.
pub struct ClusterSummarizer<G: TextGenerator, C: Clock> {
    generator: G,
    throttle: Throttle<C>,
    retry: RetryPolicy,
}

impl<G: TextGenerator, C: Clock> ClusterSummarizer<G, C> {
    pub fn new(generator: G, throttle: Throttle<C>, retry: RetryPolicy) -> Self {
        Self {
            generator,
            throttle,
            retry,
        }
    }

    /// Throttle and retry settings taken from the `summarizer` config section.
    pub fn from_config(generator: G, clock: C, config: &SummarizerConfig) -> Self {
        let throttle = Throttle::new(
            clock,
            config.calls_per_window,
            Duration::from_secs(config.window_secs),
        );
        Self::new(generator, throttle, RetryPolicy::from(config))
    }

    pub fn throttle(&self) -> &Throttle<C> {
        &self.throttle
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Call the generator for `prompt`, retrying only on rate limiting.
    ///
    /// Returns `None` once attempts are exhausted or on any other failure.
    pub async fn generate_with_retry(&mut self, prompt: &str) -> Option<String> {
        let attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=attempts {
            self.throttle.acquire().await;
            match self.generator.generate(prompt).await {
                Ok(text) => {
                    let text = text.trim();
                    if text.is_empty() {
                        warn!(attempt, "Generator returned empty text");
                        return None;
                    }
                    return Some(text.to_string());
                }
                Err(GenerateError::RateLimited) if attempt < attempts => {
                    let wait = self.retry.backoff(attempt);
                    warn!(
                        attempt,
                        wait_secs = wait.as_secs(),
                        "rate limit exceeded, retrying"
                    );
                    self.throttle.clock().sleep(wait).await;
                }
                Err(GenerateError::RateLimited) => {
                    warn!(attempts, "Rate limit retries exhausted");
                    return None;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Generation failed");
                    return None;
                }
            }
        }
        None
    }

    /// Title and description for one cluster.
    pub async fn summarize(&mut self, label: usize, members: &[CorporationRecord]) -> ClusterSummary {
        let title = self.generate_with_retry(&title_prompt(members)).await;
        if title.is_none() {
            warn!(cluster = label, "Title left absent");
        }
        let description = self.generate_with_retry(&description_prompt(members)).await;
        if description.is_none() {
            warn!(cluster = label, "Description left absent");
        }
        debug!(cluster = label, members = members.len(), "Cluster summarized");

        ClusterSummary {
            title,
            description,
            companies: members.to_vec(),
        }
    }

    /// Summaries for every cluster, in ascending label order.
    pub async fn summarize_all(&mut self, clusters: &Clusters) -> ClusterReport {
        let mut report = ClusterReport::default();
        for (&label, members) in clusters {
            let summary = self.summarize(label, members).await;
            report.summaries.insert(label, summary);
        }
        info!(
            clusters = report.len(),
            absent_fields = report.absent_fields(),
            "Summarization complete"
        );
        report
    }
}

const TITLE_INSTRUCTION: &str = "Based on the following companies and their descriptions, \
generate a specific and descriptive title that captures the unique theme and focus of this cluster.";

const DESCRIPTION_INSTRUCTION: &str = "Based on the following companies and their descriptions, \
generate a concise and informative 1-2 sentence description that summarizes the common themes, \
focus areas, and unique aspects of this cluster as a whole.";

pub fn title_prompt(members: &[CorporationRecord]) -> String {
    build_prompt(TITLE_INSTRUCTION, members, "Title:")
}

pub fn description_prompt(members: &[CorporationRecord]) -> String {
    build_prompt(DESCRIPTION_INSTRUCTION, members, "Description:")
}

fn build_prompt(instruction: &str, members: &[CorporationRecord], answer: &str) -> String {
    let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
    let descriptions: Vec<&str> = members.iter().map(|m| m.description.as_str()).collect();
    let themes: Vec<String> = members
        .iter()
        .flat_map(|m| m.startup_themes.iter())
        .map(|t| format!("{} ({})", t.theme, t.score))
        .collect();

    format!(
        "{instruction}\nCompanies: {}\nDescriptions: {}\nThemes: {}\n{answer}",
        names.join(", "),
        descriptions.join(", "),
        themes.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throttle::FakeClock;
    use cohort_core::types::ThemeScore;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted responses and records every prompt it sees.
    struct ScriptedGenerator {
        responses: Mutex<VecDeque<Result<String, GenerateError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(responses: Vec<Result<String, GenerateError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GenerateError::RateLimited))
        }
    }

    fn summarizer(
        responses: Vec<Result<String, GenerateError>>,
        cap: u32,
    ) -> (ClusterSummarizer<ScriptedGenerator, FakeClock>, FakeClock) {
        let clock = FakeClock::new();
        let throttle = Throttle::new(clock.clone(), cap, Duration::from_secs(60));
        let retry = RetryPolicy {
            max_attempts: 5,
            backoff_base_secs: 2,
        };
        (
            ClusterSummarizer::new(ScriptedGenerator::new(responses), throttle, retry),
            clock,
        )
    }

    fn member(name: &str, description: &str, themes: &[(&str, u32)]) -> CorporationRecord {
        CorporationRecord::new(
            name.to_lowercase(),
            name,
            description,
            themes.iter().map(|(t, s)| ThemeScore::new(*t, *s)).collect(),
        )
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(4), Duration::from_secs(16));
    }

    #[test]
    fn test_title_prompt_lists_members_in_order() {
        let members = vec![
            member("Acme", "payments for shops", &[("Fintech", 3), ("AI", 5)]),
            member("Globex", "store analytics", &[("Retail", 4)]),
        ];
        let prompt = title_prompt(&members);
        assert!(prompt.starts_with("Based on the following companies"));
        assert!(prompt.contains("\nCompanies: Acme, Globex\n"));
        assert!(prompt.contains("\nDescriptions: payments for shops, store analytics\n"));
        assert!(prompt.contains("\nThemes: Fintech (3), AI (5), Retail (4)\n"));
        assert!(prompt.ends_with("\nTitle:"));
    }

    #[test]
    fn test_description_prompt_differs_only_in_instruction() {
        let members = vec![member("Acme", "payments", &[])];
        let prompt = description_prompt(&members);
        assert!(prompt.contains("1-2 sentence description"));
        assert!(prompt.contains("\nThemes: \n"));
        assert!(prompt.ends_with("\nDescription:"));
    }

    #[tokio::test]
    async fn test_success_is_trimmed() {
        let (mut s, clock) = summarizer(vec![Ok("  Payments Infrastructure \n".to_string())], 60);
        assert_eq!(
            s.generate_with_retry("p").await.as_deref(),
            Some("Payments Infrastructure")
        );
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limited_until_exhausted() {
        let (mut s, clock) = summarizer(vec![], 60);
        assert_eq!(s.generate_with_retry("p").await, None);
        assert_eq!(s.generator().calls(), 5);
        let secs: Vec<u64> = clock.sleeps().iter().map(Duration::as_secs).collect();
        assert_eq!(secs, vec![2, 4, 8, 16]);
    }

    #[tokio::test]
    async fn test_recovers_after_rate_limit() {
        let (mut s, clock) = summarizer(
            vec![
                Err(GenerateError::RateLimited),
                Err(GenerateError::RateLimited),
                Ok("Robotics".to_string()),
            ],
            60,
        );
        assert_eq!(s.generate_with_retry("p").await.as_deref(), Some("Robotics"));
        assert_eq!(s.generator().calls(), 3);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[tokio::test]
    async fn test_other_error_is_not_retried() {
        let (mut s, clock) = summarizer(vec![Err(GenerateError::Other("500".to_string()))], 60);
        assert_eq!(s.generate_with_retry("p").await, None);
        assert_eq!(s.generator().calls(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_empty_response_is_absent() {
        let (mut s, _) = summarizer(vec![Ok("   ".to_string())], 60);
        assert_eq!(s.generate_with_retry("p").await, None);
        assert_eq!(s.generator().calls(), 1);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_fields() {
        let (mut s, _) = summarizer(
            vec![
                Ok("Payments".to_string()),
                Err(GenerateError::Other("blocked".to_string())),
                Ok("Retail".to_string()),
                Ok("Shops and stores.".to_string()),
            ],
            60,
        );
        let mut clusters = Clusters::new();
        clusters.insert(0, vec![member("Acme", "payments", &[])]);
        clusters.insert(1, vec![member("Globex", "stores", &[])]);

        let report = s.summarize_all(&clusters).await;
        assert_eq!(report.len(), 2);
        assert_eq!(report.summaries[&0].title.as_deref(), Some("Payments"));
        assert_eq!(report.summaries[&0].description, None);
        assert_eq!(report.summaries[&1].title.as_deref(), Some("Retail"));
        assert_eq!(
            report.summaries[&1].description.as_deref(),
            Some("Shops and stores.")
        );
        assert_eq!(report.summaries[&1].companies[0].name, "Globex");
    }

    #[tokio::test]
    async fn test_throttle_waits_once_across_clusters() {
        let responses = (0..8).map(|i| Ok(format!("text {i}"))).collect();
        let (mut s, clock) = summarizer(responses, 6);
        let mut clusters = Clusters::new();
        for label in 0..4 {
            clusters.insert(label, vec![member(&format!("C{label}"), "d", &[])]);
        }

        let report = s.summarize_all(&clusters).await;
        assert_eq!(report.absent_fields(), 0);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(60)]);
    }
}
