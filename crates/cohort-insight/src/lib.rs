//! Cohort Insight crate - partitioning, throttled summarization, and the
//! end-to-end clustering pipeline.
//!
//! Provides:
//! - Seeded k-means over the combined distance matrix
//! - A call-window throttle driven by an injectable clock
//! - Cluster summaries from a generative text service, with rate-limit backoff
//! - The Gemini client used in production
//! - `ClusterPipeline`, which ties embedding, similarity, partitioning,
//!   summarization, and artifact persistence together

pub mod error;
pub mod gemini;
pub mod partition;
pub mod pipeline;
pub mod summarizer;
pub mod throttle;
pub mod types;

pub use error::{GenerateError, InsightError};
pub use gemini::GeminiClient;
pub use partition::KMeansPartitioner;
pub use pipeline::ClusterPipeline;
pub use summarizer::{ClusterSummarizer, RetryPolicy, TextGenerator};
pub use throttle::{Clock, FakeClock, SystemClock, Throttle};
pub use types::{ClusterReport, ClusterSummary, Clusters, Partition};
