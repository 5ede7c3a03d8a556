pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::CohortConfig;
pub use error::{CohortError, Result};
pub use types::*;
