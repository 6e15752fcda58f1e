// Levelscrape Library
//
// A recursive, selector-driven crawl engine: declarative selectors per crawl
// depth, per-page alignment and validation, redirection-driven fan-out under
// bounded concurrency, and lock-serialized tab-separated output.

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod scheduler;
pub mod seeds;
pub mod selector;
pub mod sink;
pub mod utils;

// Re-export main types for convenience
pub use config::{CrawlConfig, MissingAttrPolicy};
pub use engine::{CrawlEngine, CrawlSummary};
pub use error::CrawlError;
pub use extract::{AlignedExtraction, extract_level};
pub use fetch::{HttpFetcher, PageFetcher};
pub use scheduler::BranchScheduler;
pub use seeds::UrlTemplate;
pub use selector::{Aggregation, LevelSpec, Selector, SelectorKind, ValueSource};
pub use sink::RecordSink;
pub use utils::{USER_AGENTS, get_random_user_agent};
