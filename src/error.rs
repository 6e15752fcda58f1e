use thiserror::Error;

/// Errors raised while configuring or running a crawl.
///
/// `Config` is always fatal to the whole run; the remaining variants are
/// scoped to a single branch or page and abandon only that branch.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Malformed selector spec, more than one redirection selector in a
    /// level, or a crawl depth exceeding the configured levels.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Network or HTTP-status fault while fetching a page.
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Row-length mismatch while aligning a level's extraction.
    #[error("inconsistent row length for `{query}`: got {got}, expected {expected}")]
    Validation {
        query: String,
        got: usize,
        expected: usize,
    },

    /// A matched element lacked the attribute a selector asked for.
    #[error("attribute `{name}` missing on element matched by `{query}`")]
    MissingAttribute { name: String, query: String },

    #[error("output write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl CrawlError {
    pub fn config(msg: impl Into<String>) -> Self {
        CrawlError::Config(msg.into())
    }

    /// Whether this error must abort the whole run rather than one branch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CrawlError::Config(_))
    }
}
