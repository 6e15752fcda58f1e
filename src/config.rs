use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CrawlError;
use crate::seeds::UrlTemplate;
use crate::selector::LevelSpec;

/// What to do when a matched element lacks the attribute a selector asked
/// for: drop the value, or abandon the whole branch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum MissingAttrPolicy {
    Skip,
    #[default]
    Abandon,
}

fn default_concurrency() -> usize {
    8
}

fn default_output() -> PathBuf {
    PathBuf::from("results")
}

/// Declarative run configuration.
///
/// Loadable from a TOML file; individual fields can be overridden by CLI
/// flags. Level specs stay raw strings here and are compiled (and validated)
/// once by [`CrawlConfig::compile_levels`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// One comma-separated selector spec per crawl depth.
    pub levels: Vec<String>,

    /// Prefix for resolving relative redirection locators.
    #[serde(default)]
    pub domain: String,

    /// Maximum number of concurrently executing branches.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub missing_attribute: MissingAttrPolicy,

    /// Explicit start URLs.
    #[serde(default)]
    pub start_urls: Vec<String>,

    /// Optional URL template with `{field}` placeholders, expanded against
    /// `template_fields` into additional start URLs.
    #[serde(default)]
    pub url_template: Option<String>,

    #[serde(default)]
    pub template_fields: HashMap<String, Vec<String>>,

    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            levels: Vec::new(),
            domain: String::new(),
            concurrency: default_concurrency(),
            missing_attribute: MissingAttrPolicy::default(),
            start_urls: Vec::new(),
            url_template: None,
            template_fields: HashMap::new(),
            output: default_output(),
        }
    }
}

impl CrawlConfig {
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, CrawlError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&raw).map_err(|e| {
            CrawlError::config(format!(
                "failed to parse {}: {e}",
                path.as_ref().display()
            ))
        })
    }

    /// Parses every level spec, enforcing the structural invariants the
    /// engine relies on: at least one level, at most one redirection
    /// selector per level, a terminal last level and a positive
    /// concurrency limit. Fails before any network activity.
    pub fn compile_levels(&self) -> Result<Vec<LevelSpec>, CrawlError> {
        if self.levels.is_empty() {
            return Err(CrawlError::config("no level specs configured"));
        }
        if self.concurrency == 0 {
            return Err(CrawlError::config(
                "concurrency limit must be greater than 0",
            ));
        }

        let mut levels = Vec::with_capacity(self.levels.len());
        for (depth, spec) in self.levels.iter().enumerate() {
            let level = LevelSpec::parse(spec).map_err(|e| {
                CrawlError::config(format!("level {depth}: {e}"))
            })?;
            levels.push(level);
        }

        let last = levels.len() - 1;
        if !levels[last].is_terminal() {
            return Err(CrawlError::config(format!(
                "level {last} is the deepest level but has a redirection selector"
            )));
        }
        Ok(levels)
    }

    /// Explicit start URLs plus any produced by template expansion.
    pub fn resolve_start_urls(&self) -> Result<Vec<String>, CrawlError> {
        let mut urls = self.start_urls.clone();
        if let Some(template) = &self.url_template {
            let template = UrlTemplate::parse(template)?;
            urls.extend(template.expand(&self.template_fields)?);
        }
        if urls.is_empty() {
            return Err(CrawlError::config("no start URLs configured"));
        }
        Ok(urls)
    }
}
