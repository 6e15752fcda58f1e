use scraper::Selector as CssSelector;

use crate::error::CrawlError;

/// Whether a selector's matches are followed as links or kept as output
/// fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    Redirection,
    Information,
}

/// Where the value of a matched element comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    Text,
    Attribute(String),
}

/// How a selector's matches map onto branch indices: one-to-one, or
/// collapsed into a single tab-joined value broadcast to every index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Separate,
    Combination,
}

/// One parsed extraction directive: `kind|source|aggregation|query`.
///
/// The CSS query is compiled once here so a bad query fails the run before
/// any network activity.
#[derive(Debug, Clone)]
pub struct Selector {
    kind: SelectorKind,
    source: ValueSource,
    aggregation: Aggregation,
    query: String,
    css: CssSelector,
}

impl Selector {
    /// Parses a `kind|source|aggregation|query` spec.
    ///
    /// `source` is either `text` or `attribute <name>`. Unknown enum tokens
    /// and wrong field counts are rejected immediately.
    pub fn parse(spec: &str) -> Result<Self, CrawlError> {
        let fields: Vec<&str> = spec.splitn(4, '|').collect();
        if fields.len() != 4 {
            return Err(CrawlError::config(format!(
                "selector `{spec}` must have four `|`-separated fields"
            )));
        }

        let kind = match fields[0].trim() {
            "redirection" => SelectorKind::Redirection,
            "information" => SelectorKind::Information,
            other => {
                return Err(CrawlError::config(format!(
                    "unknown selector kind `{other}` in `{spec}`"
                )));
            }
        };

        let source_field = fields[1].trim();
        let source = if source_field == "text" {
            ValueSource::Text
        } else if let Some(name) = source_field.strip_prefix("attribute ") {
            let name = name.trim();
            if name.is_empty() {
                return Err(CrawlError::config(format!(
                    "attribute source without a name in `{spec}`"
                )));
            }
            ValueSource::Attribute(name.to_string())
        } else {
            return Err(CrawlError::config(format!(
                "unknown value source `{source_field}` in `{spec}`"
            )));
        };

        let aggregation = match fields[2].trim() {
            "separate" => Aggregation::Separate,
            "combination" => Aggregation::Combination,
            other => {
                return Err(CrawlError::config(format!(
                    "unknown aggregation `{other}` in `{spec}`"
                )));
            }
        };

        if kind == SelectorKind::Redirection && aggregation == Aggregation::Combination {
            return Err(CrawlError::config(format!(
                "redirection selector `{spec}` must use separate aggregation"
            )));
        }

        let query = fields[3].trim().to_string();
        let css = CssSelector::parse(&query).map_err(|e| {
            CrawlError::config(format!("invalid CSS query `{query}`: {e}"))
        })?;

        Ok(Self {
            kind,
            source,
            aggregation,
            query,
            css,
        })
    }

    pub fn kind(&self) -> SelectorKind {
        self.kind
    }

    pub fn source(&self) -> &ValueSource {
        &self.source
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn css(&self) -> &CssSelector {
        &self.css
    }

    pub fn is_redirection(&self) -> bool {
        self.kind == SelectorKind::Redirection
    }
}

/// The ordered selectors applicable at one crawl depth.
///
/// Invariant: at most one redirection selector per level, checked here at
/// parse time.
#[derive(Debug, Clone)]
pub struct LevelSpec {
    selectors: Vec<Selector>,
    redirection: Option<usize>,
}

impl LevelSpec {
    /// Parses a comma-separated list of selector specs for one level.
    pub fn parse(spec: &str) -> Result<Self, CrawlError> {
        let mut selectors = Vec::new();
        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(CrawlError::config(format!(
                    "empty selector entry in level spec `{spec}`"
                )));
            }
            selectors.push(Selector::parse(part)?);
        }
        if selectors.is_empty() {
            return Err(CrawlError::config("level spec has no selectors"));
        }

        let mut redirection = None;
        for (index, selector) in selectors.iter().enumerate() {
            if selector.is_redirection() {
                if redirection.is_some() {
                    return Err(CrawlError::config(format!(
                        "level spec `{spec}` has more than one redirection selector"
                    )));
                }
                redirection = Some(index);
            }
        }

        Ok(Self {
            selectors,
            redirection,
        })
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    /// Index of the redirection selector, if this level branches.
    pub fn redirection_index(&self) -> Option<usize> {
        self.redirection
    }

    /// A terminal level emits completed records instead of branching.
    pub fn is_terminal(&self) -> bool {
        self.redirection.is_none()
    }
}
