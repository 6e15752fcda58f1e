use scraper::Html;

use crate::config::MissingAttrPolicy;
use crate::error::CrawlError;
use crate::selector::{Aggregation, LevelSpec, Selector, ValueSource};

/// All rows of one level forced to a common width, with the redirection row
/// (if any) flagged.
///
/// Row index `i` denotes the same document-order match position across every
/// selector of the level; that positional correspondence is what lets
/// fragments be recombined into records.
#[derive(Debug)]
pub struct AlignedExtraction {
    rows: Vec<Vec<String>>,
    redirection: Option<usize>,
    width: usize,
}

impl AlignedExtraction {
    /// The common row length *L* of this level.
    pub fn width(&self) -> usize {
        self.width
    }

    /// The aligned redirection row, when this level branches.
    pub fn redirection_row(&self) -> Option<&[String]> {
        self.redirection.map(|i| self.rows[i].as_slice())
    }

    /// Column `i` of the information rows, in selector declaration order.
    /// This is the contribution of branch index `i` at this level.
    pub fn fragment(&self, i: usize) -> Vec<String> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != self.redirection)
            .map(|(_, row)| row[i].clone())
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

/// Applies one level's selectors to a parsed page, producing an aligned,
/// validated extraction.
pub fn extract_level(
    doc: &Html,
    level: &LevelSpec,
    missing: MissingAttrPolicy,
) -> Result<AlignedExtraction, CrawlError> {
    let mut rows = Vec::with_capacity(level.selectors().len());
    for selector in level.selectors() {
        rows.push(harvest(doc, selector, missing)?);
    }

    // All separate rows (the redirection row included) must agree on one
    // length, which becomes the target width. Combination-only levels have
    // width 1.
    let mut consensus: Option<(usize, &str)> = None;
    for (selector, row) in level.selectors().iter().zip(&rows) {
        if selector.aggregation() == Aggregation::Separate {
            match consensus {
                None => consensus = Some((row.len(), selector.query())),
                Some((expected, _)) if expected != row.len() => {
                    return Err(CrawlError::Validation {
                        query: selector.query().to_string(),
                        got: row.len(),
                        expected,
                    });
                }
                Some(_) => {}
            }
        }
    }
    let width = consensus.map(|(len, _)| len).unwrap_or(1);
    if width == 0 {
        let (_, query) = consensus.unwrap_or((0, ""));
        return Err(CrawlError::Validation {
            query: query.to_string(),
            got: 0,
            expected: 1,
        });
    }

    // Broadcast single-value rows (combination output) to the target width.
    for row in &mut rows {
        if row.len() == 1 && width != 1 {
            let value = row[0].clone();
            row.resize(width, value);
        }
    }

    for (selector, row) in level.selectors().iter().zip(&rows) {
        if row.len() != width {
            return Err(CrawlError::Validation {
                query: selector.query().to_string(),
                got: row.len(),
                expected: width,
            });
        }
    }

    Ok(AlignedExtraction {
        rows,
        redirection: level.redirection_index(),
        width,
    })
}

/// Pulls one selector's values off the page in document order, applying the
/// combination tab-join when asked for.
fn harvest(
    doc: &Html,
    selector: &Selector,
    missing: MissingAttrPolicy,
) -> Result<Vec<String>, CrawlError> {
    let mut values = Vec::new();
    for element in doc.select(selector.css()) {
        match selector.source() {
            ValueSource::Text => {
                let text: String = element.text().collect();
                values.push(text.trim().to_string());
            }
            ValueSource::Attribute(name) => match element.value().attr(name) {
                Some(value) => values.push(value.to_string()),
                None => match missing {
                    MissingAttrPolicy::Skip => continue,
                    MissingAttrPolicy::Abandon => {
                        return Err(CrawlError::MissingAttribute {
                            name: name.clone(),
                            query: selector.query().to_string(),
                        });
                    }
                },
            },
        }
    }

    if selector.aggregation() == Aggregation::Combination {
        // A zero-match combination row still contributes a field; an empty
        // placeholder keeps it broadcastable against nonzero separate rows.
        if values.is_empty() {
            return Ok(vec![String::new()]);
        }
        return Ok(vec![values.join("\t")]);
    }
    Ok(values)
}
