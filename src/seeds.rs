use std::collections::HashMap;

use regex::Regex;

use crate::error::CrawlError;

/// A URL pattern with `{field}` placeholders, expanded against per-field
/// value lists into the cartesian product of start URLs.
#[derive(Debug, Clone)]
pub struct UrlTemplate {
    template: String,
    fields: Vec<String>,
}

impl UrlTemplate {
    pub fn parse(template: &str) -> Result<Self, CrawlError> {
        let placeholder = Regex::new(r"\{([^{}]*)\}")
            .map_err(|e| CrawlError::config(format!("placeholder pattern: {e}")))?;

        let mut fields = Vec::new();
        for capture in placeholder.captures_iter(template) {
            let name = capture[1].to_string();
            if name.is_empty() {
                return Err(CrawlError::config(format!(
                    "empty placeholder in url template `{template}`"
                )));
            }
            if !fields.contains(&name) {
                fields.push(name);
            }
        }
        if fields.is_empty() {
            return Err(CrawlError::config(format!(
                "url template `{template}` has no placeholders"
            )));
        }

        Ok(Self {
            template: template.to_string(),
            fields,
        })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Substitutes every combination of field values into the template.
    /// Spaces in values are encoded as `+`.
    pub fn expand(
        &self,
        values: &HashMap<String, Vec<String>>,
    ) -> Result<Vec<String>, CrawlError> {
        for field in &self.fields {
            match values.get(field) {
                None => {
                    return Err(CrawlError::config(format!(
                        "no values configured for template field `{field}`"
                    )));
                }
                Some(list) if list.is_empty() => {
                    return Err(CrawlError::config(format!(
                        "template field `{field}` has an empty value list"
                    )));
                }
                Some(_) => {}
            }
        }

        let mut urls = vec![self.template.clone()];
        for field in &self.fields {
            let marker = format!("{{{field}}}");
            let mut next = Vec::new();
            for partial in &urls {
                for value in &values[field] {
                    let encoded = value.replace(' ', "+");
                    next.push(partial.replace(&marker, &encoded));
                }
            }
            urls = next;
        }
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(name, list)| {
                (
                    name.to_string(),
                    list.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_fields_found_in_order() {
        let template =
            UrlTemplate::parse("https://example.com/{city}/jobs?page={page}").unwrap();
        assert_eq!(template.fields(), ["city", "page"]);
    }

    #[test]
    fn test_expansion_is_cartesian_product() {
        let template =
            UrlTemplate::parse("https://example.com/{city}/jobs?page={page}").unwrap();
        let urls = template
            .expand(&values(&[("city", &["nyc", "boston"]), ("page", &["1", "2", "3"])]))
            .unwrap();
        assert_eq!(urls.len(), 6);
        assert!(urls.contains(&"https://example.com/boston/jobs?page=3".to_string()));
    }

    #[test]
    fn test_spaces_become_plus() {
        let template = UrlTemplate::parse("https://example.com/{city}").unwrap();
        let urls = template.expand(&values(&[("city", &["new york"])])).unwrap();
        assert_eq!(urls, ["https://example.com/new+york"]);
    }

    #[test]
    fn test_repeated_placeholder_expands_once_per_combination() {
        let template = UrlTemplate::parse("https://{host}.example.com/{host}").unwrap();
        let urls = template.expand(&values(&[("host", &["a", "b"])])).unwrap();
        assert_eq!(
            urls,
            ["https://a.example.com/a", "https://b.example.com/b"]
        );
    }

    #[test]
    fn test_missing_field_values_rejected() {
        let template = UrlTemplate::parse("https://example.com/{city}").unwrap();
        assert!(template.expand(&HashMap::new()).is_err());
    }

    #[test]
    fn test_template_without_placeholders_rejected() {
        assert!(UrlTemplate::parse("https://example.com/jobs").is_err());
    }
}
