pub mod commons;
pub mod gbif;
pub mod usda;
pub mod wikipedia;

use serde_json::Value;
use tracing::warn;

use crate::config::Endpoints;
use crate::fetch::{Fetcher, HttpTransport};

pub struct Sources<T: HttpTransport> {
    fetcher: Fetcher<T>,
    endpoints: Endpoints,
    phenology_country: String,
}

impl<T: HttpTransport> Sources<T> {
    pub fn new(fetcher: Fetcher<T>, endpoints: Endpoints, phenology_country: &str) -> Self {
        Self {
            fetcher,
            endpoints,
            phenology_country: phenology_country.to_string(),
        }
    }

    pub fn fetcher(&self) -> &Fetcher<T> {
        &self.fetcher
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn fetch_json(&self, source: &str, url: &str, query: &[(&str, String)]) -> Option<Value> {
        let response = self.fetcher.fetch(url, query)?;
        let parsed = response.json();
        if parsed.is_none() {
            warn!(source, url, "response body is not valid JSON");
        }
        parsed
    }
}

pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

pub(crate) fn str_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((index, _)) => text[..index].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate_chars("Acer–rubrum", 5), "Acer–");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn str_list_skips_blank_and_non_strings() {
        let value = serde_json::json!({"items": ["Tree", "", 3, " Shrub "]});
        assert_eq!(str_list(&value, "items"), vec!["Tree", "Shrub"]);
        assert!(str_list(&value, "missing").is_empty());
    }
}
