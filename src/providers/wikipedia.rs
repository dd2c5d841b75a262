use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{Sources, truncate_chars};
use crate::domain::ScientificName;
use crate::fetch::HttpTransport;
use crate::schema::{PlantField, PlantProperties};

pub const MIN_SUMMARY_LEN: usize = 50;
pub const MAX_SUMMARY_LEN: usize = 1000;

static HEIGHT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+[-–]\d+|\d+)\s*m\s*(?:tall|high|in height)")
        .expect("height pattern is valid")
});

impl<T: HttpTransport> Sources<T> {
    pub fn wikipedia_summary(&self, name: &ScientificName) -> PlantProperties {
        let title = name.wiki_title();
        if title.is_empty() {
            return PlantProperties::new();
        }
        let url = format!("{}/page/summary/{title}", self.endpoints.wikipedia);
        self.fetch_json("wikipedia", &url, &[])
            .map(|data| wikipedia_properties(&data))
            .unwrap_or_default()
    }
}

pub fn wikipedia_properties(data: &Value) -> PlantProperties {
    let mut props = PlantProperties::new();
    if data.get("type").and_then(Value::as_str) == Some("disambiguation") {
        return props;
    }
    let extract = data
        .get("extract")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if extract.chars().count() <= MIN_SUMMARY_LEN {
        return props;
    }
    props.set(
        PlantField::WikiSummary,
        truncate_chars(extract, MAX_SUMMARY_LEN),
    );
    if let Some(height) = extract_height(extract) {
        props.set(PlantField::HeightM, height);
    }
    props
}

pub fn extract_height(text: &str) -> Option<&str> {
    HEIGHT_PATTERN.find(text).map(|found| found.as_str())
}
