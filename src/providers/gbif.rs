use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use super::{Sources, str_field, truncate_chars};
use crate::domain::{GbifKey, ScientificName};
use crate::fetch::HttpTransport;
use crate::schema::{PlantField, PlantProperties};

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const TAXONOMY_FIELDS: &[(&str, PlantField)] = &[
    ("kingdom", PlantField::Kingdom),
    ("phylum", PlantField::Phylum),
    ("class", PlantField::GbifClass),
    ("order", PlantField::GbifOrder),
    ("family", PlantField::Family),
    ("genus", PlantField::Genus),
    ("species", PlantField::Species),
];

const HABITAT_TYPES: &[&str] = &["habitat", "ecology", "distribution"];
const HABIT_TYPES: &[&str] = &["habit", "growth form", "life form"];

const HABITAT_TEXT_MAX: usize = 300;
const HABIT_TEXT_MAX: usize = 100;
const MIN_DESCRIPTION_LEN: usize = 5;
const MAX_HABITAT_NOTES: usize = 2;
const MAX_PEAK_MONTHS: usize = 3;
const MAX_STATES: usize = 20;

impl<T: HttpTransport> Sources<T> {
    pub fn gbif_taxonomy(&self, name: &ScientificName) -> PlantProperties {
        let url = format!("{}/species", self.endpoints.gbif);
        let query = [("name", name.binomial()), ("limit", "1".to_string())];
        self.fetch_json("gbif-taxonomy", &url, &query)
            .map(|data| gbif_taxonomy_properties(&data))
            .unwrap_or_default()
    }

    pub fn gbif_species_key(&self, name: &ScientificName) -> Option<GbifKey> {
        let url = format!("{}/species/match", self.endpoints.gbif);
        let query = [("name", name.binomial()), ("limit", "1".to_string())];
        let data = self.fetch_json("gbif-match", &url, &query)?;
        let key = species_key(&data);
        if key.is_none() {
            debug!(name = %name, "GBIF match returned no usable key");
        }
        key
    }

    pub fn gbif_descriptions(&self, key: GbifKey) -> PlantProperties {
        let url = format!("{}/species/{key}/descriptions", self.endpoints.gbif);
        self.fetch_json("gbif-descriptions", &url, &[])
            .map(|data| description_properties(&data))
            .unwrap_or_default()
    }

    pub fn gbif_phenology(&self, key: GbifKey) -> PlantProperties {
        let url = format!("{}/occurrence/search", self.endpoints.gbif);
        let query = [
            ("taxonKey", key.to_string()),
            ("country", self.phenology_country.clone()),
            ("limit", "0".to_string()),
            ("facet", "month".to_string()),
            ("facetLimit", "12".to_string()),
        ];
        self.fetch_json("gbif-phenology", &url, &query)
            .map(|data| phenology_properties(&data))
            .unwrap_or_default()
    }

    pub fn gbif_distributions(&self, key: GbifKey) -> PlantProperties {
        let url = format!("{}/species/{key}/distributions", self.endpoints.gbif);
        self.fetch_json("gbif-distributions", &url, &[])
            .map(|data| distribution_properties(&data))
            .unwrap_or_default()
    }
}

fn results(data: &Value) -> &[Value] {
    data.get("results")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

pub fn gbif_taxonomy_properties(data: &Value) -> PlantProperties {
    let mut props = PlantProperties::new();
    let Some(first) = results(data).first() else {
        return props;
    };
    for (key, field) in TAXONOMY_FIELDS {
        if let Some(value) = str_field(first, key) {
            props.set(*field, value);
        }
    }
    if let Some(vernacular) = str_field(first, "vernacularName") {
        props.set(PlantField::VernacularName, vernacular);
    }
    props
}

pub fn species_key(data: &Value) -> Option<GbifKey> {
    ["usageKey", "speciesKey"]
        .iter()
        .filter_map(|key| data.get(*key))
        .find_map(|value| match value {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        })
        .filter(|key| *key > 0)
        .map(GbifKey::new)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DescriptionBucket {
    Habitat,
    Habit,
}

fn classify_description(kind: &str) -> Option<DescriptionBucket> {
    let kind = kind.to_lowercase();
    // "habitat" contains "habit", so the habitat vocabulary is checked first
    if HABITAT_TYPES.iter().any(|word| kind.contains(word)) {
        Some(DescriptionBucket::Habitat)
    } else if HABIT_TYPES.iter().any(|word| kind.contains(word)) {
        Some(DescriptionBucket::Habit)
    } else {
        None
    }
}

pub fn description_properties(data: &Value) -> PlantProperties {
    let mut habitat_notes = Vec::new();
    let mut habit_notes = Vec::new();

    for description in results(data) {
        let Some(text) = str_field(description, "description") else {
            continue;
        };
        if text.chars().count() < MIN_DESCRIPTION_LEN {
            continue;
        }
        let kind = str_field(description, "type").unwrap_or_default();
        match classify_description(kind) {
            Some(DescriptionBucket::Habitat) => {
                habitat_notes.push(truncate_chars(text, HABITAT_TEXT_MAX))
            }
            Some(DescriptionBucket::Habit) => habit_notes.push(truncate_chars(text, HABIT_TEXT_MAX)),
            None => {}
        }
    }

    let mut props = PlantProperties::new();
    if !habitat_notes.is_empty() {
        let joined = habitat_notes
            .iter()
            .take(MAX_HABITAT_NOTES)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" | ");
        props.set(PlantField::HabitatNotes, joined);
    }
    if let Some(habit) = habit_notes.into_iter().next() {
        props.set(PlantField::GbifHabit, habit);
    }
    props
}

pub fn month_counts(data: &Value) -> Vec<(u32, u64)> {
    let mut counts: Vec<(u32, u64)> = Vec::new();
    let facets = data
        .get("facets")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for facet in facets {
        if facet.get("field").and_then(Value::as_str) != Some("MONTH") {
            continue;
        }
        let entries = facet
            .get("counts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for entry in entries {
            let month = match entry.get("name") {
                Some(Value::String(text)) => text.trim().parse::<u32>().ok(),
                Some(Value::Number(number)) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
                _ => None,
            };
            let count = entry.get("count").and_then(Value::as_u64);
            let (Some(month), Some(count)) = (month, count) else {
                continue;
            };
            if !(1..=12).contains(&month) {
                continue;
            }
            match counts.iter_mut().find(|(existing, _)| *existing == month) {
                Some(slot) => slot.1 = count,
                None => counts.push((month, count)),
            }
        }
    }
    counts
}

pub fn month_name(month: u32) -> Option<&'static str> {
    month
        .checked_sub(1)
        .and_then(|index| MONTH_NAMES.get(index as usize))
        .copied()
}

pub fn peak_months(counts: &[(u32, u64)]) -> Vec<&'static str> {
    let mut sorted = counts.to_vec();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));
    sorted
        .iter()
        .take(MAX_PEAK_MONTHS)
        .filter_map(|(month, _)| month_name(*month))
        .collect()
}

// Months whose count exceeds half the mean over reported months, in calendar order.
pub fn active_months(counts: &[(u32, u64)]) -> Vec<&'static str> {
    if counts.is_empty() {
        return Vec::new();
    }
    let total: u64 = counts.iter().map(|(_, count)| count).sum();
    let threshold = total as f64 / counts.len() as f64 * 0.5;
    let mut months = counts
        .iter()
        .filter(|(_, count)| *count as f64 > threshold)
        .map(|(month, _)| *month)
        .collect::<Vec<_>>();
    months.sort_unstable();
    months.into_iter().filter_map(month_name).collect()
}

pub fn phenology_properties(data: &Value) -> PlantProperties {
    let counts = month_counts(data);
    let mut props = PlantProperties::new();
    let peak = peak_months(&counts);
    if !peak.is_empty() {
        props.set(PlantField::PeakObservationMonths, peak.join(", "));
    }
    let active = active_months(&counts);
    if !active.is_empty() {
        props.set(PlantField::ActiveSeason, active.join(", "));
    }
    props
}

pub fn distribution_properties(data: &Value) -> PlantProperties {
    let mut props = PlantProperties::new();
    let mut states = BTreeSet::new();

    for distribution in results(data) {
        if !props.contains(PlantField::IucnThreatStatus) {
            if let Some(threat) = str_field(distribution, "threatStatus") {
                props.set(PlantField::IucnThreatStatus, threat);
            }
        }
        let location_id = str_field(distribution, "locationId").unwrap_or_default();
        if !location_id.starts_with("TDWG:") {
            continue;
        }
        if let Some(locality) = str_field(distribution, "locality") {
            states.insert(locality.to_string());
        }
    }

    if !states.is_empty() {
        let joined = states
            .into_iter()
            .take(MAX_STATES)
            .collect::<Vec<_>>()
            .join(", ");
        props.set(PlantField::UsStates, joined);
    }
    props
}
