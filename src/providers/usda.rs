use serde_json::Value;
use tracing::debug;

use super::{Sources, str_field, str_list};
use crate::domain::UsdaSymbol;
use crate::fetch::HttpTransport;
use crate::schema::{PlantField, PlantProperties};

const ANCESTOR_RANKS: &[(&str, PlantField)] = &[
    ("kingdom", PlantField::Kingdom),
    ("subkingdom", PlantField::Subkingdom),
    ("division", PlantField::Division),
    ("class", PlantField::TaxClass),
    ("order", PlantField::TaxOrder),
    ("family", PlantField::Family),
    ("genus", PlantField::Genus),
];

const FLAGS: &[(&str, PlantField)] = &[
    ("HasWildlife", PlantField::HasWildlifeValue),
    ("HasPollinator", PlantField::HasPollinatorValue),
    ("HasWetlandData", PlantField::HasWetlandData),
];

impl<T: HttpTransport> Sources<T> {
    pub fn usda_profile(&self, symbol: &UsdaSymbol) -> PlantProperties {
        let query = [("symbol", symbol.as_str().to_string())];
        let Some(data) = self.fetch_json("usda", &self.endpoints.usda, &query) else {
            debug!(symbol = %symbol, "no USDA profile");
            return PlantProperties::new();
        };
        usda_properties(&data)
    }
}

// Maps a USDA PlantProfile document. The three capability flags are always
// emitted (`"False"` when missing); every other field only when present.
pub fn usda_properties(data: &Value) -> PlantProperties {
    let mut props = PlantProperties::new();
    if !data.is_object() {
        return props;
    }

    let habits = str_list(data, "GrowthHabits");
    if let Some(primary) = habits.first() {
        props.set(PlantField::GrowthHabitPrimary, primary.clone());
        props.set(PlantField::GrowthHabits, habits.join(", "));
    }

    let durations = str_list(data, "Durations");
    if !durations.is_empty() {
        props.set(PlantField::Duration, durations.join(", "));
    }

    if let Some(group) = str_field(data, "Group") {
        props.set(PlantField::PlantGroup, group);
    }
    if let Some(rank) = str_field(data, "Rank") {
        props.set(PlantField::Rank, rank);
    }
    if let Some(filename) = str_field(data, "ProfileImageFilename") {
        props.set(PlantField::UsdaImageFilename, filename);
    }

    let ancestors = data
        .get("Ancestors")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for ancestor in ancestors {
        let rank = str_field(ancestor, "Rank")
            .map(str::to_lowercase)
            .unwrap_or_default();
        let Some((_, field)) = ANCESTOR_RANKS.iter().find(|(label, _)| *label == rank) else {
            continue;
        };
        if let Some(symbol) = str_field(ancestor, "Symbol") {
            props.set(*field, symbol);
        }
    }

    for (key, field) in FLAGS {
        props.set(*field, flag_string(data.get(*key)));
    }

    props
}

fn flag_string(value: Option<&Value>) -> &'static str {
    let truthy = match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => matches!(text.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
        Some(Value::Number(number)) => number.as_f64().map(|n| n != 0.0).unwrap_or(false),
        _ => false,
    };
    if truthy { "True" } else { "False" }
}
