use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

// Key property of a plant node. Never written by enrichment.
pub const KEY_FIELD: &str = "scientific_name";

const MAX_FIELD_NAME_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlantField {
    // identity, written by bootstrap ingestion
    CommonName,
    NativeStatus,
    County,
    UsdaSymbol,
    SynonymSymbol,
    // USDA PlantProfile
    GrowthHabits,
    GrowthHabitPrimary,
    Duration,
    PlantGroup,
    Rank,
    UsdaImageFilename,
    Kingdom,
    Subkingdom,
    Division,
    TaxClass,
    TaxOrder,
    Family,
    Genus,
    HasWildlifeValue,
    HasPollinatorValue,
    HasWetlandData,
    // GBIF
    Phylum,
    GbifClass,
    GbifOrder,
    Species,
    VernacularName,
    GbifKey,
    HabitatNotes,
    GbifHabit,
    PeakObservationMonths,
    ActiveSeason,
    IucnThreatStatus,
    UsStates,
    // Wikipedia
    WikiSummary,
    HeightM,
}

impl PlantField {
    pub const ALL: &'static [PlantField] = &[
        PlantField::CommonName,
        PlantField::NativeStatus,
        PlantField::County,
        PlantField::UsdaSymbol,
        PlantField::SynonymSymbol,
        PlantField::GrowthHabits,
        PlantField::GrowthHabitPrimary,
        PlantField::Duration,
        PlantField::PlantGroup,
        PlantField::Rank,
        PlantField::UsdaImageFilename,
        PlantField::Kingdom,
        PlantField::Subkingdom,
        PlantField::Division,
        PlantField::TaxClass,
        PlantField::TaxOrder,
        PlantField::Family,
        PlantField::Genus,
        PlantField::HasWildlifeValue,
        PlantField::HasPollinatorValue,
        PlantField::HasWetlandData,
        PlantField::Phylum,
        PlantField::GbifClass,
        PlantField::GbifOrder,
        PlantField::Species,
        PlantField::VernacularName,
        PlantField::GbifKey,
        PlantField::HabitatNotes,
        PlantField::GbifHabit,
        PlantField::PeakObservationMonths,
        PlantField::ActiveSeason,
        PlantField::IucnThreatStatus,
        PlantField::UsStates,
        PlantField::WikiSummary,
        PlantField::HeightM,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlantField::CommonName => "common_name",
            PlantField::NativeStatus => "native_status",
            PlantField::County => "county",
            PlantField::UsdaSymbol => "usda_symbol",
            PlantField::SynonymSymbol => "synonym_symbol",
            PlantField::GrowthHabits => "growth_habits",
            PlantField::GrowthHabitPrimary => "growth_habit_primary",
            PlantField::Duration => "duration",
            PlantField::PlantGroup => "plant_group",
            PlantField::Rank => "rank",
            PlantField::UsdaImageFilename => "usda_image_filename",
            PlantField::Kingdom => "kingdom",
            PlantField::Subkingdom => "subkingdom",
            PlantField::Division => "division",
            PlantField::TaxClass => "tax_class",
            PlantField::TaxOrder => "tax_order",
            PlantField::Family => "family",
            PlantField::Genus => "genus",
            PlantField::HasWildlifeValue => "has_wildlife_value",
            PlantField::HasPollinatorValue => "has_pollinator_value",
            PlantField::HasWetlandData => "has_wetland_data",
            PlantField::Phylum => "phylum",
            PlantField::GbifClass => "gbif_class",
            PlantField::GbifOrder => "gbif_order",
            PlantField::Species => "species",
            PlantField::VernacularName => "vernacular_name",
            PlantField::GbifKey => "gbif_key",
            PlantField::HabitatNotes => "habitat_notes",
            PlantField::GbifHabit => "gbif_habit",
            PlantField::PeakObservationMonths => "peak_observation_months",
            PlantField::ActiveSeason => "active_season",
            PlantField::IucnThreatStatus => "iucn_threat_status",
            PlantField::UsStates => "us_states",
            PlantField::WikiSummary => "wiki_summary",
            PlantField::HeightM => "height_m",
        }
    }
}

impl fmt::Display for PlantField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlantField {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        PlantField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == value)
            .ok_or(())
    }
}

impl Serialize for PlantField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

pub fn sanitize_field_name(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .take(MAX_FIELD_NAME_LEN)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlantProperties {
    fields: BTreeMap<PlantField, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    extra: BTreeMap<String, String>,
}

impl PlantProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: PlantField, value: impl Into<String>) {
        self.fields.insert(field, value.into());
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        if let Ok(field) = name.parse::<PlantField>() {
            self.set(field, value);
            return;
        }
        let safe = sanitize_field_name(name);
        if safe.is_empty() || safe == KEY_FIELD {
            return;
        }
        if let Ok(field) = safe.parse::<PlantField>() {
            self.set(field, value);
        } else {
            self.extra.insert(safe, value.into());
        }
    }

    pub fn get(&self, field: PlantField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn get_extra(&self, name: &str) -> Option<&str> {
        self.extra.get(name).map(String::as_str)
    }

    pub fn contains(&self, field: PlantField) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.extra.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len() + self.extra.len()
    }

    pub fn merge(&mut self, other: PlantProperties) {
        self.fields.extend(other.fields);
        self.extra.extend(other.extra);
    }

    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|(name, _)| name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(field, value)| (field.as_str(), value.as_str()))
            .chain(
                self.extra
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_str())),
            )
    }
}
