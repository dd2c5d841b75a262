use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::CatalogueError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScientificName(String);

impl ScientificName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn binomial(&self) -> String {
        let parts = self.0.split_whitespace().collect::<Vec<_>>();
        if parts.len() >= 2 {
            parts[..2].join(" ")
        } else {
            self.0.clone()
        }
    }

    pub fn wiki_title(&self) -> String {
        let parts = self.0.split_whitespace().collect::<Vec<_>>();
        if parts.len() >= 2 {
            parts[..2].join("_")
        } else {
            parts.first().map(|part| part.to_string()).unwrap_or_default()
        }
    }

    pub fn file_stem(&self) -> String {
        self.0
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
            .take(30)
            .collect()
    }
}

impl fmt::Display for ScientificName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ScientificName {
    type Err = CatalogueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if normalized.is_empty() {
            return Err(CatalogueError::InvalidScientificName(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsdaSymbol(String);

impl UsdaSymbol {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UsdaSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UsdaSymbol {
    type Err = CatalogueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        let is_valid =
            !normalized.is_empty() && normalized.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !is_valid {
            return Err(CatalogueError::InvalidUsdaSymbol(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GbifKey(u64);

impl GbifKey {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for GbifKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GbifKey {
    type Err = CatalogueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| CatalogueError::InvalidGbifKey(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Trees,
    Shrubs,
    Vines,
    WildflowersAndHerbs,
    GrassesAndSedges,
    Ferns,
    MossesAndLiverworts,
    Lichens,
    Other,
}

// Ordered: the first habit contained in the growth habit string wins.
pub const CATEGORY_MAP: &[(&str, Category)] = &[
    ("Tree", Category::Trees),
    ("Shrub", Category::Shrubs),
    ("Subshrub", Category::Shrubs),
    ("Vine", Category::Vines),
    ("Forb/herb", Category::WildflowersAndHerbs),
    ("Graminoid", Category::GrassesAndSedges),
    ("Fern", Category::Ferns),
    ("Nonvascular", Category::MossesAndLiverworts),
    ("Lichenous", Category::Lichens),
];

impl Category {
    pub fn from_growth_habit(growth_habit: Option<&str>) -> Self {
        let Some(habit) = growth_habit.filter(|habit| !habit.is_empty()) else {
            return Category::Other;
        };
        let habit = habit.to_lowercase();
        CATEGORY_MAP
            .iter()
            .find(|(key, _)| habit.contains(&key.to_lowercase()))
            .map(|(_, category)| *category)
            .unwrap_or(Category::Other)
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        let slug = slug.trim().to_lowercase();
        CATEGORY_MAP
            .iter()
            .map(|(_, category)| *category)
            .chain(std::iter::once(Category::Other))
            .find(|category| category.slug() == slug)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Category::Trees => "Trees",
            Category::Shrubs => "Shrubs",
            Category::Vines => "Vines",
            Category::WildflowersAndHerbs => "Wildflowers & Herbs",
            Category::GrassesAndSedges => "Grasses & Sedges",
            Category::Ferns => "Ferns",
            Category::MossesAndLiverworts => "Mosses & Liverworts",
            Category::Lichens => "Lichens",
            Category::Other => "Other",
        }
    }

    pub fn slug(&self) -> String {
        self.name()
            .to_lowercase()
            .replace(' ', "-")
            .replace('&', "and")
    }

    pub fn exemplar_symbol(&self) -> Option<&'static str> {
        match self {
            Category::Trees => Some("ACRU"),
            Category::Shrubs => Some("COCO6"),
            Category::Vines => Some("LOJA"),
            Category::WildflowersAndHerbs => Some("ECAN4"),
            Category::GrassesAndSedges => Some("ANGE"),
            Category::Ferns => Some("OSRE2"),
            Category::MossesAndLiverworts => Some("ANSP"),
            Category::Lichens | Category::Other => None,
        }
    }

    pub fn growth_habits(&self) -> Vec<&'static str> {
        CATEGORY_MAP
            .iter()
            .filter(|(_, category)| category == self)
            .map(|(habit, _)| *habit)
            .collect()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentPass {
    Usda,
    Characteristics,
    Scrape,
}

impl fmt::Display for EnrichmentPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrichmentPass::Usda => write!(f, "usda"),
            EnrichmentPass::Characteristics => write!(f, "characteristics"),
            EnrichmentPass::Scrape => write!(f, "scrape"),
        }
    }
}

impl FromStr for EnrichmentPass {
    type Err = CatalogueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "usda" => Ok(EnrichmentPass::Usda),
            "characteristics" => Ok(EnrichmentPass::Characteristics),
            "scrape" => Ok(EnrichmentPass::Scrape),
            _ => Err(CatalogueError::UnknownPass(value.to_string())),
        }
    }
}
