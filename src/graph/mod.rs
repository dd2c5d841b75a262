pub mod memory;
pub mod neo4j;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{Category, EnrichmentPass, GbifKey, ScientificName, UsdaSymbol};
use crate::error::CatalogueError;
use crate::query::PlantQuery;
use crate::schema::{KEY_FIELD, PlantField, PlantProperties};

pub use memory::MemoryGraph;
pub use neo4j::Neo4jGraph;

pub const DEFAULT_RELATED_LIMIT: u64 = 6;
pub const RECENT_PLANTS: usize = 5;

pub type PropertyMap = BTreeMap<String, String>;

pub trait PlantStore {
    fn pending_plants(&self, pass: EnrichmentPass) -> Result<Vec<PlantRecord>, CatalogueError>;

    fn update_plant(
        &self,
        name: &ScientificName,
        props: &PlantProperties,
    ) -> Result<(), CatalogueError>;

    fn store_image(&self, name: &ScientificName, image: &ImageRecord)
    -> Result<(), CatalogueError>;

    fn list_plants(&self, query: &PlantQuery) -> Result<PlantPage, CatalogueError>;

    fn plant_detail(&self, name: &str) -> Result<Option<PlantDetail>, CatalogueError>;

    fn related_plants(
        &self,
        name: &str,
        limit: u64,
    ) -> Result<Option<Vec<RelatedPlant>>, CatalogueError>;

    fn progress_counts(&self) -> Result<ProgressCounts, CatalogueError>;

    fn catalogue_stats(&self) -> Result<CatalogueStats, CatalogueError>;

    fn habit_counts(&self) -> Result<Vec<(String, u64)>, CatalogueError>;

    fn exemplar_image(&self, symbol: &str) -> Result<Option<String>, CatalogueError>;

    fn scrape_progress(&self) -> Result<ScrapeProgress, CatalogueError> {
        self.progress_counts().map(ScrapeProgress::from_counts)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlantRecord {
    pub scientific_name: ScientificName,
    pub usda_symbol: Option<UsdaSymbol>,
    pub common_name: Option<String>,
    pub gbif_key: Option<GbifKey>,
}

impl PlantRecord {
    pub fn new(scientific_name: ScientificName) -> Self {
        Self {
            scientific_name,
            usda_symbol: None,
            common_name: None,
            gbif_key: None,
        }
    }

    pub fn from_properties(props: &PropertyMap) -> Option<Self> {
        let scientific_name = props.get(KEY_FIELD)?.parse::<ScientificName>().ok()?;
        let field = |field: PlantField| props.get(field.as_str()).map(String::as_str);
        Some(Self {
            scientific_name,
            usda_symbol: field(PlantField::UsdaSymbol).and_then(|symbol| symbol.parse().ok()),
            common_name: field(PlantField::CommonName)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            gbif_key: field(PlantField::GbifKey).and_then(|key| key.parse().ok()),
        })
    }
}

pub fn is_pending(pass: EnrichmentPass, props: &PropertyMap) -> bool {
    let present = |field: PlantField| props.contains_key(field.as_str());
    match pass {
        EnrichmentPass::Usda => {
            props
                .get(PlantField::UsdaSymbol.as_str())
                .is_some_and(|symbol| !symbol.trim().is_empty())
                && !present(PlantField::GrowthHabitPrimary)
        }
        EnrichmentPass::Characteristics => !present(PlantField::WikiSummary),
        EnrichmentPass::Scrape => true,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    pub url: String,
    pub local_path: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlantSummary {
    pub scientific_name: String,
    pub common_name: Option<String>,
    pub native_status: Option<String>,
    pub growth_habit: Option<String>,
    pub category: String,
    pub family: Option<String>,
    pub phylum: Option<String>,
    pub tax_class: Option<String>,
    pub usda_symbol: Option<String>,
    pub duration: Option<String>,
    pub plant_group: Option<String>,
    pub thumbnail: Option<String>,
}

impl PlantSummary {
    pub fn from_properties(props: &PropertyMap, thumbnail: Option<String>) -> Self {
        let field = |field: PlantField| props.get(field.as_str()).cloned();
        let growth_habit = field(PlantField::GrowthHabitPrimary);
        Self {
            scientific_name: props.get(KEY_FIELD).cloned().unwrap_or_default(),
            common_name: field(PlantField::CommonName),
            native_status: field(PlantField::NativeStatus),
            category: Category::from_growth_habit(growth_habit.as_deref()).to_string(),
            growth_habit,
            family: field(PlantField::Family),
            phylum: field(PlantField::Phylum),
            tax_class: field(PlantField::GbifClass),
            usda_symbol: field(PlantField::UsdaSymbol),
            duration: field(PlantField::Duration),
            plant_group: field(PlantField::PlantGroup),
            thumbnail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlantPage {
    pub plants: Vec<PlantSummary>,
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlantDetail {
    pub plant: PropertyMap,
    pub images: Vec<ImageRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedPlant {
    pub scientific_name: String,
    pub common_name: Option<String>,
    pub growth_habit: Option<String>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentPlant {
    pub name: String,
    pub habit: Option<String>,
    pub family: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressCounts {
    pub total: u64,
    pub usda_enriched: u64,
    pub gbif_enriched: u64,
    pub with_images: u64,
    pub total_images: u64,
    pub recent: Vec<RecentPlant>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapeProgress {
    pub total_plants: u64,
    pub usda_enriched: u64,
    pub usda_percent: f64,
    pub gbif_enriched: u64,
    pub gbif_percent: f64,
    pub plants_with_images: u64,
    pub images_percent: f64,
    pub total_images_downloaded: u64,
    pub complete: bool,
    pub recent_plants: Vec<RecentPlant>,
}

impl ScrapeProgress {
    pub fn from_counts(counts: ProgressCounts) -> Self {
        Self {
            total_plants: counts.total,
            usda_enriched: counts.usda_enriched,
            usda_percent: percent(counts.usda_enriched, counts.total),
            gbif_enriched: counts.gbif_enriched,
            gbif_percent: percent(counts.gbif_enriched, counts.total),
            plants_with_images: counts.with_images,
            images_percent: percent(counts.with_images, counts.total),
            total_images_downloaded: counts.total_images,
            complete: counts.usda_enriched >= counts.total,
            recent_plants: counts.recent,
        }
    }
}

pub fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogueStats {
    pub total_plants: u64,
    pub native_plants: u64,
    pub introduced_plants: u64,
    pub plants_with_images: u64,
    pub unique_families: u64,
}
