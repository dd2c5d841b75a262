use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{
    CatalogueStats, ImageRecord, PlantDetail, PlantPage, PlantRecord, PlantStore, PlantSummary,
    ProgressCounts, PropertyMap, RECENT_PLANTS, RecentPlant, RelatedPlant, is_pending,
};
use crate::domain::{EnrichmentPass, ScientificName};
use crate::error::CatalogueError;
use crate::query::PlantQuery;
use crate::schema::{KEY_FIELD, PlantField, PlantProperties};

#[derive(Debug, Default)]
struct State {
    plants: BTreeMap<String, PropertyMap>,
    images: BTreeMap<String, ImageRecord>,
    edges: BTreeSet<(String, String)>,
    failing: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct MemoryGraph {
    state: Mutex<State>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_plant(&self, name: &str, props: &[(&str, &str)]) {
        let mut map = props
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<PropertyMap>();
        map.insert(KEY_FIELD.to_string(), name.to_string());
        self.state().plants.insert(name.to_string(), map);
    }

    pub fn plant_properties(&self, name: &str) -> Option<PropertyMap> {
        self.state().plants.get(name).cloned()
    }

    pub fn image_count(&self) -> usize {
        self.state().images.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.state().edges.len()
    }

    pub fn images_of(&self, name: &str) -> Vec<ImageRecord> {
        let state = self.state();
        images_of(&state, name)
    }

    pub fn fail_writes_for(&self, name: &str) {
        self.state().failing.insert(name.to_string());
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn images_of(state: &State, name: &str) -> Vec<ImageRecord> {
    state
        .edges
        .iter()
        .filter(|(plant, _)| plant == name)
        .filter_map(|(_, url)| state.images.get(url).cloned())
        .collect()
}

fn thumbnail(state: &State, name: &str) -> Option<String> {
    state
        .edges
        .iter()
        .find(|(plant, _)| plant == name)
        .map(|(_, url)| url.clone())
}

fn check_writable(state: &State, name: &ScientificName) -> Result<(), CatalogueError> {
    if state.failing.contains(name.as_str()) {
        return Err(CatalogueError::Store(format!("write rejected for {name}")));
    }
    Ok(())
}

impl PlantStore for MemoryGraph {
    fn pending_plants(&self, pass: EnrichmentPass) -> Result<Vec<PlantRecord>, CatalogueError> {
        let state = self.state();
        Ok(state
            .plants
            .values()
            .filter(|props| is_pending(pass, props))
            .filter_map(PlantRecord::from_properties)
            .collect())
    }

    fn update_plant(
        &self,
        name: &ScientificName,
        props: &PlantProperties,
    ) -> Result<(), CatalogueError> {
        if props.is_empty() {
            return Ok(());
        }
        let mut state = self.state();
        check_writable(&state, name)?;
        if let Some(plant) = state.plants.get_mut(name.as_str()) {
            for (key, value) in props.iter() {
                plant.insert(key.to_string(), value.to_string());
            }
        }
        Ok(())
    }

    fn store_image(
        &self,
        name: &ScientificName,
        image: &ImageRecord,
    ) -> Result<(), CatalogueError> {
        let mut state = self.state();
        check_writable(&state, name)?;
        if !state.plants.contains_key(name.as_str()) {
            return Ok(());
        }
        state.images.insert(image.url.clone(), image.clone());
        state
            .edges
            .insert((name.as_str().to_string(), image.url.clone()));
        Ok(())
    }

    fn list_plants(&self, query: &PlantQuery) -> Result<PlantPage, CatalogueError> {
        let state = self.state();
        let matching = state
            .plants
            .iter()
            .filter(|(_, props)| query.matches(props))
            .collect::<Vec<_>>();
        let plants = matching
            .iter()
            .skip(query.skip as usize)
            .take(query.limit as usize)
            .map(|(name, props)| PlantSummary::from_properties(props, thumbnail(&state, name)))
            .collect();
        Ok(PlantPage {
            plants,
            total: matching.len() as u64,
            skip: query.skip,
            limit: query.limit,
        })
    }

    fn plant_detail(&self, name: &str) -> Result<Option<PlantDetail>, CatalogueError> {
        let state = self.state();
        Ok(state.plants.get(name).map(|plant| PlantDetail {
            plant: plant.clone(),
            images: images_of(&state, name),
        }))
    }

    fn related_plants(
        &self,
        name: &str,
        limit: u64,
    ) -> Result<Option<Vec<RelatedPlant>>, CatalogueError> {
        let state = self.state();
        let Some(plant) = state.plants.get(name) else {
            return Ok(None);
        };
        let family = plant.get(PlantField::Family.as_str());
        let habit = plant.get(PlantField::GrowthHabitPrimary.as_str());
        let shares = |own: Option<&String>, other: Option<&String>| {
            own.is_some_and(|own| !own.is_empty() && Some(own) == other)
        };
        let related = state
            .plants
            .iter()
            .filter(|(other, _)| other.as_str() != name)
            .filter(|(_, props)| {
                shares(family, props.get(PlantField::Family.as_str()))
                    || shares(habit, props.get(PlantField::GrowthHabitPrimary.as_str()))
            })
            .take(limit as usize)
            .map(|(other, props)| RelatedPlant {
                scientific_name: other.clone(),
                common_name: props.get(PlantField::CommonName.as_str()).cloned(),
                growth_habit: props.get(PlantField::GrowthHabitPrimary.as_str()).cloned(),
                thumbnail: thumbnail(&state, other),
            })
            .collect();
        Ok(Some(related))
    }

    fn progress_counts(&self) -> Result<ProgressCounts, CatalogueError> {
        let state = self.state();
        let has = |props: &PropertyMap, field: PlantField| props.contains_key(field.as_str());
        let with_images = state
            .edges
            .iter()
            .map(|(plant, _)| plant)
            .collect::<BTreeSet<_>>()
            .len();
        let recent = state
            .plants
            .values()
            .rev()
            .filter(|props| has(props, PlantField::GrowthHabitPrimary))
            .take(RECENT_PLANTS)
            .map(|props| RecentPlant {
                name: props.get(KEY_FIELD).cloned().unwrap_or_default(),
                habit: props.get(PlantField::GrowthHabitPrimary.as_str()).cloned(),
                family: props.get(PlantField::Family.as_str()).cloned(),
            })
            .collect();
        Ok(ProgressCounts {
            total: state.plants.len() as u64,
            usda_enriched: state
                .plants
                .values()
                .filter(|props| has(props, PlantField::GrowthHabitPrimary))
                .count() as u64,
            gbif_enriched: state
                .plants
                .values()
                .filter(|props| has(props, PlantField::Phylum))
                .count() as u64,
            with_images: with_images as u64,
            total_images: state.images.len() as u64,
            recent,
        })
    }

    fn catalogue_stats(&self) -> Result<CatalogueStats, CatalogueError> {
        let state = self.state();
        let total = state.plants.len() as u64;
        let native = state
            .plants
            .values()
            .filter(|props| {
                props.get(PlantField::NativeStatus.as_str()).map(String::as_str) == Some("N")
            })
            .count() as u64;
        let families = state
            .plants
            .values()
            .filter_map(|props| props.get(PlantField::Family.as_str()))
            .collect::<BTreeSet<_>>();
        let with_images = state
            .edges
            .iter()
            .map(|(plant, _)| plant)
            .collect::<BTreeSet<_>>();
        Ok(CatalogueStats {
            total_plants: total,
            native_plants: native,
            introduced_plants: total - native,
            plants_with_images: with_images.len() as u64,
            unique_families: families.len() as u64,
        })
    }

    fn habit_counts(&self) -> Result<Vec<(String, u64)>, CatalogueError> {
        let state = self.state();
        let mut counts = BTreeMap::<String, u64>::new();
        for props in state.plants.values() {
            let Some(habit) = props
                .get(PlantField::GrowthHabitPrimary.as_str())
                .filter(|habit| !habit.is_empty())
            else {
                continue;
            };
            *counts.entry(habit.clone()).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    fn exemplar_image(&self, symbol: &str) -> Result<Option<String>, CatalogueError> {
        let state = self.state();
        Ok(state
            .plants
            .iter()
            .filter(|(_, props)| {
                props.get(PlantField::UsdaSymbol.as_str()).map(String::as_str) == Some(symbol)
            })
            .find_map(|(name, _)| thumbnail(&state, name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(value: &str) -> ScientificName {
        value.parse().unwrap()
    }

    #[test]
    fn image_upsert_is_idempotent() {
        let graph = MemoryGraph::new();
        graph.insert_plant("Acer rubrum", &[]);
        let image = ImageRecord {
            url: "https://upload.test/a.jpg".to_string(),
            local_path: String::new(),
            source: "wikimedia_commons".to_string(),
        };
        graph.store_image(&name("Acer rubrum"), &image).unwrap();
        let downloaded = ImageRecord {
            local_path: "images/Acer_rubrum_0.jpg".to_string(),
            ..image
        };
        graph.store_image(&name("Acer rubrum"), &downloaded).unwrap();
        assert_eq!(graph.image_count(), 1);
        assert_eq!(graph.relationship_count(), 1);
        assert_eq!(
            graph.images_of("Acer rubrum")[0].local_path,
            "images/Acer_rubrum_0.jpg"
        );
    }

    #[test]
    fn image_for_unknown_plant_is_ignored() {
        let graph = MemoryGraph::new();
        let image = ImageRecord {
            url: "https://upload.test/a.jpg".to_string(),
            local_path: String::new(),
            source: "wikimedia_commons".to_string(),
        };
        graph.store_image(&name("Nowhere plant"), &image).unwrap();
        assert_eq!(graph.image_count(), 0);
    }

    #[test]
    fn related_requires_shared_nonempty_value() {
        let graph = MemoryGraph::new();
        graph.insert_plant("Acer rubrum", &[("family", "Sapindaceae")]);
        graph.insert_plant("Acer saccharum", &[("family", "Sapindaceae")]);
        graph.insert_plant("Quercus alba", &[("growth_habit_primary", "Tree")]);
        let related = graph.related_plants("Acer rubrum", 6).unwrap().unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].scientific_name, "Acer saccharum");
        assert_eq!(graph.related_plants("Missing", 6).unwrap(), None);
    }
}
