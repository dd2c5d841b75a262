use std::fs;

use serde_json::Value;

use plant_catalogue::domain::GbifKey;
use plant_catalogue::providers::commons::{image_infos, search_titles};
use plant_catalogue::providers::gbif::{
    description_properties, distribution_properties, gbif_taxonomy_properties,
    phenology_properties, species_key,
};
use plant_catalogue::providers::usda::usda_properties;
use plant_catalogue::providers::wikipedia::wikipedia_properties;
use plant_catalogue::schema::PlantField;

fn fixture(name: &str) -> Value {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    let content = fs::read_to_string(&path).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[test]
fn usda_profile_maps_habits_ranks_and_flags() {
    let props = usda_properties(&fixture("usda_acru.json"));
    assert_eq!(props.get(PlantField::GrowthHabitPrimary), Some("Tree"));
    assert_eq!(props.get(PlantField::GrowthHabits), Some("Tree"));
    assert_eq!(props.get(PlantField::Duration), Some("Perennial"));
    assert_eq!(props.get(PlantField::PlantGroup), Some("Dicot"));
    assert_eq!(props.get(PlantField::UsdaImageFilename), Some("acru_001_php.jpg"));
    assert_eq!(props.get(PlantField::Kingdom), Some("Plantae"));
    assert_eq!(props.get(PlantField::TaxOrder), Some("Sapindales"));
    assert_eq!(props.get(PlantField::Family), Some("Aceraceae"));
    assert_eq!(props.get(PlantField::Genus), None);
    assert_eq!(props.get(PlantField::HasWildlifeValue), Some("True"));
    assert_eq!(props.get(PlantField::HasPollinatorValue), Some("True"));
    assert_eq!(props.get(PlantField::HasWetlandData), Some("False"));
}

#[test]
fn usda_flags_present_on_sparse_profile() {
    let props = usda_properties(&serde_json::json!({"Symbol": "XYZ"}));
    assert_eq!(props.len(), 3);
    assert_eq!(props.get(PlantField::HasWildlifeValue), Some("False"));
    assert!(!props.contains(PlantField::GrowthHabitPrimary));
}

#[test]
fn gbif_taxonomy_prefixes_class_and_order() {
    let props = gbif_taxonomy_properties(&fixture("gbif_species.json"));
    assert_eq!(props.get(PlantField::Phylum), Some("Tracheophyta"));
    assert_eq!(props.get(PlantField::GbifClass), Some("Magnoliopsida"));
    assert_eq!(props.get(PlantField::GbifOrder), Some("Sapindales"));
    assert_eq!(props.get(PlantField::Family), Some("Sapindaceae"));
    assert_eq!(props.get(PlantField::VernacularName), Some("Red Maple"));
    assert!(!props.contains(PlantField::TaxClass));
}

#[test]
fn gbif_match_yields_usage_key() {
    assert_eq!(
        species_key(&fixture("gbif_match.json")),
        Some(GbifKey::new(3189859))
    );
    assert_eq!(species_key(&serde_json::json!({"matchType": "NONE"})), None);
}

#[test]
fn gbif_descriptions_bucket_by_type() {
    let props = description_properties(&fixture("gbif_descriptions.json"));
    assert_eq!(
        props.get(PlantField::HabitatNotes),
        Some(
            "Swamps, bottomlands and moist upland slopes. | \
             Tolerant of a wide range of soil moisture."
        )
    );
    assert_eq!(props.get(PlantField::GbifHabit), Some("Deciduous tree."));
}

#[test]
fn gbif_phenology_from_month_facet() {
    let props = phenology_properties(&fixture("gbif_occurrence.json"));
    assert_eq!(
        props.get(PlantField::PeakObservationMonths),
        Some("June, September, March")
    );
    assert_eq!(props.get(PlantField::ActiveSeason), Some("June, September"));
}

#[test]
fn gbif_distributions_collect_tdwg_states() {
    let props = distribution_properties(&fixture("gbif_distributions.json"));
    assert_eq!(props.get(PlantField::IucnThreatStatus), Some("LEAST_CONCERN"));
    assert_eq!(props.get(PlantField::UsStates), Some("Florida, Maine, New York"));
}

#[test]
fn wikipedia_summary_and_height() {
    let props = wikipedia_properties(&fixture("wikipedia_summary.json"));
    assert!(
        props
            .get(PlantField::WikiSummary)
            .unwrap()
            .starts_with("Acer rubrum, the red maple")
    );
    assert_eq!(props.get(PlantField::HeightM), Some("18–27 m tall"));
}

#[test]
fn wikipedia_stub_rejected() {
    let props = wikipedia_properties(&serde_json::json!({
        "type": "standard",
        "extract": "Acer rubrum is a maple."
    }));
    assert!(props.is_empty());
}

#[test]
fn wikipedia_summary_length_bounds() {
    let summary = |extract: String| {
        wikipedia_properties(&serde_json::json!({"type": "standard", "extract": extract}))
    };

    let long = summary("é".repeat(1500));
    let capped = long.get(PlantField::WikiSummary).unwrap();
    assert_eq!(capped.chars().count(), 1000);
    assert!(capped.chars().all(|ch| ch == 'é'));

    assert!(summary("a".repeat(50)).is_empty());
    let accepted = summary("a".repeat(51));
    assert_eq!(
        accepted.get(PlantField::WikiSummary).map(|text| text.len()),
        Some(51)
    );
}

#[test]
fn commons_search_then_imageinfo() {
    let titles = search_titles(&fixture("commons_search.json"), 3);
    assert_eq!(
        titles,
        vec![
            "File:Acer rubrum leaves.jpg",
            "File:Acer rubrum flowers.png",
            "File:Acer rubrum bark.webp"
        ]
    );
    let images = image_infos(&fixture("commons_imageinfo.json"), &titles, 3);
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].url, "https://upload.test/a/ab/Acer_rubrum_leaves.jpg");
    assert_eq!(images[1].title, "File:Acer rubrum flowers.png");
}
