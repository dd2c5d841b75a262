use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;

use plant_catalogue::config::{Config, ConfigLoader};
use plant_catalogue::error::CatalogueError;

#[test]
fn parse_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plant-catalogue.json");
    fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "neo4j": {"uri": "bolt://graph:7687", "connect_retries": 2},
            "http": {"timeout_secs": 10, "retries": 5, "backoff_ms": 100},
            "throttle": {"request_delay_ms": 0},
            "images": {"dir": "/srv/plant-images", "max_per_plant": 5},
            "endpoints": {"gbif": "https://gbif.mirror.test/v1/"},
            "phenology_country": "ca"
        }"#,
    )
    .unwrap();

    let config: Config = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let resolved = ConfigLoader::resolve_config(config, |_| None).unwrap();
    assert_eq!(resolved.neo4j.uri, "bolt://graph:7687");
    assert_eq!(resolved.neo4j.connect_retries, 2);
    assert_eq!(resolved.http.timeout, Duration::from_secs(10));
    assert_eq!(resolved.http.retry.retries, 5);
    assert_eq!(resolved.throttle.request_delay, Duration::ZERO);
    assert_eq!(resolved.throttle.image_delay, Duration::from_millis(300));
    assert_eq!(resolved.images.dir.as_str(), "/srv/plant-images");
    assert_eq!(resolved.images.max_per_plant, 5);
    assert_eq!(resolved.endpoints.gbif, "https://gbif.mirror.test/v1");
    assert_eq!(resolved.phenology_country, "CA");
}

#[test]
fn images_dir_from_environment() {
    let resolved = ConfigLoader::resolve_config(Config::default(), |key| {
        (key == "IMAGES_DIR").then(|| "/data/images".to_string())
    })
    .unwrap();
    assert_eq!(resolved.images.dir.as_str(), "/data/images");
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, CatalogueError::ConfigRead(_));
}

#[test]
fn malformed_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ neo4j: ").unwrap();
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, CatalogueError::ConfigParse(_));
}

#[test]
fn image_limit_out_of_range() {
    let config: Config = serde_json::from_str(r#"{"images": {"max_per_plant": 0}}"#).unwrap();
    let err = ConfigLoader::resolve_config(config, |_| None).unwrap_err();
    assert_matches!(err, CatalogueError::InvalidConfig(_));
}
