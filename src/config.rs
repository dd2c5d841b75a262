use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::CatalogueError;
use crate::fetch::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "plant-catalogue.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub neo4j: Neo4jEntry,
    #[serde(default)]
    pub http: HttpEntry,
    #[serde(default)]
    pub throttle: ThrottleEntry,
    #[serde(default)]
    pub images: ImagesEntry,
    #[serde(default)]
    pub endpoints: EndpointsEntry,
    #[serde(default)]
    pub phenology_country: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Neo4jEntry {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub connect_retries: Option<u32>,
    #[serde(default)]
    pub connect_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct HttpEntry {
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub image_timeout_secs: Option<u64>,
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ThrottleEntry {
    #[serde(default)]
    pub request_delay_ms: Option<u64>,
    #[serde(default)]
    pub image_delay_ms: Option<u64>,
    #[serde(default)]
    pub entity_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ImagesEntry {
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub max_per_plant: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EndpointsEntry {
    #[serde(default)]
    pub usda: Option<String>,
    #[serde(default)]
    pub gbif: Option<String>,
    #[serde(default)]
    pub wikipedia: Option<String>,
    #[serde(default)]
    pub commons: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Neo4jSettings {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub connect_retries: u32,
    pub connect_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub image_timeout: Duration,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone)]
pub struct ThrottleSettings {
    pub request_delay: Duration,
    pub image_delay: Duration,
    pub entity_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub dir: Utf8PathBuf,
    pub max_per_plant: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub usda: String,
    pub gbif: String,
    pub wikipedia: String,
    pub commons: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            usda: "https://plantsservices.sc.egov.usda.gov/api/PlantProfile".to_string(),
            gbif: "https://api.gbif.org/v1".to_string(),
            wikipedia: "https://en.wikipedia.org/api/rest_v1".to_string(),
            commons: "https://commons.wikimedia.org/w/api.php".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub neo4j: Neo4jSettings,
    pub http: HttpSettings,
    pub throttle: ThrottleSettings,
    pub images: ImageSettings,
    pub endpoints: Endpoints,
    pub phenology_country: String,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, CatalogueError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| CatalogueError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| CatalogueError::ConfigParse(err.to_string()))?
        };

        Self::resolve_config(config, |key| std::env::var(key).ok())
    }

    pub fn resolve_config<F>(config: Config, env: F) -> Result<ResolvedConfig, CatalogueError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());
        let schema_version = config.schema_version.unwrap_or(1);

        let neo4j = Neo4jSettings {
            uri: env("NEO4J_URI")
                .or(config.neo4j.uri)
                .unwrap_or_else(|| "bolt://localhost:7687".to_string()),
            user: env("NEO4J_USER")
                .or(config.neo4j.user)
                .unwrap_or_else(|| "neo4j".to_string()),
            password: env("NEO4J_PASSWORD")
                .or(config.neo4j.password)
                .unwrap_or_else(|| "plantcatalogue".to_string()),
            connect_retries: config.neo4j.connect_retries.unwrap_or(10),
            connect_delay: Duration::from_millis(config.neo4j.connect_delay_ms.unwrap_or(5_000)),
        };

        let http = HttpSettings {
            timeout: Duration::from_secs(config.http.timeout_secs.unwrap_or(20)),
            image_timeout: Duration::from_secs(config.http.image_timeout_secs.unwrap_or(30)),
            retry: RetryPolicy {
                retries: config.http.retries.unwrap_or(3),
                backoff: Duration::from_millis(config.http.backoff_ms.unwrap_or(2_000)),
            },
        };
        if http.timeout.is_zero() || http.image_timeout.is_zero() {
            return Err(CatalogueError::InvalidConfig(
                "http timeouts must be greater than zero".to_string(),
            ));
        }

        let throttle = ThrottleSettings {
            request_delay: Duration::from_millis(config.throttle.request_delay_ms.unwrap_or(500)),
            image_delay: Duration::from_millis(config.throttle.image_delay_ms.unwrap_or(300)),
            entity_delay: Duration::from_millis(config.throttle.entity_delay_ms.unwrap_or(200)),
        };

        let max_per_plant = config.images.max_per_plant.unwrap_or(3);
        if !(1..=50).contains(&max_per_plant) {
            return Err(CatalogueError::InvalidConfig(format!(
                "images.max_per_plant must be between 1 and 50, got {max_per_plant}"
            )));
        }
        let images = ImageSettings {
            dir: Utf8PathBuf::from(
                env("IMAGES_DIR")
                    .or(config.images.dir)
                    .unwrap_or_else(|| "images".to_string()),
            ),
            max_per_plant,
        };

        let defaults = Endpoints::default();
        let endpoints = Endpoints {
            usda: trim_base(config.endpoints.usda.unwrap_or(defaults.usda)),
            gbif: trim_base(config.endpoints.gbif.unwrap_or(defaults.gbif)),
            wikipedia: trim_base(config.endpoints.wikipedia.unwrap_or(defaults.wikipedia)),
            commons: trim_base(config.endpoints.commons.unwrap_or(defaults.commons)),
        };

        let phenology_country = config
            .phenology_country
            .map(|country| country.trim().to_uppercase())
            .filter(|country| country.len() == 2)
            .unwrap_or_else(|| "US".to_string());

        Ok(ResolvedConfig {
            schema_version,
            neo4j,
            http,
            throttle,
            images,
            endpoints,
            phenology_country,
        })
    }
}

fn trim_base(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}
