use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CatalogueError {
    #[error("invalid scientific name: {0:?}")]
    InvalidScientificName(String),

    #[error("invalid USDA symbol: {0:?}")]
    InvalidUsdaSymbol(String),

    #[error("invalid GBIF species key: {0}")]
    InvalidGbifKey(String),

    #[error("unknown enrichment pass: {0}")]
    UnknownPass(String),

    #[error("invalid plant filter: {0}")]
    InvalidFilter(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("failed to connect to Neo4j at {uri}: {message}")]
    #[diagnostic(help("check NEO4J_URI / NEO4J_USER / NEO4J_PASSWORD or the neo4j section of plant-catalogue.json"))]
    StoreConnect { uri: String, message: String },

    #[error("graph store operation failed: {0}")]
    Store(String),

    #[error("plant not found: {0}")]
    PlantNotFound(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl From<neo4rs::Error> for CatalogueError {
    fn from(err: neo4rs::Error) -> Self {
        CatalogueError::Store(err.to_string())
    }
}
