use std::thread;

use neo4rs::{BoltMap, BoltString, BoltType, ConfigBuilder, Graph, Query, Row, query};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

use super::{
    CatalogueStats, ImageRecord, PlantDetail, PlantPage, PlantRecord, PlantStore, PlantSummary,
    ProgressCounts, PropertyMap, RECENT_PLANTS, RecentPlant, RelatedPlant,
};
use crate::config::Neo4jSettings;
use crate::domain::{EnrichmentPass, ScientificName};
use crate::error::CatalogueError;
use crate::query::{ParamValue, PlantQuery, to_cypher};
use crate::schema::PlantProperties;

// Renders every property of `p` as `[name, value]` pairs.
const PROPERTY_PAIRS: &str = "[k IN keys(p) | [k, toString(p[k])]]";

pub struct Neo4jGraph {
    graph: Graph,
    runtime: Runtime,
}

impl Neo4jGraph {
    pub fn connect(settings: &Neo4jSettings) -> Result<Self, CatalogueError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| CatalogueError::Store(err.to_string()))?;
        let config = ConfigBuilder::default()
            .uri(settings.uri.as_str())
            .user(settings.user.as_str())
            .password(settings.password.as_str())
            .fetch_size(500)
            .max_connections(10)
            .build()
            .map_err(|err| connect_error(settings, err))?;

        let attempts = settings.connect_retries.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            let ready = runtime.block_on(async {
                let graph = Graph::connect(config.clone()).await?;
                graph.run(query("RETURN 1")).await?;
                Ok::<_, neo4rs::Error>(graph)
            });
            match ready {
                Ok(graph) => {
                    info!(uri = %settings.uri, "connected to Neo4j");
                    return Ok(Self { graph, runtime });
                }
                Err(err) => {
                    warn!(attempt, attempts, error = %err, "waiting for Neo4j");
                    last_error = err.to_string();
                    if attempt < attempts {
                        thread::sleep(settings.connect_delay);
                    }
                }
            }
        }
        Err(CatalogueError::StoreConnect {
            uri: settings.uri.clone(),
            message: last_error,
        })
    }

    fn run(&self, q: Query) -> Result<(), CatalogueError> {
        self.runtime.block_on(self.graph.run(q))?;
        Ok(())
    }

    fn rows(&self, q: Query) -> Result<Vec<Row>, CatalogueError> {
        self.runtime.block_on(async {
            let mut stream = self.graph.execute(q).await?;
            let mut rows = Vec::new();
            while let Some(row) = stream.next().await? {
                rows.push(row);
            }
            Ok::<_, CatalogueError>(rows)
        })
    }

    fn count(&self, cypher: &str) -> Result<u64, CatalogueError> {
        let rows = self.rows(query(cypher))?;
        Ok(rows.first().map(|row| int(row, "n")).unwrap_or_default())
    }
}

fn connect_error(settings: &Neo4jSettings, err: impl ToString) -> CatalogueError {
    CatalogueError::StoreConnect {
        uri: settings.uri.clone(),
        message: err.to_string(),
    }
}

fn int(row: &Row, column: &str) -> u64 {
    row.get::<i64>(column).unwrap_or_default().max(0) as u64
}

fn text(row: &Row, column: &str) -> Option<String> {
    row.get::<Option<String>>(column).unwrap_or_default()
}

fn properties(row: &Row, column: &str) -> PropertyMap {
    row.get::<Vec<Vec<String>>>(column)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|pair| match <[String; 2]>::try_from(pair) {
            Ok([key, value]) => Some((key, value)),
            Err(_) => None,
        })
        .collect()
}

fn string_map(props: &PlantProperties) -> BoltType {
    BoltType::Map(BoltMap::from_iter(props.iter().map(|(key, value)| {
        (
            BoltString::from(key),
            BoltType::String(BoltString::from(value)),
        )
    })))
}

fn bind(mut q: Query, params: Vec<(String, ParamValue)>) -> Query {
    for (name, value) in params {
        q = match value {
            ParamValue::Text(text) => q.param(&name, text),
            ParamValue::List(list) => q.param(&name, list),
        };
    }
    q
}

fn pending_cypher(pass: EnrichmentPass) -> String {
    let selection = match pass {
        EnrichmentPass::Usda => {
            "WHERE p.usda_symbol IS NOT NULL AND trim(toString(p.usda_symbol)) <> '' \
             AND p.growth_habit_primary IS NULL"
        }
        EnrichmentPass::Characteristics => "WHERE p.wiki_summary IS NULL",
        EnrichmentPass::Scrape => "",
    };
    format!(
        "MATCH (p:Plant) {selection} \
         WITH p ORDER BY p.scientific_name \
         RETURN {PROPERTY_PAIRS} AS props"
    )
}

impl PlantStore for Neo4jGraph {
    fn pending_plants(&self, pass: EnrichmentPass) -> Result<Vec<PlantRecord>, CatalogueError> {
        let rows = self.rows(query(&pending_cypher(pass)))?;
        let plants = rows
            .iter()
            .filter_map(|row| PlantRecord::from_properties(&properties(row, "props")))
            .collect::<Vec<_>>();
        debug!(%pass, count = plants.len(), "selected pending plants");
        Ok(plants)
    }

    fn update_plant(
        &self,
        name: &ScientificName,
        props: &PlantProperties,
    ) -> Result<(), CatalogueError> {
        if props.is_empty() {
            return Ok(());
        }
        self.run(
            query("MATCH (p:Plant {scientific_name: $name}) SET p += $props")
                .param("name", name.as_str())
                .param("props", string_map(props)),
        )
    }

    fn store_image(
        &self,
        name: &ScientificName,
        image: &ImageRecord,
    ) -> Result<(), CatalogueError> {
        self.run(
            query(
                "MATCH (p:Plant {scientific_name: $name}) \
                 MERGE (i:Image {url: $url}) \
                 SET i.local_path = $local_path, i.source = $source \
                 MERGE (p)-[:HAS_IMAGE]->(i)",
            )
            .param("name", name.as_str())
            .param("url", image.url.as_str())
            .param("local_path", image.local_path.as_str())
            .param("source", image.source.as_str()),
        )
    }

    fn list_plants(&self, plant_query: &PlantQuery) -> Result<PlantPage, CatalogueError> {
        let filter = to_cypher(&plant_query.filters, "p");
        let page = bind(
            query(&format!(
                "MATCH (p:Plant) {} \
                 OPTIONAL MATCH (p)-[:HAS_IMAGE]->(i:Image) \
                 WITH p, collect(i.url)[0] AS thumbnail \
                 ORDER BY p.scientific_name SKIP $skip LIMIT $limit \
                 RETURN {PROPERTY_PAIRS} AS props, thumbnail",
                filter.where_clause
            )),
            filter.params.clone(),
        )
        .param("skip", plant_query.skip as i64)
        .param("limit", plant_query.limit as i64);
        let plants = self
            .rows(page)?
            .iter()
            .map(|row| {
                PlantSummary::from_properties(&properties(row, "props"), text(row, "thumbnail"))
            })
            .collect();

        let total = bind(
            query(&format!(
                "MATCH (p:Plant) {} RETURN count(p) AS n",
                filter.where_clause
            )),
            filter.params,
        );
        let total = self
            .rows(total)?
            .first()
            .map(|row| int(row, "n"))
            .unwrap_or_default();

        Ok(PlantPage {
            plants,
            total,
            skip: plant_query.skip,
            limit: plant_query.limit,
        })
    }

    fn plant_detail(&self, name: &str) -> Result<Option<PlantDetail>, CatalogueError> {
        let rows = self.rows(
            query(&format!(
                "MATCH (p:Plant {{scientific_name: $name}}) \
                 OPTIONAL MATCH (p)-[:HAS_IMAGE]->(i:Image) \
                 WITH p, collect(i) AS images \
                 RETURN {PROPERTY_PAIRS} AS props, \
                 [x IN images | [x.url, coalesce(x.local_path, ''), coalesce(x.source, '')]] AS images"
            ))
            .param("name", name),
        )?;
        Ok(rows.first().map(|row| PlantDetail {
            plant: properties(row, "props"),
            images: row
                .get::<Vec<Vec<String>>>("images")
                .unwrap_or_default()
                .into_iter()
                .filter_map(|image| match <[String; 3]>::try_from(image) {
                    Ok([url, local_path, source]) => Some(ImageRecord {
                        url,
                        local_path,
                        source,
                    }),
                    Err(_) => None,
                })
                .collect(),
        }))
    }

    fn related_plants(
        &self,
        name: &str,
        limit: u64,
    ) -> Result<Option<Vec<RelatedPlant>>, CatalogueError> {
        let anchor = self.rows(
            query(
                "MATCH (p:Plant {scientific_name: $name}) \
                 RETURN coalesce(p.family, '') AS family, \
                 coalesce(p.growth_habit_primary, '') AS habit",
            )
            .param("name", name),
        )?;
        let Some(anchor) = anchor.first() else {
            return Ok(None);
        };
        let family = text(anchor, "family").unwrap_or_default();
        let habit = text(anchor, "habit").unwrap_or_default();

        let rows = self.rows(
            query(
                "MATCH (p:Plant) \
                 WHERE p.scientific_name <> $name \
                 AND (($family <> '' AND p.family = $family) \
                 OR ($habit <> '' AND p.growth_habit_primary = $habit)) \
                 OPTIONAL MATCH (p)-[:HAS_IMAGE]->(i:Image) \
                 WITH p, collect(i.url)[0] AS thumbnail \
                 ORDER BY p.scientific_name LIMIT $limit \
                 RETURN p.scientific_name AS scientific_name, \
                 p.common_name AS common_name, \
                 p.growth_habit_primary AS growth_habit, thumbnail",
            )
            .param("name", name)
            .param("family", family)
            .param("habit", habit)
            .param("limit", limit as i64),
        )?;
        Ok(Some(
            rows.iter()
                .map(|row| RelatedPlant {
                    scientific_name: text(row, "scientific_name").unwrap_or_default(),
                    common_name: text(row, "common_name"),
                    growth_habit: text(row, "growth_habit"),
                    thumbnail: text(row, "thumbnail"),
                })
                .collect(),
        ))
    }

    fn progress_counts(&self) -> Result<ProgressCounts, CatalogueError> {
        let recent = self
            .rows(
                query(
                    "MATCH (p:Plant) WHERE p.growth_habit_primary IS NOT NULL \
                     RETURN p.scientific_name AS name, p.growth_habit_primary AS habit, \
                     p.family AS family \
                     ORDER BY p.scientific_name DESC LIMIT $limit",
                )
                .param("limit", RECENT_PLANTS as i64),
            )?
            .iter()
            .map(|row| RecentPlant {
                name: text(row, "name").unwrap_or_default(),
                habit: text(row, "habit"),
                family: text(row, "family"),
            })
            .collect();
        Ok(ProgressCounts {
            total: self.count("MATCH (p:Plant) RETURN count(p) AS n")?,
            usda_enriched: self.count(
                "MATCH (p:Plant) WHERE p.growth_habit_primary IS NOT NULL RETURN count(p) AS n",
            )?,
            gbif_enriched: self
                .count("MATCH (p:Plant) WHERE p.phylum IS NOT NULL RETURN count(p) AS n")?,
            with_images: self
                .count("MATCH (p:Plant)-[:HAS_IMAGE]->() RETURN count(DISTINCT p) AS n")?,
            total_images: self.count("MATCH (i:Image) RETURN count(i) AS n")?,
            recent,
        })
    }

    fn catalogue_stats(&self) -> Result<CatalogueStats, CatalogueError> {
        let total = self.count("MATCH (p:Plant) RETURN count(p) AS n")?;
        let native = self.count("MATCH (p:Plant {native_status: 'N'}) RETURN count(p) AS n")?;
        Ok(CatalogueStats {
            total_plants: total,
            native_plants: native,
            introduced_plants: total.saturating_sub(native),
            plants_with_images: self
                .count("MATCH (p:Plant)-[:HAS_IMAGE]->() RETURN count(DISTINCT p) AS n")?,
            unique_families: self.count(
                "MATCH (p:Plant) WHERE p.family IS NOT NULL RETURN count(DISTINCT p.family) AS n",
            )?,
        })
    }

    fn habit_counts(&self) -> Result<Vec<(String, u64)>, CatalogueError> {
        let rows = self.rows(query(
            "MATCH (p:Plant) \
             WHERE coalesce(p.growth_habit_primary, '') <> '' \
             RETURN p.growth_habit_primary AS habit, count(p) AS n \
             ORDER BY habit",
        ))?;
        Ok(rows
            .iter()
            .filter_map(|row| Some((text(row, "habit")?, int(row, "n"))))
            .collect())
    }

    fn exemplar_image(&self, symbol: &str) -> Result<Option<String>, CatalogueError> {
        let rows = self.rows(
            query(
                "MATCH (p:Plant {usda_symbol: $symbol})-[:HAS_IMAGE]->(i:Image) \
                 RETURN i.url AS url ORDER BY i.url LIMIT 1",
            )
            .param("symbol", symbol),
        )?;
        Ok(rows.first().and_then(|row| text(row, "url")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_selection_per_pass() {
        let usda = pending_cypher(EnrichmentPass::Usda);
        assert!(usda.contains("p.growth_habit_primary IS NULL"));
        assert!(usda.contains("ORDER BY p.scientific_name"));
        assert!(pending_cypher(EnrichmentPass::Characteristics).contains("p.wiki_summary IS NULL"));
        assert!(!pending_cypher(EnrichmentPass::Scrape).contains("WHERE"));
    }
}
