use std::collections::HashMap;
use std::fs;
use std::sync::Mutex;
use std::time::Duration;

use camino::Utf8PathBuf;
use tempfile::TempDir;

use plant_catalogue::config::Endpoints;
use plant_catalogue::domain::EnrichmentPass;
use plant_catalogue::error::CatalogueError;
use plant_catalogue::fetch::{Fetcher, HttpRequest, HttpResponse, HttpTransport, RetryPolicy};
use plant_catalogue::graph::{MemoryGraph, PlantStore};
use plant_catalogue::images::ImageDownloader;
use plant_catalogue::output::JsonOutput;
use plant_catalogue::pipeline::{Pipeline, ProgressEvent, ProgressSink};
use plant_catalogue::providers::Sources;
use plant_catalogue::throttle::{NoDelay, Pause};

const USDA: &str = "https://usda.test/api/PlantProfile";
const GBIF: &str = "https://gbif.test/v1";
const WIKIPEDIA: &str = "https://wiki.test/api/rest_v1";
const COMMONS: &str = "https://commons.test/w/api.php";
const LEAVES: &str = "https://upload.test/a/ab/Acer_rubrum_leaves.jpg";
const FLOWERS: &str = "https://upload.test/c/cd/Acer_rubrum_flowers.png";

fn fixture(name: &str) -> Vec<u8> {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    fs::read(path).unwrap()
}

fn json(body: Vec<u8>) -> HttpResponse {
    HttpResponse {
        status: 200,
        content_type: Some("application/json".to_string()),
        body,
    }
}

fn status(code: u16) -> HttpResponse {
    HttpResponse {
        status: code,
        content_type: None,
        body: Vec::new(),
    }
}

/// Serves the captured fixtures for Acer rubrum and nothing for other plants.
#[derive(Default)]
struct FixtureWeb {
    requests: Mutex<Vec<String>>,
    /// Failures still to serve per URL before the real answer.
    flaky: Mutex<HashMap<String, usize>>,
}

impl FixtureWeb {
    fn flaky(self, url: &str, failures: usize) -> Self {
        self.flaky.lock().unwrap().insert(url.to_string(), failures);
        self
    }

    fn requests_to(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|requested| requested.as_str() == url)
            .count()
    }

    fn route(&self, request: &HttpRequest<'_>) -> HttpResponse {
        let query = |key: &str| {
            request
                .query
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.as_str())
                .unwrap_or_default()
        };
        let species = format!("{GBIF}/species");
        let matched = format!("{GBIF}/species/match");
        let descriptions = format!("{GBIF}/species/3189859/descriptions");
        let distributions = format!("{GBIF}/species/3189859/distributions");
        let occurrences = format!("{GBIF}/occurrence/search");
        let summary = format!("{WIKIPEDIA}/page/summary/Acer_rubrum");

        match request.url {
            USDA if query("symbol") == "ACRU" => json(fixture("usda_acru.json")),
            USDA => status(404),
            url if url == species && query("name") == "Acer rubrum" => {
                json(fixture("gbif_species.json"))
            }
            url if url == species => json(br#"{"results": []}"#.to_vec()),
            url if url == matched && query("name") == "Acer rubrum" => {
                json(fixture("gbif_match.json"))
            }
            url if url == matched => json(br#"{"matchType": "NONE"}"#.to_vec()),
            url if url == descriptions => json(fixture("gbif_descriptions.json")),
            url if url == distributions => json(fixture("gbif_distributions.json")),
            url if url == occurrences && query("taxonKey") == "3189859" => {
                json(fixture("gbif_occurrence.json"))
            }
            url if url == summary => json(fixture("wikipedia_summary.json")),
            COMMONS if query("list") == "search" && query("srsearch") == "Acer rubrum plant" => {
                json(fixture("commons_search.json"))
            }
            COMMONS if query("list") == "search" => {
                json(br#"{"query": {"search": []}}"#.to_vec())
            }
            COMMONS if query("prop") == "imageinfo" => json(fixture("commons_imageinfo.json")),
            LEAVES => HttpResponse {
                status: 200,
                content_type: Some("image/jpeg".to_string()),
                body: b"\xff\xd8\xff\xe0jpeg".to_vec(),
            },
            FLOWERS => HttpResponse {
                status: 200,
                content_type: Some("text/html; charset=utf-8".to_string()),
                body: b"<html>moved</html>".to_vec(),
            },
            _ => status(404),
        }
    }
}

impl HttpTransport for FixtureWeb {
    fn get(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, CatalogueError> {
        self.requests.lock().unwrap().push(request.url.to_string());
        if let Some(remaining) = self.flaky.lock().unwrap().get_mut(request.url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(status(503));
            }
        }
        Ok(self.route(request))
    }
}

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}

fn endpoints() -> Endpoints {
    Endpoints {
        usda: USDA.to_string(),
        gbif: GBIF.to_string(),
        wikipedia: WIKIPEDIA.to_string(),
        commons: COMMONS.to_string(),
    }
}

fn seeded_graph() -> MemoryGraph {
    let graph = MemoryGraph::new();
    graph.insert_plant(
        "Acer rubrum",
        &[
            ("usda_symbol", "ACRU"),
            ("common_name", "red maple"),
            ("native_status", "N"),
        ],
    );
    graph.insert_plant(
        "Sphagnum palustre",
        &[("common_name", "prairie sphagnum"), ("native_status", "N")],
    );
    graph
}

fn pipeline(
    web: FixtureWeb,
    graph: MemoryGraph,
    image_dir: &TempDir,
) -> Pipeline<FixtureWeb, MemoryGraph, NoDelay> {
    let policy = RetryPolicy {
        retries: 3,
        backoff: Duration::ZERO,
    };
    let sources = Sources::new(Fetcher::new(web, policy), endpoints(), "US");
    let dir = Utf8PathBuf::from_path_buf(image_dir.path().join("images")).unwrap();
    Pipeline::new(
        sources,
        graph,
        NoDelay::default(),
        ImageDownloader::new(dir, Duration::from_secs(5)),
        3,
    )
}

#[test]
fn usda_pass_only_visits_plants_with_symbol() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(FixtureWeb::default(), seeded_graph(), &dir);
    let report = pipeline.run(EnrichmentPass::Usda, &JsonOutput).unwrap();

    assert_eq!(report.total, 1);
    assert_eq!(report.enriched, 1);
    let acer = pipeline.store().plant_properties("Acer rubrum").unwrap();
    assert_eq!(acer["growth_habit_primary"], "Tree");
    assert_eq!(acer["has_wetland_data"], "False");
    assert_eq!(acer["common_name"], "red maple");
    assert_eq!(pipeline.throttle().pauses(), vec![Pause::Request, Pause::Entity]);

    let again = pipeline.run(EnrichmentPass::Usda, &JsonOutput).unwrap();
    assert_eq!(again.total, 0);
}

#[test]
fn transient_failures_are_retried() {
    let dir = tempfile::tempdir().unwrap();
    let web = FixtureWeb::default().flaky(USDA, 2);
    let pipeline = pipeline(web, seeded_graph(), &dir);
    let report = pipeline.run(EnrichmentPass::Usda, &JsonOutput).unwrap();

    assert_eq!(report.enriched, 1);
    let acer = pipeline.store().plant_properties("Acer rubrum").unwrap();
    assert_eq!(acer["family"], "Aceraceae");
}

#[test]
fn characteristics_pass_stores_key_and_gbif_details() {
    let dir = tempfile::tempdir().unwrap();
    let sink = RecordingSink::default();
    let pipeline = pipeline(FixtureWeb::default(), seeded_graph(), &dir);
    let report = pipeline.run(EnrichmentPass::Characteristics, &sink).unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.enriched, 1);
    assert_eq!(report.skipped, 1);
    let acer = pipeline.store().plant_properties("Acer rubrum").unwrap();
    assert_eq!(acer["gbif_key"], "3189859");
    assert_eq!(acer["height_m"], "18–27 m tall");
    assert_eq!(acer["peak_observation_months"], "June, September, March");
    assert_eq!(acer["us_states"], "Florida, Maine, New York");
    assert_eq!(acer["gbif_habit"], "Deciduous tree.");

    let sphagnum = pipeline.store().plant_properties("Sphagnum palustre").unwrap();
    assert!(!sphagnum.contains_key("wiki_summary"));

    let messages = sink.messages.lock().unwrap();
    assert!(messages.iter().any(|message| message == "[1/2] Acer rubrum"));
    assert!(messages.iter().any(|message| message == "  gbif: no species key"));
}

#[test]
fn scrape_pass_merges_sources_and_records_images() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(FixtureWeb::default(), seeded_graph(), &dir);
    let report = pipeline.run(EnrichmentPass::Scrape, &JsonOutput).unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.enriched, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.images_recorded, 2);
    assert_eq!(report.images_downloaded, 1);

    let graph = pipeline.store();
    let acer = graph.plant_properties("Acer rubrum").unwrap();
    assert_eq!(acer["family"], "Sapindaceae");
    assert_eq!(acer["tax_order"], "Sapindales");
    assert_eq!(acer["gbif_class"], "Magnoliopsida");
    assert_eq!(acer["has_wildlife_value"], "True");

    let images = graph.images_of("Acer rubrum");
    assert_eq!(images.len(), 2);
    let leaves = images.iter().find(|image| image.url == LEAVES).unwrap();
    assert!(leaves.local_path.ends_with("Acer_rubrum_0.jpg"));
    assert!(std::path::Path::new(&leaves.local_path).exists());
    let flowers = images.iter().find(|image| image.url == FLOWERS).unwrap();
    assert_eq!(flowers.local_path, "");
    assert_eq!(flowers.source, "wikimedia");
}

#[test]
fn scrape_twice_keeps_one_image_node_per_url() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(FixtureWeb::default(), seeded_graph(), &dir);
    pipeline.run(EnrichmentPass::Scrape, &JsonOutput).unwrap();
    let first = pipeline.store().plant_properties("Acer rubrum").unwrap();
    let second = pipeline.run(EnrichmentPass::Scrape, &JsonOutput).unwrap();

    assert_eq!(pipeline.store().plant_properties("Acer rubrum").unwrap(), first);
    assert_eq!(second.images_recorded, 2);
    assert_eq!(second.images_downloaded, 0);
    assert_eq!(pipeline.store().image_count(), 2);
    assert_eq!(pipeline.store().relationship_count(), 2);
}

#[test]
fn scrape_pauses_after_every_external_call() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(FixtureWeb::default(), seeded_graph(), &dir);
    pipeline.run(EnrichmentPass::Scrape, &JsonOutput).unwrap();

    assert_eq!(
        pipeline.throttle().pauses(),
        vec![
            // Acer rubrum: usda, gbif, commons search, commons imageinfo, two images
            Pause::Request,
            Pause::Request,
            Pause::Request,
            Pause::Request,
            Pause::Image,
            Pause::Image,
            Pause::Entity,
            // Sphagnum palustre: gbif, commons search with no hits
            Pause::Request,
            Pause::Request,
            Pause::Entity,
        ]
    );
}

#[test]
fn existing_image_file_is_not_fetched_again() {
    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("images");
    fs::create_dir_all(&images).unwrap();
    fs::write(images.join("Acer_rubrum_0.jpg"), b"cached").unwrap();

    let pipeline = pipeline(FixtureWeb::default(), seeded_graph(), &dir);
    let report = pipeline.run(EnrichmentPass::Scrape, &JsonOutput).unwrap();

    assert_eq!(report.images_downloaded, 0);
    assert_eq!(pipeline_requests(&pipeline, LEAVES), 0);
    assert_eq!(fs::read(images.join("Acer_rubrum_0.jpg")).unwrap(), b"cached");
}

fn pipeline_requests(pipeline: &Pipeline<FixtureWeb, MemoryGraph, NoDelay>, url: &str) -> usize {
    pipeline.sources().fetcher().transport().requests_to(url)
}

#[test]
fn store_failure_is_counted_and_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let graph = seeded_graph();
    graph.fail_writes_for("Acer rubrum");
    let pipeline = pipeline(FixtureWeb::default(), graph, &dir);
    let report = pipeline.run(EnrichmentPass::Scrape, &JsonOutput).unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(pipeline.store().image_count(), 0);
}

#[test]
fn pending_selection_reflects_writes() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(FixtureWeb::default(), seeded_graph(), &dir);
    pipeline.run(EnrichmentPass::Characteristics, &JsonOutput).unwrap();

    let pending = pipeline
        .store()
        .pending_plants(EnrichmentPass::Characteristics)
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].scientific_name.as_str(), "Sphagnum palustre");
}
