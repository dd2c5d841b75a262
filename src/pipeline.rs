use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::EnrichmentPass;
use crate::error::CatalogueError;
use crate::fetch::HttpTransport;
use crate::graph::{ImageRecord, PlantRecord, PlantStore};
use crate::images::{IMAGE_SOURCE, ImageDownloader};
use crate::providers::Sources;
use crate::schema::{PlantField, PlantProperties};
use crate::throttle::{Pause, Throttle};

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pass: EnrichmentPass,
    pub total: usize,
    pub enriched: usize,
    pub skipped: usize,
    pub failed: usize,
    pub images_recorded: usize,
    pub images_downloaded: usize,
    #[serde(serialize_with = "rfc3339")]
    pub started_at: DateTime<Utc>,
    #[serde(serialize_with = "rfc3339")]
    pub finished_at: DateTime<Utc>,
}

fn rfc3339<S: serde::Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[derive(Debug, Default)]
struct EntityOutcome {
    properties: usize,
    images_recorded: usize,
    images_downloaded: usize,
    failed: bool,
}

pub struct Pipeline<T: HttpTransport, S: PlantStore, H: Throttle> {
    sources: Sources<T>,
    store: S,
    throttle: H,
    images: ImageDownloader,
    max_images: usize,
}

impl<T: HttpTransport, S: PlantStore, H: Throttle> Pipeline<T, S, H> {
    pub fn new(
        sources: Sources<T>,
        store: S,
        throttle: H,
        images: ImageDownloader,
        max_images: usize,
    ) -> Self {
        Self {
            sources,
            store,
            throttle,
            images,
            max_images,
        }
    }

    pub fn sources(&self) -> &Sources<T> {
        &self.sources
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn throttle(&self) -> &H {
        &self.throttle
    }

    pub fn run(
        &self,
        pass: EnrichmentPass,
        sink: &dyn ProgressSink,
    ) -> Result<RunReport, CatalogueError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let plants = self.store.pending_plants(pass)?;
        let total = plants.len();
        info!(%pass, total, "starting enrichment");
        sink.event(ProgressEvent {
            message: format!("pass={pass}; {total} plants pending"),
            elapsed: None,
        });

        let mut report = RunReport {
            pass,
            total,
            enriched: 0,
            skipped: 0,
            failed: 0,
            images_recorded: 0,
            images_downloaded: 0,
            started_at,
            finished_at: started_at,
        };

        for (index, plant) in plants.iter().enumerate() {
            sink.event(ProgressEvent {
                message: format!("[{}/{total}] {}", index + 1, plant.scientific_name),
                elapsed: Some(clock.elapsed()),
            });
            let outcome = self.enrich(pass, plant, sink);
            report.images_recorded += outcome.images_recorded;
            report.images_downloaded += outcome.images_downloaded;
            if outcome.failed {
                report.failed += 1;
            } else if outcome.properties > 0 || outcome.images_recorded > 0 {
                report.enriched += 1;
            } else {
                report.skipped += 1;
            }
            self.throttle.pause(Pause::Entity);
        }

        report.finished_at = Utc::now();
        info!(
            %pass,
            total,
            enriched = report.enriched,
            skipped = report.skipped,
            failed = report.failed,
            "enrichment complete"
        );
        sink.event(ProgressEvent {
            message: format!(
                "pass={pass}; enriched={} skipped={} failed={}",
                report.enriched, report.skipped, report.failed
            ),
            elapsed: Some(clock.elapsed()),
        });
        Ok(report)
    }

    fn enrich(
        &self,
        pass: EnrichmentPass,
        plant: &PlantRecord,
        sink: &dyn ProgressSink,
    ) -> EntityOutcome {
        let props = match pass {
            EnrichmentPass::Usda => self.usda_properties(plant, sink),
            EnrichmentPass::Characteristics => self.characteristic_properties(plant, sink),
            EnrichmentPass::Scrape => {
                let mut props = self.usda_properties(plant, sink);
                props.merge(self.call("gbif-taxonomy", sink, || {
                    self.sources.gbif_taxonomy(&plant.scientific_name)
                }));
                props
            }
        };

        let mut outcome = EntityOutcome {
            properties: props.len(),
            ..Default::default()
        };
        if let Err(err) = self.store.update_plant(&plant.scientific_name, &props) {
            warn!(name = %plant.scientific_name, error = %err, "failed to store properties");
            outcome.failed = true;
            return outcome;
        }

        if pass == EnrichmentPass::Scrape {
            self.record_images(plant, sink, &mut outcome);
        }
        outcome
    }

    fn usda_properties(&self, plant: &PlantRecord, sink: &dyn ProgressSink) -> PlantProperties {
        match &plant.usda_symbol {
            Some(symbol) => self.call("usda", sink, || self.sources.usda_profile(symbol)),
            None => PlantProperties::new(),
        }
    }

    fn characteristic_properties(
        &self,
        plant: &PlantRecord,
        sink: &dyn ProgressSink,
    ) -> PlantProperties {
        let name = &plant.scientific_name;
        let mut props = self.call("wikipedia", sink, || self.sources.wikipedia_summary(name));

        let key = match plant.gbif_key {
            Some(key) => Some(key),
            None => {
                let key = self.sources.gbif_species_key(name);
                self.throttle.pause(Pause::Request);
                key
            }
        };
        let Some(key) = key else {
            sink.event(ProgressEvent {
                message: "  gbif: no species key".to_string(),
                elapsed: None,
            });
            return props;
        };
        props.set(PlantField::GbifKey, key.to_string());
        props.merge(self.call("gbif-descriptions", sink, || {
            self.sources.gbif_descriptions(key)
        }));
        props.merge(self.call("gbif-phenology", sink, || self.sources.gbif_phenology(key)));
        props.merge(self.call("gbif-distributions", sink, || {
            self.sources.gbif_distributions(key)
        }));
        props
    }

    fn call<F>(&self, source: &str, sink: &dyn ProgressSink, adapter: F) -> PlantProperties
    where
        F: FnOnce() -> PlantProperties,
    {
        let props = adapter();
        let message = if props.is_empty() {
            format!("  {source}: no data")
        } else {
            format!("  {source}: {}", props.names().join(", "))
        };
        sink.event(ProgressEvent {
            message,
            elapsed: None,
        });
        self.throttle.pause(Pause::Request);
        props
    }

    fn record_images(
        &self,
        plant: &PlantRecord,
        sink: &dyn ProgressSink,
        outcome: &mut EntityOutcome,
    ) {
        let name = &plant.scientific_name;
        let titles = self.sources.commons_search(name, self.max_images);
        self.throttle.pause(Pause::Request);
        let found = self.sources.commons_image_info(&titles, self.max_images);
        if !titles.is_empty() {
            self.throttle.pause(Pause::Request);
        }
        sink.event(ProgressEvent {
            message: format!("  images: found {}", found.len()),
            elapsed: None,
        });

        for (index, image) in found.iter().enumerate() {
            let stored = self
                .images
                .download(self.sources.fetcher(), name, index, &image.url);
            let record = ImageRecord {
                url: image.url.clone(),
                local_path: stored.local_path(),
                source: IMAGE_SOURCE.to_string(),
            };
            match self.store.store_image(name, &record) {
                Ok(()) => {
                    outcome.images_recorded += 1;
                    if stored.downloaded {
                        outcome.images_downloaded += 1;
                    }
                }
                Err(err) => {
                    warn!(name = %name, url = %image.url, error = %err, "failed to store image");
                    outcome.failed = true;
                }
            }
            self.throttle.pause(Pause::Image);
        }
    }
}
