use std::io::{self, Write};

use serde::Serialize;

use crate::graph::{CatalogueStats, PlantDetail, PlantPage, RelatedPlant, ScrapeProgress};
use crate::pipeline::{ProgressEvent, ProgressSink, RunReport};
use crate::query::CategoryCount;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

impl OutputMode {
    pub fn sink(self) -> Box<dyn ProgressSink> {
        match self {
            OutputMode::Interactive => Box::new(StderrProgress),
            OutputMode::NonInteractive => Box::new(JsonOutput),
        }
    }
}

#[derive(Debug, Serialize)]
struct RelatedResult<'a> {
    related: &'a [RelatedPlant],
}

#[derive(Debug, Serialize)]
struct CategoriesResult<'a> {
    categories: &'a [CategoryCount],
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &RunReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_progress(progress: &ScrapeProgress) -> io::Result<()> {
        Self::print_json(progress)
    }

    pub fn print_stats(stats: &CatalogueStats) -> io::Result<()> {
        Self::print_json(stats)
    }

    pub fn print_categories(categories: &[CategoryCount]) -> io::Result<()> {
        Self::print_json(&CategoriesResult { categories })
    }

    pub fn print_page(page: &PlantPage) -> io::Result<()> {
        Self::print_json(page)
    }

    pub fn print_detail(detail: &PlantDetail) -> io::Result<()> {
        Self::print_json(detail)
    }

    pub fn print_related(related: &[RelatedPlant]) -> io::Result<()> {
        Self::print_json(&RelatedResult { related })
    }

    fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        let mut stderr = io::stderr();
        let _ = match event.elapsed {
            Some(elapsed) => writeln!(stderr, "{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => writeln!(stderr, "{}", event.message),
        };
    }
}
