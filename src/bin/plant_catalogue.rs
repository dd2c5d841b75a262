use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use plant_catalogue::config::{ConfigLoader, ResolvedConfig};
use plant_catalogue::domain::EnrichmentPass;
use plant_catalogue::error::CatalogueError;
use plant_catalogue::fetch::{Fetcher, ReqwestTransport};
use plant_catalogue::graph::{DEFAULT_RELATED_LIMIT, Neo4jGraph, PlantStore};
use plant_catalogue::images::ImageDownloader;
use plant_catalogue::output::{JsonOutput, OutputMode};
use plant_catalogue::pipeline::Pipeline;
use plant_catalogue::providers::Sources;
use plant_catalogue::query::{PlantFilter, categories};
use plant_catalogue::throttle::FixedDelay;

#[derive(Parser)]
#[command(name = "plant-catalogue")]
#[command(about = "Enrich and query a native plant catalogue stored in Neo4j")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true, help = "JSON config file (default: ./plant-catalogue.json)")]
    config: Option<String>,

    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run one enrichment pass over the pending plants")]
    Enrich(EnrichArgs),
    #[command(about = "Show enrichment progress")]
    Progress,
    #[command(about = "Show catalogue statistics")]
    Stats,
    #[command(about = "Show plant counts per category")]
    Categories,
    #[command(about = "List plants matching filters")]
    Plants(PlantsArgs),
    #[command(about = "Show every property and image of one plant")]
    Plant(PlantArgs),
    #[command(about = "List plants sharing a family or growth habit")]
    Related(RelatedArgs),
}

#[derive(Args)]
struct EnrichArgs {
    pass: EnrichmentPass,

    #[arg(long, help = "Override images.max_per_plant for the scrape pass")]
    max_images: Option<usize>,
}

#[derive(Args)]
struct PlantsArgs {
    #[arg(long, help = "Category slug, e.g. trees or wildflowers-and-herbs")]
    category: Option<String>,

    #[arg(long)]
    search: Option<String>,

    #[arg(
        long = "native-status",
        allow_hyphen_values = true,
        help = "Native status codes; prefix with ! to exclude"
    )]
    native_status: Vec<String>,

    #[arg(long, allow_hyphen_values = true, help = "Durations; prefix with ! to exclude")]
    duration: Vec<String>,

    #[arg(long)]
    wildlife: Option<bool>,

    #[arg(long)]
    pollinator: Option<bool>,

    #[arg(long)]
    wetland: Option<bool>,

    #[arg(long, default_value_t = 0)]
    skip: u64,

    #[arg(long)]
    limit: Option<u64>,
}

#[derive(Args)]
struct PlantArgs {
    name: String,
}

#[derive(Args)]
struct RelatedArgs {
    name: String,

    #[arg(long, default_value_t = DEFAULT_RELATED_LIMIT)]
    limit: u64,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<CatalogueError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CatalogueError) -> u8 {
    match error {
        CatalogueError::PlantNotFound(_) => 2,
        CatalogueError::Http(_)
        | CatalogueError::StoreConnect { .. }
        | CatalogueError::Store(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let graph = Neo4jGraph::connect(&config.neo4j)?;

    match cli.command {
        Commands::Enrich(args) => run_enrich(args, config, graph, output_mode),
        Commands::Progress => {
            let progress = graph.scrape_progress()?;
            JsonOutput::print_progress(&progress).into_diagnostic()
        }
        Commands::Stats => {
            let stats = graph.catalogue_stats()?;
            JsonOutput::print_stats(&stats).into_diagnostic()
        }
        Commands::Categories => {
            let counts = categories(&graph)?;
            JsonOutput::print_categories(&counts).into_diagnostic()
        }
        Commands::Plants(args) => {
            let query = PlantFilter {
                category: args.category,
                search: args.search,
                native_status: args.native_status,
                duration: args.duration,
                wildlife: args.wildlife,
                pollinator: args.pollinator,
                wetland: args.wetland,
                skip: args.skip,
                limit: args.limit,
            }
            .into_query()?;
            let page = graph.list_plants(&query)?;
            JsonOutput::print_page(&page).into_diagnostic()
        }
        Commands::Plant(args) => {
            let detail = graph
                .plant_detail(&args.name)?
                .ok_or(CatalogueError::PlantNotFound(args.name))?;
            JsonOutput::print_detail(&detail).into_diagnostic()
        }
        Commands::Related(args) => {
            let related = graph
                .related_plants(&args.name, args.limit)?
                .ok_or(CatalogueError::PlantNotFound(args.name))?;
            JsonOutput::print_related(&related).into_diagnostic()
        }
    }
}

fn run_enrich(
    args: EnrichArgs,
    config: ResolvedConfig,
    graph: Neo4jGraph,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let transport = ReqwestTransport::new(config.http.timeout)?;
    let sources = Sources::new(
        Fetcher::new(transport, config.http.retry),
        config.endpoints.clone(),
        &config.phenology_country,
    );
    let images = ImageDownloader::new(config.images.dir.clone(), config.http.image_timeout);
    let max_images = args.max_images.unwrap_or(config.images.max_per_plant);
    let pipeline = Pipeline::new(
        sources,
        graph,
        FixedDelay::new(&config.throttle),
        images,
        max_images,
    );
    let sink = output_mode.sink();
    let report = pipeline.run(args.pass, sink.as_ref())?;
    JsonOutput::print_report(&report).into_diagnostic()
}
