use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

use protest_transition::config::{Config, DEFAULT_CONFIG_PATH};
use protest_transition::constants::get_supported_sources;
use protest_transition::infra::CsvTableSource;
use protest_transition::logging::init_logging;
use protest_transition::metrics::{init_metrics, write_snapshot};
use protest_transition::pipeline::processing::country::CountryLookup;
use protest_transition::pipeline::processing::sources::SourceRegistry;
use protest_transition::pipeline::steps::PipelineContext;
use protest_transition::pipeline::storage::TableStore;
use protest_transition::pipeline::{PipelineConfig, PipelineExecutionResult, PipelineOrchestrator};

#[derive(Parser)]
#[command(name = "protest_transition")]
#[command(about = "Reconciles protest, regime and institution datasets into one analysis table")]
#[command(version)]
struct Cli {
    /// Pipeline configuration file (defaults to $PIPELINE_CONFIG, then pipeline.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean one raw source and persist it
    Clean {
        /// Source id. Available: mass_mobilization, polity, dpi
        #[arg(long)]
        source: String,
    },
    /// Join the persisted cleaned sources and export the analysis table
    Join,
    /// Clean every source, then join and export
    Run,
    /// Print the manifest of persisted tables
    Manifest,
    /// List known sources
    Sources,
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .or_else(|| std::env::var("PIPELINE_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn build_context(config: &Config) -> Result<PipelineContext> {
    let lookup = CountryLookup::from_csv(&config.paths.country_lookup)
        .with_context(|| format!("loading {}", config.paths.country_lookup.display()))?;
    let store = TableStore::open(&config.paths.database)
        .with_context(|| format!("opening {}", config.paths.database.display()))?;
    let paths: HashMap<String, PathBuf> = config
        .sources
        .iter()
        .map(|(id, source)| (id.clone(), source.path.clone()))
        .collect();

    let mut ctx = PipelineContext::new(
        store,
        Box::new(CsvTableSource::new(paths)),
        lookup,
        config.paths.output_dir.clone(),
    );
    ctx.join_mode = config.join.mode;
    for id in get_supported_sources() {
        if let Some(schema) = config.schema_override(id)? {
            info!(source_id = id, "Using schema override");
            ctx.schema_overrides.insert(id.to_string(), schema);
        }
    }
    Ok(ctx)
}

fn run_pipeline(config: &Config, pipeline: PipelineConfig) -> Result<PipelineExecutionResult> {
    let mut ctx = build_context(config)?;
    let orchestrator = PipelineOrchestrator::new(pipeline)?;
    Ok(orchestrator.run(&mut ctx)?)
}

fn print_result(result: &PipelineExecutionResult) {
    println!("\n📊 Pipeline '{}' (run {})", result.pipeline_name, result.run_id);
    for (step, r) in &result.step_results {
        println!(
            "   {:<28} processed {:>7}  excluded {:>6}  {}",
            step, r.processed_count, r.excluded_count, r.message
        );
    }
    println!(
        "   Total processed: {}, excluded: {}",
        result.total_processed, result.total_excluded
    );
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if let Commands::Sources = cli.command {
        for id in SourceRegistry::new().list_sources() {
            println!("{}", id);
        }
        return Ok(());
    }

    let path = config_path(&cli);
    let config = Config::load(&path).with_context(|| format!("loading {}", path.display()))?;
    let _log_guard = init_logging(&config.logging.directory, &config.logging.file_name);
    init_metrics();

    let outcome = match &cli.command {
        Commands::Clean { source } => {
            SourceRegistry::new().get(source)?;
            run_pipeline(&config, PipelineConfig::clean_only(source)).map(|r| print_result(&r))
        }
        Commands::Join => run_pipeline(&config, PipelineConfig::join_only()).map(|r| print_result(&r)),
        Commands::Run => run_pipeline(&config, PipelineConfig::full()).map(|r| print_result(&r)),
        Commands::Manifest => {
            let store = TableStore::open(&config.paths.database)?;
            for entry in store.manifest()? {
                println!(
                    "{:<28} rows {:>7}  cols {:>4}  {}  run {}  {}",
                    entry.name,
                    entry.row_count,
                    entry.column_count,
                    &entry.fingerprint[..12],
                    entry.run_id,
                    entry.written_at.to_rfc3339()
                );
            }
            Ok(())
        }
        Commands::Sources => Ok(()),
    };

    match write_snapshot(&config.paths.output_dir) {
        Ok(Some(path)) => info!(path = %path.display(), "Metrics snapshot written"),
        Ok(None) => {}
        Err(e) => warn!("Failed to write metrics snapshot: {}", e),
    }
    outcome
}
