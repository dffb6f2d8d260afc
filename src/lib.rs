pub mod chart;
pub mod cli;
pub mod config;
pub mod data;
pub mod derive;
pub mod error;
pub mod expr;
pub mod filter;
pub mod io_utils;
pub mod pipeline;
pub mod render;
pub mod schema;
pub mod store;
pub mod svg;
pub mod table;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    config::PipelineConfig,
    pipeline::{Exports, Pipeline},
    render::{MemorySink, SvgDirSink},
    store::LoadOptions,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging(verbose: bool) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            let level = if verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            };
            builder.filter_module("csv_enrich", level);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Commands::Run(args) => handle_run(&args),
        Commands::Preview(args) => handle_preview(&args),
        Commands::Schema(args) => handle_schema(&args),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Loading pipeline config from {path:?}")),
        None => {
            debug!("No pipeline config given; using the built-in employee pipeline");
            Ok(PipelineConfig::employees())
        }
    }
}

fn load_options(
    input: &Path,
    delimiter: Option<u8>,
    encoding: Option<&str>,
) -> Result<LoadOptions> {
    Ok(LoadOptions {
        delimiter: io_utils::resolve_input_delimiter(input, delimiter),
        encoding: io_utils::resolve_encoding(encoding)?,
    })
}

fn build_pipeline(
    config_path: Option<&Path>,
    as_of: Option<NaiveDate>,
    options: LoadOptions,
) -> Result<Pipeline> {
    let config = load_config(config_path)?;
    let as_of = config.resolve_as_of(as_of);
    Ok(Pipeline::new(config, as_of).with_load_options(options))
}

fn handle_run(args: &cli::RunArgs) -> Result<()> {
    let options = load_options(&args.input, args.delimiter, args.input_encoding.as_deref())?;
    let pipeline = build_pipeline(args.config.as_deref(), args.as_of, options)?
        .with_exports(Exports {
            enriched: args.export_enriched.clone(),
            filtered: args.export_filtered.clone(),
        })
        .show_tables(!args.quiet);
    let report = if args.dry_run {
        let mut sink = MemorySink::default();
        let report = pipeline.run(&args.input, &mut sink)?;
        info!("Dry run rendered {} chart(s); nothing written", sink.charts.len());
        report
    } else {
        let mut sink = SvgDirSink::new(&args.output_dir);
        let report = pipeline
            .run(&args.input, &mut sink)
            .with_context(|| format!("Running pipeline on {:?}", args.input))?;
        for path in sink.written() {
            debug!("Wrote chart {path:?}");
        }
        info!(
            "{} chart(s) written to {:?}",
            sink.written().len(),
            sink.dir()
        );
        report
    };
    debug!("Run report: {report:?}");
    Ok(())
}

fn handle_preview(args: &cli::PreviewArgs) -> Result<()> {
    let options = load_options(&args.input, args.delimiter, args.input_encoding.as_deref())?;
    let pipeline = build_pipeline(args.config.as_deref(), args.as_of, options)?;
    let table = pipeline
        .load(&args.input)
        .with_context(|| format!("Loading {:?}", args.input))?;
    let stages = pipeline.process(table)?;
    let rows = stages
        .enriched
        .display_rows()
        .into_iter()
        .take(args.rows)
        .collect::<Vec<_>>();
    print!(
        "{}",
        table::render_table(&stages.enriched.headers(), &rows)
    );
    info!(
        "Displayed {} of {} row(s) from {:?}",
        rows.len(),
        stages.enriched.len(),
        args.input
    );
    Ok(())
}

fn handle_schema(args: &cli::SchemaArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    print!("{}", config.to_yaml_string()?);
    Ok(())
}
