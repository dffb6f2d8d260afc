use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Enrich, filter, and chart CSV records", long_about = None)]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load, derive, filter, and render charts for a CSV file
    Run(RunArgs),
    /// Show the first rows of a CSV file after derivation
    Preview(PreviewArgs),
    /// Print the effective pipeline configuration as YAML
    Schema(SchemaArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Input CSV file ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Pipeline YAML; the built-in employee pipeline is used when omitted
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Directory receiving one SVG file per chart
    #[arg(short = 'o', long = "output-dir", default_value = "charts")]
    pub output_dir: PathBuf,
    /// Reference date for tenure calculations (YYYY-MM-DD, defaults to today)
    #[arg(long = "as-of")]
    pub as_of: Option<NaiveDate>,
    /// Write the enriched table to this CSV file ('-' for stdout)
    #[arg(long = "export-enriched")]
    pub export_enriched: Option<PathBuf>,
    /// Write the filtered table to this CSV file ('-' for stdout)
    #[arg(long = "export-filtered")]
    pub export_filtered: Option<PathBuf>,
    /// Render charts without writing any SVG files
    #[arg(long = "dry-run")]
    pub dry_run: bool,
    /// Skip printing the enriched and filtered tables
    #[arg(short = 'q', long)]
    pub quiet: bool,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Input CSV file ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Pipeline YAML; the built-in employee pipeline is used when omitted
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    /// Reference date for tenure calculations (YYYY-MM-DD, defaults to today)
    #[arg(long = "as-of")]
    pub as_of: Option<NaiveDate>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Pipeline YAML to validate and echo
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
