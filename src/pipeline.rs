//! End-to-end run: load, derive, filter, render, export.
//!
//! Every stage that can fail runs before anything leaves the process: charts
//! are only handed to the sink, and tables only printed or exported, once all
//! derivations and renders have succeeded.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use log::{debug, info};

use crate::{
    config::{ChartSource, PipelineConfig},
    derive,
    error::{Error, Result},
    filter, io_utils,
    render::{ChartSink, RenderSession},
    store::{LoadOptions, RecordStore},
    table::{self, Table},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exports {
    pub enriched: Option<PathBuf>,
    pub filtered: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub loaded_rows: usize,
    pub derived_columns: Vec<String>,
    pub filtered_rows: usize,
    pub charts: usize,
}

/// The enriched table and its filtered view.
#[derive(Debug, Clone, PartialEq)]
pub struct Stages {
    pub enriched: Table,
    pub filtered: Table,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    options: LoadOptions,
    as_of: NaiveDate,
    exports: Exports,
    show_tables: bool,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, as_of: NaiveDate) -> Self {
        Self {
            config,
            options: LoadOptions::default(),
            as_of,
            exports: Exports::default(),
            show_tables: false,
        }
    }

    pub fn with_load_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_exports(mut self, exports: Exports) -> Self {
        self.exports = exports;
        self
    }

    /// Print the enriched and filtered tables to stdout after a successful run.
    pub fn show_tables(mut self, show: bool) -> Self {
        self.show_tables = show;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    pub fn load(&self, input: &Path) -> Result<Table> {
        RecordStore::new(self.config.schema.clone(), self.options).load_path(input)
    }

    /// Derives every configured column, then applies the filter.
    pub fn process(&self, mut table: Table) -> Result<Stages> {
        let rules = self.config.rules(self.as_of);
        derive::derive_all(&mut table, &rules)?;
        let filtered = match self.config.predicate(self.as_of)? {
            Some(predicate) => filter::filter(&table, &predicate)?,
            None => table.clone(),
        };
        debug!(
            "Filter kept {} of {} enriched row(s)",
            filtered.len(),
            table.len()
        );
        Ok(Stages {
            enriched: table,
            filtered,
        })
    }

    pub fn run<S: ChartSink>(&self, input: &Path, sink: S) -> Result<RunReport> {
        info!(
            "Running pipeline on '{}' (delimiter '{}', as of {})",
            input.display(),
            io_utils::printable_delimiter(self.options.delimiter),
            self.as_of
        );
        let table = self.load(input)?;
        self.run_table(table, sink)
    }

    /// Runs every stage after loading on an already loaded table.
    pub fn run_table<S: ChartSink>(&self, table: Table, sink: S) -> Result<RunReport> {
        let loaded_rows = table.len();
        let stages = self.process(table)?;

        let mut session = RenderSession::new(sink);
        for chart in &self.config.charts {
            let source = match chart.source {
                ChartSource::All => &stages.enriched,
                ChartSource::Filtered => &stages.filtered,
            };
            session.render(source, &chart.spec)?;
        }

        let exports = [
            (self.exports.enriched.as_deref(), &stages.enriched),
            (self.exports.filtered.as_deref(), &stages.filtered),
        ];
        write_exports(&exports)?;

        if self.show_tables {
            println!("Enriched records ({} row(s))", stages.enriched.len());
            table::print_table(&stages.enriched);
            println!();
            println!("Filtered records ({} row(s))", stages.filtered.len());
            table::print_table(&stages.filtered);
        }

        let charts = session.pending().len();
        session.flush()?;
        let report = RunReport {
            loaded_rows,
            derived_columns: self.config.derive.iter().map(|r| r.name.clone()).collect(),
            filtered_rows: stages.filtered.len(),
            charts,
        };
        info!(
            "Loaded {} row(s), kept {}, rendered {} chart(s)",
            report.loaded_rows, report.filtered_rows, report.charts
        );
        Ok(report)
    }
}

type ExportWriter = csv::Writer<Box<dyn std::io::Write>>;

/// Opens every export before writing any of them. On failure, files created
/// by this call are removed so that a failed run leaves no partial export.
fn write_exports(exports: &[(Option<&Path>, &Table)]) -> Result<()> {
    let mut opened: Vec<(&Path, &Table, ExportWriter)> = Vec::new();
    for &(path, table) in exports {
        let Some(path) = path else {
            continue;
        };
        match io_utils::open_csv_writer(path) {
            Ok(writer) => opened.push((path, table, writer)),
            Err(err) => {
                discard(opened.into_iter().map(|(path, ..)| path));
                return Err(err);
            }
        }
    }

    let paths = opened.iter().map(|(path, ..)| *path).collect::<Vec<_>>();
    for (path, table, mut writer) in opened {
        if let Err(err) = export(table, path, &mut writer) {
            drop(writer);
            discard(paths.into_iter());
            return Err(err);
        }
    }
    Ok(())
}

fn export(table: &Table, path: &Path, writer: &mut ExportWriter) -> Result<()> {
    let output_error = |err: std::io::Error| Error::Output {
        path: path.to_path_buf(),
        source: err,
    };
    table
        .write_csv(writer)
        .map_err(|err| output_error(err.into()))?;
    writer.flush().map_err(output_error)?;
    info!("Wrote {} row(s) to {path:?}", table.len());
    Ok(())
}

fn discard<'a>(paths: impl Iterator<Item = &'a Path>) {
    for path in paths.filter(|path| !io_utils::is_dash(path)) {
        if let Err(err) = fs::remove_file(path) {
            debug!("Could not remove partial export {path:?}: {err}");
        }
    }
}
