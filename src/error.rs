//! Error taxonomy shared by every pipeline stage.
//!
//! Each variant names the stage that detected the problem. Errors are never
//! retried: the input is static, so a rerun reproduces the same failure.

use std::{io, path::PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Unreadable or malformed delimited source.
    #[error("load error: {0}")]
    Load(String),
    /// Declared column type conflicts with the data, or a column is missing.
    #[error("schema error: {0}")]
    Schema(String),
    #[error("derivation error in rule '{rule}'{}: {message}", row_suffix(.row))]
    Derivation {
        rule: String,
        row: Option<usize>,
        message: String,
    },
    #[error("render error in chart '{chart}': {message}")]
    Render { chart: String, message: String },
    /// Pipeline configuration could not be read or is inconsistent.
    #[error("config error: {0}")]
    Config(String),
    #[error("failed writing {path:?}")]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn derivation(rule: &str, row: Option<usize>, message: impl Into<String>) -> Self {
        Error::Derivation {
            rule: rule.to_string(),
            row,
            message: message.into(),
        }
    }

    pub(crate) fn render(chart: &str, message: impl Into<String>) -> Self {
        Error::Render {
            chart: chart.to_string(),
            message: message.into(),
        }
    }
}

fn row_suffix(row: &Option<usize>) -> String {
    row.map(|row| format!(" at row {row}")).unwrap_or_default()
}
