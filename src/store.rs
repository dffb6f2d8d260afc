//! Loads a delimited source into a typed [`Table`].

use std::{io::Read, path::Path};

use encoding_rs::{Encoding, UTF_8};
use log::{debug, info};

use crate::{
    data::{Value, parse_naive_date, parse_typed_value},
    error::{Error, Result},
    io_utils,
    schema::{ColumnType, Schema},
    table::{Column, Table},
};

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: io_utils::DEFAULT_CSV_DELIMITER,
            encoding: UTF_8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    schema: Schema,
    options: LoadOptions,
}

impl RecordStore {
    pub fn new(schema: Schema, options: LoadOptions) -> Self {
        Self { schema, options }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn load_path(&self, path: &Path) -> Result<Table> {
        let reader = io_utils::open_source(path)?;
        let origin = if io_utils::is_dash(path) {
            "stdin".to_string()
        } else {
            path.display().to_string()
        };
        self.load(reader, &origin)
    }

    /// Reads every row of `reader`; `origin` names the source in messages.
    pub fn load<R: Read>(&self, reader: R, origin: &str) -> Result<Table> {
        let mut reader = io_utils::open_csv_reader(reader, self.options.delimiter);
        let encoding = self.options.encoding;

        let header_record = reader
            .byte_headers()
            .map_err(|err| Error::Load(format!("Reading header of {origin}: {err}")))?
            .clone();
        let headers = io_utils::decode_record(&header_record, encoding)?;
        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(Error::Load(format!("{origin} has no header row")));
        }
        for (idx, header) in headers.iter().enumerate() {
            if headers[..idx].contains(header) {
                return Err(Error::Load(format!(
                    "{origin} declares column '{header}' more than once"
                )));
            }
        }
        self.schema.validate_headers(&headers)?;

        let columns = headers
            .iter()
            .map(|name| Column::new(name.clone(), self.schema.datatype_of(name)))
            .collect::<Vec<_>>();
        let formats = headers
            .iter()
            .map(|name| self.schema.column(name).and_then(|c| c.format.clone()))
            .collect::<Vec<_>>();
        debug!(
            "Columns for {origin}: {}",
            columns
                .iter()
                .map(|c| format!("{}:{}", c.name, c.datatype))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut table = Table::new(columns.clone());
        for (row_idx, record) in reader.byte_records().enumerate() {
            let fallback_line = row_idx as u64 + 2;
            let record = record.map_err(|err| {
                Error::Load(format!("Reading line {fallback_line} of {origin}: {err}"))
            })?;
            let line = record
                .position()
                .map(|p| p.line())
                .unwrap_or(fallback_line);
            if record.len() != headers.len() {
                return Err(Error::Load(format!(
                    "Line {line} of {origin} has {} field(s) but the header declares {}",
                    record.len(),
                    headers.len()
                )));
            }
            let decoded = io_utils::decode_record(&record, encoding)?;
            let mut row = Vec::with_capacity(decoded.len());
            for ((raw, column), format) in decoded.iter().zip(&columns).zip(&formats) {
                let value = match column.datatype {
                    ColumnType::Date if raw.is_empty() => None,
                    ColumnType::Date => Some(Value::Date(
                        parse_naive_date(raw, format.as_deref()).map_err(|err| {
                            Error::Load(format!(
                                "Column '{}' on line {line} of {origin}: {err}",
                                column.name
                            ))
                        })?,
                    )),
                    other => parse_typed_value(raw, &other).map_err(|err| {
                        Error::Schema(format!(
                            "Column '{}' declared {} on line {line} of {origin}: {err}",
                            column.name, column.datatype
                        ))
                    })?,
                };
                row.push(value);
            }
            table.push_row(row)?;
        }

        info!(
            "Loaded {} row(s) across {} column(s) from {origin}",
            table.len(),
            headers.len()
        );
        Ok(table)
    }
}
