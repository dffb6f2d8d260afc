//! In-memory table of typed records and its aligned text view.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::io::Write;

use crate::{
    data::Value,
    error::{Error, Result},
    schema::ColumnType,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub datatype: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, datatype: ColumnType) -> Self {
        Self {
            name: name.into(),
            datatype,
        }
    }
}

/// Rows in source order; every row holds exactly one cell per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Option<Value>>>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Option<Value>>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::Schema(format!(
                "Row has {} cell(s) but the table has {} column(s)",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| {
            Error::Schema(format!(
                "Column '{name}' not found; available columns: {}",
                self.headers().join(", ")
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn record(&self, index: usize) -> Option<Record<'_>> {
        self.rows.get(index).map(|values| Record {
            columns: &self.columns,
            values,
            index,
        })
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().enumerate().map(|(index, values)| Record {
            columns: &self.columns,
            values,
            index,
        })
    }

    /// Cells of one column, in row order.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = Option<&Value>> {
        self.rows.iter().map(move |row| row[index].as_ref())
    }

    /// Writes a whole column in one step, overwriting an existing column of
    /// the same name in place or appending a new one.
    pub(crate) fn set_column(&mut self, column: Column, values: Vec<Option<Value>>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(Error::Schema(format!(
                "Column '{}' has {} value(s) but the table has {} row(s)",
                column.name,
                values.len(),
                self.rows.len()
            )));
        }
        match self.column_index(&column.name) {
            Some(idx) => {
                self.columns[idx] = column;
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(column);
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// New table holding the selected rows in the given order.
    pub(crate) fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&idx| self.rows[idx].clone()).collect(),
        }
    }

    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.as_ref().map(Value::as_display).unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    pub fn write_csv<W: Write>(&self, writer: &mut csv::Writer<W>) -> csv::Result<()> {
        writer.write_record(self.columns.iter().map(|c| c.name.as_str()))?;
        for row in self.display_rows() {
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Borrowed view of one row.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [Column],
    values: &'a [Option<Value>],
    index: usize,
}

impl<'a> Record<'a> {
    /// Zero-based position of the row within its table.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, name: &str) -> Option<&'a Value> {
        let idx = self.columns.iter().position(|c| c.name == name)?;
        self.values[idx].as_ref()
    }

    pub fn columns(&self) -> &'a [Column] {
        self.columns
    }

    pub fn values(&self) -> &'a [Option<Value>] {
        self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, Option<&'a Value>)> {
        self.columns
            .iter()
            .zip(self.values.iter())
            .map(|(column, value)| (column.name.as_str(), value.as_ref()))
    }
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));

    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator_cells, &separator_widths));

    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }

    output
}

pub fn render(table: &Table) -> String {
    render_table(&table.headers(), &table.display_rows())
}

pub fn print_table(table: &Table) {
    print!("{}", render(table));
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate().take(widths.len()) {
        let sanitized = sanitize_cell(value);
        let padding = widths[idx].saturating_sub(display_width(sanitized.as_ref()));
        let mut cell = sanitized.into_owned();
        cell.push_str(&" ".repeat(padding));
        cells.push(cell);
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::new(vec![
            Column::new("name", ColumnType::String),
            Column::new("salary", ColumnType::Integer),
        ]);
        table
            .push_row(vec![Some(Value::String("Ann".into())), Some(Value::Integer(6000))])
            .unwrap();
        table
            .push_row(vec![Some(Value::String("Bo".into())), None])
            .unwrap();
        table
    }

    #[test]
    fn render_table_aligns_columns() {
        let rendered = render(&sample());
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines, vec!["name  salary", "----  ------", "Ann   6000", "Bo"]);
    }

    #[test]
    fn set_column_overwrites_in_place() {
        let mut table = sample();
        let flag = Column::new("flag", ColumnType::String);
        table
            .set_column(flag.clone(), vec![Some(Value::String("a".into())), None])
            .unwrap();
        table
            .set_column(flag, vec![None, Some(Value::String("b".into()))])
            .unwrap();
        assert_eq!(table.headers(), vec!["name", "salary", "flag"]);
        let record = table.record(1).unwrap();
        assert_eq!(record.get("flag"), Some(&Value::String("b".into())));
    }

    #[test]
    fn set_column_rejects_length_mismatch() {
        let mut table = sample();
        let err = table
            .set_column(Column::new("flag", ColumnType::String), vec![None])
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
        assert_eq!(table.columns().len(), 2);
    }

    #[test]
    fn push_row_rejects_short_rows() {
        let mut table = sample();
        assert!(table.push_row(vec![None]).is_err());
        assert_eq!(table.len(), 2);
    }
}
