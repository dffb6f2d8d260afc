//! Caller-supplied column typing.
//!
//! A [`Schema`] declares which columns are dates, numbers, booleans or
//! strings. Nothing is inferred: a column the schema does not mention is read
//! as a string.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["string", "integer", "float", "boolean", "date"]
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "string" | "str" => Ok(ColumnType::String),
            "integer" | "int" => Ok(ColumnType::Integer),
            "float" | "double" | "number" => Ok(ColumnType::Float),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "date" => Ok(ColumnType::Date),
            _ => Err(Error::Config(format!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            ))),
        }
    }
}

impl Serialize for ColumnType {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        ColumnType::from_str(&token).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub datatype: ColumnType,
    /// chrono format string for date columns; the default list is tried otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, datatype: ColumnType) -> Self {
        Self {
            name: name.into(),
            datatype,
            format: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    /// The schema of the employee dataset: `name,salary,hire date`.
    pub fn employees() -> Self {
        Self::new(vec![
            ColumnSpec::new("name", ColumnType::String),
            ColumnSpec::new("salary", ColumnType::Integer),
            ColumnSpec::new("hire date", ColumnType::Date),
        ])
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn datatype_of(&self, name: &str) -> ColumnType {
        self.column(name)
            .map(|c| c.datatype)
            .unwrap_or(ColumnType::String)
    }

    pub fn date_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns
            .iter()
            .filter(|c| c.datatype == ColumnType::Date)
    }

    /// Every declared column must appear in the header.
    pub fn validate_headers(&self, headers: &[String]) -> Result<()> {
        for column in &self.columns {
            if !headers.iter().any(|h| h == &column.name) {
                return Err(Error::Schema(format!(
                    "Declared column '{}' is missing from header [{}]",
                    column.name,
                    headers.join(", ")
                )));
            }
        }
        Ok(())
    }

    pub fn ensure_unique(&self) -> Result<()> {
        for (idx, column) in self.columns.iter().enumerate() {
            if self.columns[..idx].iter().any(|c| c.name == column.name) {
                return Err(Error::Config(format!(
                    "Column '{}' is declared more than once",
                    column.name
                )));
            }
        }
        Ok(())
    }
}
