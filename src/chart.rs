//! Declarative chart descriptions.
//!
//! A [`ChartSpec`] names the columns to plot and how to color them; it holds
//! no data, so any number of specs can be rendered from one table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    table::Table,
};

pub const DEFAULT_FILL: &str = "#1f77b4";
pub const UNMAPPED_FILL: &str = "#7f7f7f";

/// Categorical palette assigned to hue values in order of first appearance.
pub const CATEGORY_PALETTE: &[&str] = &[
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#bcbd22",
    "#17becf",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartKind {
    /// One bar per row.
    Bar { x: String, y: String },
    /// Grid of scatter facets over every pair of `columns`, colored by `hue`.
    Pair { columns: Vec<String>, hue: String },
}

impl ChartKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChartKind::Bar { .. } => "bar",
            ChartKind::Pair { .. } => "pair",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorStrategy {
    /// Map the whole category column through a lookup table.
    #[default]
    Lookup,
    /// Test each row against the palette entries in order.
    Conditional,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub value: String,
    pub color: String,
}

impl PaletteEntry {
    pub fn new(value: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            color: color.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorBy {
    pub column: String,
    pub palette: Vec<PaletteEntry>,
    #[serde(default = "ColorBy::default_fill")]
    pub default: String,
    #[serde(default)]
    pub strategy: ColorStrategy,
}

impl ColorBy {
    pub fn new(column: impl Into<String>, palette: Vec<PaletteEntry>) -> Self {
        Self {
            column: column.into(),
            palette,
            default: Self::default_fill(),
            strategy: ColorStrategy::default(),
        }
    }

    /// Palette built from the distinct values of `column`, in order of appearance.
    pub fn automatic(table: &Table, column: &str) -> Result<Self> {
        let idx = table.require_column(column)?;
        let mut palette: Vec<PaletteEntry> = Vec::new();
        for value in table.column_values(idx) {
            let key = category_key(value);
            if !palette.iter().any(|entry| entry.value == key) {
                let color = CATEGORY_PALETTE[palette.len() % CATEGORY_PALETTE.len()];
                palette.push(PaletteEntry::new(key, color));
            }
        }
        Ok(Self::new(column, palette))
    }

    pub fn with_strategy(mut self, strategy: ColorStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    fn default_fill() -> String {
        UNMAPPED_FILL.to_string()
    }

    /// One fill per row of `table`.
    pub fn fills(&self, table: &Table) -> Result<Vec<String>> {
        let idx = table.require_column(&self.column)?;
        let keys = table.column_values(idx).map(category_key).collect::<Vec<_>>();
        Ok(match self.strategy {
            ColorStrategy::Lookup => {
                let lookup = self
                    .palette
                    .iter()
                    .rev()
                    .map(|entry| (entry.value.as_str(), entry.color.as_str()))
                    .collect::<HashMap<_, _>>();
                keys.iter()
                    .map(|key| {
                        lookup
                            .get(key.as_str())
                            .copied()
                            .unwrap_or(self.default.as_str())
                            .to_string()
                    })
                    .collect()
            }
            ColorStrategy::Conditional => {
                let mut fills = Vec::with_capacity(keys.len());
                for key in &keys {
                    let mut fill = self.default.as_str();
                    for entry in &self.palette {
                        if &entry.value == key {
                            fill = entry.color.as_str();
                            break;
                        }
                    }
                    fills.push(fill.to_string());
                }
                fills
            }
        })
    }

    pub fn color_of(&self, key: &str) -> &str {
        self.palette
            .iter()
            .find(|entry| entry.value == key)
            .map(|entry| entry.color.as_str())
            .unwrap_or(self.default.as_str())
    }
}

pub(crate) fn category_key(value: Option<&crate::data::Value>) -> String {
    value.map(|v| v.as_display()).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub title: String,
    #[serde(flatten)]
    pub kind: ChartKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorBy>,
}

impl ChartSpec {
    pub fn bar(title: impl Into<String>, x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            kind: ChartKind::Bar {
                x: x.into(),
                y: y.into(),
            },
            color: None,
        }
    }

    pub fn pair<S: Into<String>>(
        title: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
        hue: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            kind: ChartKind::Pair {
                columns: columns.into_iter().map(Into::into).collect(),
                hue: hue.into(),
            },
            color: None,
        }
    }

    pub fn colored_by(mut self, color: ColorBy) -> Self {
        self.color = Some(color);
        self
    }

    /// Every column the chart reads, in the order they are used.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut columns = match &self.kind {
            ChartKind::Bar { x, y } => vec![x.as_str(), y.as_str()],
            ChartKind::Pair { columns, hue } => columns
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(hue.as_str()))
                .collect(),
        };
        if let Some(color) = &self.color {
            columns.push(color.column.as_str());
        }
        columns
    }

    /// Fails with a render error naming the first column `table` lacks.
    pub fn validate(&self, table: &Table) -> Result<()> {
        if let ChartKind::Pair { columns, .. } = &self.kind
            && columns.is_empty()
        {
            return Err(Error::render(&self.title, "pair chart needs at least one column"));
        }
        if let (ChartKind::Pair { hue, .. }, Some(color)) = (&self.kind, &self.color)
            && color.column != *hue
        {
            return Err(Error::render(
                &self.title,
                format!(
                    "pair chart colors by its hue column '{hue}', not '{}'",
                    color.column
                ),
            ));
        }
        for column in self.referenced_columns() {
            if table.column_index(column).is_none() {
                return Err(Error::render(
                    &self.title,
                    format!(
                        "column '{column}' does not exist; available columns: {}",
                        table.headers().join(", ")
                    ),
                ));
            }
        }
        Ok(())
    }
}
