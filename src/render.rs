//! Turns a [`ChartSpec`] plus a table into an SVG document.
//!
//! Rendering is pure: [`render`] reads the table and returns a
//! [`RenderedChart`]. Charts only reach a sink through
//! [`RenderSession::flush`], which consumes the session.

use std::{
    fs,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use kurbo::{Point, Rect};
use log::{debug, info};

use crate::{
    chart::{ChartKind, ChartSpec, ColorBy, DEFAULT_FILL, category_key},
    error::{Error, Result},
    svg::{ScaleBand, ScaleLinear, SvgDocument, TextAnchor, format_tick},
    table::Table,
};

const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 140.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 90.0;
const PLOT_HEIGHT: f64 = 300.0;
const BAND_WIDTH: f64 = 48.0;
const FACET_SIZE: f64 = 150.0;
const FACET_GAP: f64 = 12.0;
const POINT_RADIUS: f64 = 3.5;
const AXIS_COLOR: &str = "#333333";
const FACET_BORDER: &str = "#bbbbbb";

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChart {
    pub title: String,
    pub kind: &'static str,
    pub svg: String,
    /// Number of SVG elements drawn.
    pub marks: usize,
    /// Fill of every data mark, in row order (bars) or facet order (pairs).
    pub fills: Vec<String>,
}

pub fn render(table: &Table, spec: &ChartSpec) -> Result<RenderedChart> {
    spec.validate(table)?;
    let chart = match &spec.kind {
        ChartKind::Bar { x, y } => render_bar(table, spec, x, y)?,
        ChartKind::Pair { columns, hue } => render_pair(table, spec, columns, hue)?,
    };
    debug!(
        "Rendered {} chart '{}' with {} mark(s)",
        chart.kind, chart.title, chart.marks
    );
    Ok(chart)
}

/// Renders every spec in order, stopping at the first failure.
pub fn render_all(table: &Table, specs: &[ChartSpec]) -> Result<Vec<RenderedChart>> {
    specs.iter().map(|spec| render(table, spec)).collect()
}

fn numeric_column(table: &Table, spec: &ChartSpec, column: &str) -> Result<Vec<f64>> {
    let idx = table
        .column_index(column)
        .ok_or_else(|| Error::render(&spec.title, format!("column '{column}' does not exist")))?;
    table
        .column_values(idx)
        .enumerate()
        .map(|(row, value)| match value {
            Some(value) => value.as_f64().ok_or_else(|| {
                Error::render(
                    &spec.title,
                    format!(
                        "column '{column}' is not numeric (row {} holds '{value}')",
                        row + 1
                    ),
                )
            }),
            None => Err(Error::render(
                &spec.title,
                format!("column '{column}' has no value at row {}", row + 1),
            )),
        })
        .collect()
}

fn row_fills(table: &Table, spec: &ChartSpec) -> Result<Vec<String>> {
    match &spec.color {
        Some(color) => color.fills(table),
        None => Ok(vec![DEFAULT_FILL.to_string(); table.len()]),
    }
}

fn draw_title(doc: &mut SvgDocument, width: f64, title: &str) {
    doc.text(
        Point::new(width / 2.0, MARGIN_TOP / 2.0 + 6.0),
        16.0,
        TextAnchor::Middle,
        0.0,
        title,
    );
}

fn draw_legend(doc: &mut SvgDocument, origin: Point, heading: &str, entries: &[(String, String)]) {
    doc.text(origin, 12.0, TextAnchor::Start, 0.0, heading);
    for (idx, (label, fill)) in entries.iter().enumerate() {
        let y = origin.y + 18.0 * (idx as f64 + 1.0);
        doc.rect(Rect::new(origin.x, y - 10.0, origin.x + 12.0, y + 2.0), fill);
        doc.text(Point::new(origin.x + 18.0, y), 12.0, TextAnchor::Start, 0.0, label);
    }
}

fn legend_entries(color: &ColorBy, table: &Table) -> Result<Vec<(String, String)>> {
    let idx = table.require_column(&color.column)?;
    Ok(table
        .column_values(idx)
        .map(category_key)
        .unique()
        .map(|key| {
            let fill = color.color_of(&key).to_string();
            (key, fill)
        })
        .collect())
}

fn render_bar(table: &Table, spec: &ChartSpec, x: &str, y: &str) -> Result<RenderedChart> {
    let heights = numeric_column(table, spec, y)?;
    let x_idx = table.require_column(x)?;
    let labels = table.column_values(x_idx).map(category_key).collect::<Vec<_>>();
    let fills = row_fills(table, spec)?;

    let plot_width = (BAND_WIDTH * heights.len() as f64).max(BAND_WIDTH * 4.0);
    let width = MARGIN_LEFT + plot_width + MARGIN_RIGHT;
    let height = MARGIN_TOP + PLOT_HEIGHT + MARGIN_BOTTOM;
    let plot = Rect::new(
        MARGIN_LEFT,
        MARGIN_TOP,
        MARGIN_LEFT + plot_width,
        MARGIN_TOP + PLOT_HEIGHT,
    );

    let y_scale = ScaleLinear::fitted(heights.iter().copied(), true, (plot.y1, plot.y0));
    let band = ScaleBand::new((plot.x0, plot.x1), heights.len());
    let mut doc = SvgDocument::new(width, height);
    draw_title(&mut doc, width, &spec.title);

    for tick in y_scale.ticks(5) {
        let ty = y_scale.map(tick);
        doc.line(Point::new(plot.x0 - 4.0, ty), Point::new(plot.x0, ty), AXIS_COLOR);
        doc.text(
            Point::new(plot.x0 - 8.0, ty + 4.0),
            11.0,
            TextAnchor::End,
            0.0,
            &format_tick(tick),
        );
    }

    let baseline = y_scale.map(0.0);
    for (idx, ((value, label), fill)) in heights.iter().zip(&labels).zip(&fills).enumerate() {
        let x0 = band.x(idx);
        let top = y_scale.map(*value);
        let bar = Rect::new(x0, top.min(baseline), x0 + band.band_width(), top.max(baseline));
        doc.rect(bar, fill);
        let center = x0 + band.band_width() / 2.0;
        doc.text(
            Point::new(center, plot.y1 + 14.0),
            11.0,
            TextAnchor::End,
            -45.0,
            label,
        );
    }

    doc.line(Point::new(plot.x0, baseline), Point::new(plot.x1, baseline), AXIS_COLOR);
    doc.line(Point::new(plot.x0, plot.y0), Point::new(plot.x0, plot.y1), AXIS_COLOR);
    doc.text(
        Point::new((plot.x0 + plot.x1) / 2.0, height - 8.0),
        12.0,
        TextAnchor::Middle,
        0.0,
        x,
    );
    doc.text(
        Point::new(16.0, (plot.y0 + plot.y1) / 2.0),
        12.0,
        TextAnchor::Middle,
        -90.0,
        y,
    );

    if let Some(color) = &spec.color {
        let entries = legend_entries(color, table)?;
        draw_legend(
            &mut doc,
            Point::new(plot.x1 + 20.0, plot.y0 + 12.0),
            &color.column,
            &entries,
        );
    }

    let marks = doc.elements();
    Ok(RenderedChart {
        title: spec.title.clone(),
        kind: spec.kind.name(),
        svg: doc.finish(),
        marks,
        fills,
    })
}

fn render_pair(
    table: &Table,
    spec: &ChartSpec,
    columns: &[String],
    hue: &str,
) -> Result<RenderedChart> {
    let series = columns
        .iter()
        .map(|column| numeric_column(table, spec, column))
        .collect::<Result<Vec<_>>>()?;
    // `validate` guarantees a configured color follows the hue column.
    let color = match &spec.color {
        Some(color) => color.clone(),
        None => ColorBy::automatic(table, hue)?,
    };
    let fills = color.fills(table)?;
    let hue_idx = table.require_column(hue)?;
    let hue_keys = table.column_values(hue_idx).map(category_key).collect::<Vec<_>>();

    let n = columns.len();
    let grid = n as f64 * FACET_SIZE + (n.saturating_sub(1)) as f64 * FACET_GAP;
    let width = MARGIN_LEFT + grid + MARGIN_RIGHT;
    let height = MARGIN_TOP + grid + MARGIN_BOTTOM;
    let mut doc = SvgDocument::new(width, height);
    draw_title(&mut doc, width, &spec.title);

    let facet = |row: usize, col: usize| {
        let x0 = MARGIN_LEFT + col as f64 * (FACET_SIZE + FACET_GAP);
        let y0 = MARGIN_TOP + row as f64 * (FACET_SIZE + FACET_GAP);
        Rect::new(x0, y0, x0 + FACET_SIZE, y0 + FACET_SIZE)
    };
    let inset = 8.0;
    let mut point_fills = Vec::new();

    for (row, col) in (0..n).cartesian_product(0..n) {
        let area = facet(row, col);
        doc.outline(area, FACET_BORDER);
        let x_scale = ScaleLinear::fitted(
            series[col].iter().copied(),
            false,
            (area.x0 + inset, area.x1 - inset),
        );
        if row == col {
            // Strip of each value, one lane per hue value.
            let lanes = color.palette.len().max(1) as f64;
            for (idx, value) in series[col].iter().enumerate() {
                let lane = color
                    .palette
                    .iter()
                    .position(|entry| entry.value == hue_keys[idx])
                    .unwrap_or(0) as f64;
                let y = area.y0 + inset + (area.height() - 2.0 * inset) * (lane + 0.5) / lanes;
                doc.circle(Point::new(x_scale.map(*value), y), POINT_RADIUS, &fills[idx]);
                point_fills.push(fills[idx].clone());
            }
        } else {
            let y_scale = ScaleLinear::fitted(
                series[row].iter().copied(),
                false,
                (area.y1 - inset, area.y0 + inset),
            );
            for (idx, (xv, yv)) in series[col].iter().zip(&series[row]).enumerate() {
                doc.circle(
                    Point::new(x_scale.map(*xv), y_scale.map(*yv)),
                    POINT_RADIUS,
                    &fills[idx],
                );
                point_fills.push(fills[idx].clone());
            }
        }
    }

    for (idx, column) in columns.iter().enumerate() {
        let bottom = facet(n - 1, idx);
        doc.text(
            Point::new((bottom.x0 + bottom.x1) / 2.0, bottom.y1 + 18.0),
            12.0,
            TextAnchor::Middle,
            0.0,
            column,
        );
        let left = facet(idx, 0);
        doc.text(
            Point::new(left.x0 - 12.0, (left.y0 + left.y1) / 2.0),
            12.0,
            TextAnchor::Middle,
            -90.0,
            column,
        );
    }

    let entries = legend_entries(&color, table)?;
    draw_legend(
        &mut doc,
        Point::new(MARGIN_LEFT + grid + 20.0, MARGIN_TOP + 12.0),
        hue,
        &entries,
    );

    let marks = doc.elements();
    Ok(RenderedChart {
        title: spec.title.clone(),
        kind: spec.kind.name(),
        svg: doc.finish(),
        marks,
        fills: point_fills,
    })
}

/// Destination for rendered charts.
pub trait ChartSink {
    /// Receives the chart at `index` in render order.
    fn write(&mut self, index: usize, chart: &RenderedChart) -> Result<()>;
}

impl<S: ChartSink + ?Sized> ChartSink for &mut S {
    fn write(&mut self, index: usize, chart: &RenderedChart) -> Result<()> {
        (**self).write(index, chart)
    }
}

/// Keeps rendered charts in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub charts: Vec<RenderedChart>,
}

impl ChartSink for MemorySink {
    fn write(&mut self, _index: usize, chart: &RenderedChart) -> Result<()> {
        self.charts.push(chart.clone());
        Ok(())
    }
}

/// Writes each chart to `<dir>/<NN>-<slug>.svg`.
#[derive(Debug)]
pub struct SvgDirSink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl SvgDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ChartSink for SvgDirSink {
    fn write(&mut self, index: usize, chart: &RenderedChart) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|source| Error::Output {
            path: self.dir.clone(),
            source,
        })?;
        let path = self
            .dir
            .join(format!("{:02}-{}.svg", index + 1, slugify(&chart.title)));
        fs::write(&path, &chart.svg).map_err(|source| Error::Output {
            path: path.clone(),
            source,
        })?;
        self.written.push(path);
        Ok(())
    }
}

pub fn slugify(title: &str) -> String {
    let slug = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .join("-");
    if slug.is_empty() {
        "chart".to_string()
    } else {
        slug
    }
}

/// Collects rendered charts until a single [`flush`](RenderSession::flush).
#[derive(Debug)]
pub struct RenderSession<S: ChartSink> {
    sink: S,
    pending: Vec<RenderedChart>,
}

impl<S: ChartSink> RenderSession<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            pending: Vec::new(),
        }
    }

    pub fn render(&mut self, table: &Table, spec: &ChartSpec) -> Result<&RenderedChart> {
        let chart = render(table, spec)?;
        self.pending.push(chart);
        Ok(&self.pending[self.pending.len() - 1])
    }

    pub fn render_all(&mut self, table: &Table, specs: &[ChartSpec]) -> Result<()> {
        let charts = render_all(table, specs)?;
        self.pending.extend(charts);
        Ok(())
    }

    pub fn pending(&self) -> &[RenderedChart] {
        &self.pending
    }

    /// Hands every pending chart to the sink and returns the sink.
    pub fn flush(mut self) -> Result<S> {
        for (index, chart) in self.pending.iter().enumerate() {
            self.sink.write(index, chart)?;
        }
        info!("Flushed {} chart(s)", self.pending.len());
        Ok(self.sink)
    }
}
