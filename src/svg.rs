//! Minimal SVG writer and the scales used to lay out charts.

use std::fmt::Write as _;

use kurbo::{Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

impl TextAnchor {
    fn as_str(self) -> &'static str {
        match self {
            TextAnchor::Start => "start",
            TextAnchor::Middle => "middle",
            TextAnchor::End => "end",
        }
    }
}

/// Accumulates SVG elements; the element count doubles as the mark count.
#[derive(Debug)]
pub struct SvgDocument {
    width: f64,
    height: f64,
    body: String,
    elements: usize,
}

impl SvgDocument {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            body: String::new(),
            elements: 0,
        }
    }

    pub fn elements(&self) -> usize {
        self.elements
    }

    pub fn rect(&mut self, rect: Rect, fill: &str) {
        self.elements += 1;
        let _ = writeln!(
            self.body,
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}"/>"#,
            rect.x0,
            rect.y0,
            rect.width(),
            rect.height(),
            escape_xml(fill)
        );
    }

    pub fn outline(&mut self, rect: Rect, stroke: &str) {
        self.elements += 1;
        let _ = writeln!(
            self.body,
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="none" stroke="{}"/>"#,
            rect.x0,
            rect.y0,
            rect.width(),
            rect.height(),
            escape_xml(stroke)
        );
    }

    pub fn circle(&mut self, center: Point, radius: f64, fill: &str) {
        self.elements += 1;
        let _ = writeln!(
            self.body,
            r#"<circle cx="{:.2}" cy="{:.2}" r="{radius}" fill="{}" fill-opacity="0.8"/>"#,
            center.x,
            center.y,
            escape_xml(fill)
        );
    }

    pub fn line(&mut self, from: Point, to: Point, stroke: &str) {
        self.elements += 1;
        let _ = writeln!(
            self.body,
            r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}"/>"#,
            from.x,
            from.y,
            to.x,
            to.y,
            escape_xml(stroke)
        );
    }

    pub fn text(&mut self, pos: Point, font_size: f64, anchor: TextAnchor, angle: f64, text: &str) {
        self.elements += 1;
        let _ = write!(
            self.body,
            r#"<text x="{:.2}" y="{:.2}" font-size="{font_size}" text-anchor="{}""#,
            pos.x,
            pos.y,
            anchor.as_str()
        );
        if angle != 0.0 {
            let _ = write!(
                self.body,
                r#" transform="rotate({angle} {:.2} {:.2})""#,
                pos.x, pos.y
            );
        }
        let _ = writeln!(self.body, ">{}</text>", escape_xml(text));
    }

    pub fn finish(self) -> String {
        let mut out = String::with_capacity(self.body.len() + 160);
        let _ = writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}" font-family="sans-serif">"#,
            w = self.width,
            h = self.height
        );
        out.push_str(&self.body);
        out.push_str("</svg>\n");
        out
    }
}

pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// A linear mapping from a continuous domain to a continuous range.
#[derive(Clone, Copy, Debug)]
pub struct ScaleLinear {
    domain: (f64, f64),
    range: (f64, f64),
}

impl ScaleLinear {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    /// Domain covering `values`, widened to nice tick bounds.
    pub fn fitted<I>(values: I, include_zero: bool, range: (f64, f64)) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let (mut min, mut max) = values
            .into_iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if !min.is_finite() || !max.is_finite() {
            (min, max) = (0.0, 1.0);
        }
        if include_zero {
            min = min.min(0.0);
            max = max.max(0.0);
        }
        if min == max {
            min -= 1.0;
            max += 1.0;
        }
        let ticks = nice_ticks(min, max, 5);
        let domain = match (ticks.first(), ticks.last()) {
            (Some(first), Some(last)) if ticks.len() >= 2 => (*first, *last),
            _ => (min, max),
        };
        Self::new(domain, range)
    }

    pub fn map(&self, x: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        let denom = d1 - d0;
        if denom == 0.0 {
            return r0;
        }
        let t = (x - d0) / denom;
        r0 + t * (r1 - r0)
    }

    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    pub fn ticks(&self, count: usize) -> Vec<f64> {
        nice_ticks(self.domain.0, self.domain.1, count)
    }
}

fn nice_ticks(mut min: f64, mut max: f64, count: usize) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }
    if min == max {
        return vec![min];
    }
    if min > max {
        std::mem::swap(&mut min, &mut max);
    }
    let step = nice_step((max - min) / count as f64);
    if step == 0.0 {
        return vec![min, max];
    }
    let start = (min / step).floor() * step;
    let stop = (max / step).ceil() * step;
    let n = ((stop - start) / step).round().clamp(0.0, 10_000.0) as u64;
    (0..=n).map(|i| start + step * i as f64).collect()
}

fn nice_step(step: f64) -> f64 {
    if !step.is_finite() || step <= 0.0 {
        return 0.0;
    }
    let power = step.log10().floor();
    let base = 10_f64.powf(power);
    let error = step / base;
    let nice = if error >= 7.5 {
        10.0
    } else if error >= 3.5 {
        5.0
    } else if error >= 1.5 {
        2.0
    } else {
        1.0
    };
    nice * base
}

/// Evenly spaced bands for categorical axes.
#[derive(Clone, Copy, Debug)]
pub struct ScaleBand {
    range: (f64, f64),
    count: usize,
    padding: f64,
}

impl ScaleBand {
    pub fn new(range: (f64, f64), count: usize) -> Self {
        Self {
            range,
            count,
            padding: 0.2,
        }
    }

    pub fn band_width(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let step = (self.range.1 - self.range.0).abs() / self.count as f64;
        step * (1.0 - self.padding)
    }

    pub fn x(&self, index: usize) -> f64 {
        if self.count == 0 {
            return self.range.0;
        }
        let step = (self.range.1 - self.range.0).abs() / self.count as f64;
        self.range.0.min(self.range.1) + step * index as f64 + step * self.padding / 2.0
    }
}

pub fn format_tick(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value:.2}")
    }
}
