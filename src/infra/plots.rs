// ============================================================
// Layer 6 — Plot Writer
// ============================================================
// Read-only consumer of the feature table and the fitted
// model. Writes SVG files into one directory:
//
//   distributions.svg               histogram + KDE per numerical column
//   count_<column>.svg              bar chart per categorical column
//   correlation.svg                 Pearson heatmap, numerical columns
//   feature_importance_<stage>.svg  horizontal importance bars
//
// Rendering uses plotters' SVG backend only, so no system
// fonts or image libraries are needed. Any drawing failure is
// returned as an error.

use anyhow::{anyhow, Context, Result};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::domain::schema::ColumnRoles;
use crate::domain::table::DataTable;

const HIST_BINS:  usize = 30;
const GRID_COLS:  usize = 4;
const KDE_POINTS: usize = 200;

fn plot_err<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow!("plot rendering failed: {e}")
}

pub struct PlotWriter {
    dir: PathBuf,
}

impl PlotWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create plot directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Distributions, category counts and the correlation heatmap.
    pub fn render_eda(&self, table: &DataTable, roles: &ColumnRoles) -> Result<Vec<PathBuf>> {
        let mut written = vec![self.render_distributions(table, &roles.numerical)?];
        for column in &roles.categorical {
            written.push(self.render_counts(table, column)?);
        }
        written.push(self.render_correlation(table, &roles.numerical)?);
        tracing::info!("Wrote {} exploratory plots to '{}'", written.len(), self.dir.display());
        Ok(written)
    }

    /// Histogram with a KDE overlay per column, laid out four to a row.
    pub fn render_distributions(&self, table: &DataTable, columns: &[String]) -> Result<PathBuf> {
        let path = self.dir.join("distributions.svg");
        let rows = columns.len().div_ceil(GRID_COLS).max(1);

        let root = SVGBackend::new(&path, (1600, 360 * rows as u32)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_err)?;

        // zip stops at the last column; trailing cells stay blank
        for (cell, name) in root.split_evenly((rows, GRID_COLS)).iter().zip(columns) {
            let values = table.numeric(name)?;
            let hist   = Histogram::of(values);

            let y_max = hist.counts.iter().copied().max().unwrap_or(0).max(1) as f64 * 1.15;
            let mut chart = ChartBuilder::on(cell)
                .caption(name, ("sans-serif", 16))
                .margin(8)
                .x_label_area_size(28)
                .y_label_area_size(44)
                .build_cartesian_2d(hist.lo..hist.hi, 0.0..y_max)
                .map_err(plot_err)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_labels(5)
                .y_labels(5)
                .draw()
                .map_err(plot_err)?;

            chart
                .draw_series(hist.counts.iter().enumerate().map(|(i, &c)| {
                    let x0 = hist.lo + i as f64 * hist.width;
                    Rectangle::new([(x0, 0.0), (x0 + hist.width, c as f64)], BLUE.mix(0.45).filled())
                }))
                .map_err(plot_err)?;

            if let Some(curve) = kde_counts(values, hist.lo, hist.hi, hist.width) {
                chart.draw_series(LineSeries::new(curve, &RED)).map_err(plot_err)?;
            }
        }

        root.present().map_err(plot_err)?;
        tracing::debug!("Wrote '{}'", path.display());
        Ok(path.clone())
    }

    pub fn render_counts(&self, table: &DataTable, column: &str) -> Result<PathBuf> {
        let path = self.dir.join(format!("count_{column}.svg"));

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for value in table.categorical(column)? {
            *counts.entry(value.as_str()).or_default() += 1;
        }
        let labels: Vec<String> = counts.keys().map(|k| k.to_string()).collect();
        let heights: Vec<usize> = counts.values().copied().collect();
        let y_max = heights.iter().copied().max().unwrap_or(0) * 11 / 10 + 1;

        let root = SVGBackend::new(&path, (900, 500)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(format!("Count of {column}"), ("sans-serif", 20))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d((0..labels.len()).into_segmented(), 0..y_max)
            .map_err(plot_err)?;

        let label_of = |v: &SegmentValue<usize>| match v {
            SegmentValue::CenterOf(i) => labels.get(*i).cloned().unwrap_or_default(),
            _ => String::new(),
        };
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(labels.len())
            .x_label_formatter(&label_of)
            .y_desc("count")
            .draw()
            .map_err(plot_err)?;

        chart
            .draw_series(heights.iter().enumerate().map(|(i, &h)| {
                let mut bar = Rectangle::new(
                    [(SegmentValue::Exact(i), 0), (SegmentValue::Exact(i + 1), h)],
                    BLUE.mix(0.6).filled(),
                );
                bar.set_margin(0, 0, 6, 6);
                bar
            }))
            .map_err(plot_err)?;

        root.present().map_err(plot_err)?;
        tracing::debug!("Wrote '{}'", path.display());
        Ok(path.clone())
    }

    /// Annotated Pearson heatmap on a blue-white-red scale.
    pub fn render_correlation(&self, table: &DataTable, columns: &[String]) -> Result<PathBuf> {
        let path = self.dir.join("correlation.svg");
        let p = columns.len();

        let data: Vec<&[f64]> = columns
            .iter()
            .map(|c| table.numeric(c))
            .collect::<Result<_, _>>()?;

        let root = SVGBackend::new(&path, (1000, 900)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Correlation Matrix", ("sans-serif", 22))
            .margin(15)
            .x_label_area_size(120)
            .y_label_area_size(200)
            .build_cartesian_2d((0..p).into_segmented(), (0..p).into_segmented())
            .map_err(plot_err)?;

        // Row 0 is drawn at the top
        let x_label = |v: &SegmentValue<usize>| match v {
            SegmentValue::CenterOf(i) => columns.get(*i).cloned().unwrap_or_default(),
            _ => String::new(),
        };
        let y_label = |v: &SegmentValue<usize>| match v {
            SegmentValue::CenterOf(i) if *i < p => columns[p - 1 - i].clone(),
            _ => String::new(),
        };
        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(p)
            .y_labels(p)
            .x_label_formatter(&x_label)
            .y_label_formatter(&y_label)
            .x_label_style(
                ("sans-serif", 11)
                    .into_font()
                    .color(&BLACK)
                    .transform(FontTransform::Rotate90),
            )
            .draw()
            .map_err(plot_err)?;

        let cells: Vec<(usize, usize, f64)> = (0..p)
            .flat_map(|i| (0..p).map(move |j| (i, j)))
            .map(|(i, j)| (i, j, pearson(data[i], data[j])))
            .collect();

        chart
            .draw_series(cells.iter().map(|&(i, j, r)| {
                let row = p - 1 - i;
                Rectangle::new(
                    [
                        (SegmentValue::Exact(j), SegmentValue::Exact(row)),
                        (SegmentValue::Exact(j + 1), SegmentValue::Exact(row + 1)),
                    ],
                    coolwarm(r).filled(),
                )
            }))
            .map_err(plot_err)?;

        let annotation = ("sans-serif", 12)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        chart
            .draw_series(cells.iter().map(|&(i, j, r)| {
                let label = if r.is_nan() { "nan".to_string() } else { format!("{r:.2}") };
                Text::new(
                    label,
                    (SegmentValue::CenterOf(j), SegmentValue::CenterOf(p - 1 - i)),
                    annotation.clone(),
                )
            }))
            .map_err(plot_err)?;

        root.present().map_err(plot_err)?;
        tracing::debug!("Wrote '{}'", path.display());
        Ok(path.clone())
    }

    /// `stage` names the file: feature_importance_<stage>.svg
    pub fn render_importances(&self, importances: &[(String, f64)], stage: &str) -> Result<PathBuf> {
        let path = self.dir.join(format!("feature_importance_{stage}.svg"));
        let n = importances.len();
        let x_max = importances.iter().map(|(_, v)| *v).fold(0.0, f64::max).max(1e-3) * 1.1;

        let root = SVGBackend::new(&path, (1000, 120 + 28 * n.max(1) as u32)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(format!("Feature Importance ({stage})"), ("sans-serif", 20))
            .margin(15)
            .x_label_area_size(35)
            .y_label_area_size(260)
            .build_cartesian_2d(0.0..x_max, (0..n).into_segmented())
            .map_err(plot_err)?;

        // First feature at the top
        let y_label = |v: &SegmentValue<usize>| match v {
            SegmentValue::CenterOf(i) if *i < n => importances[n - 1 - i].0.clone(),
            _ => String::new(),
        };
        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(n)
            .y_label_formatter(&y_label)
            .x_desc("importance")
            .draw()
            .map_err(plot_err)?;

        chart
            .draw_series(importances.iter().enumerate().map(|(i, (_, v))| {
                let row = n - 1 - i;
                let mut bar = Rectangle::new(
                    [(0.0, SegmentValue::Exact(row)), (*v, SegmentValue::Exact(row + 1))],
                    GREEN.mix(0.7).filled(),
                );
                bar.set_margin(4, 4, 0, 0);
                bar
            }))
            .map_err(plot_err)?;

        root.present().map_err(plot_err)?;
        tracing::debug!("Wrote '{}'", path.display());
        Ok(path.clone())
    }
}

// ─── Numerics for the charts ──────────────────────────────────────────────────

struct Histogram {
    lo:     f64,
    hi:     f64,
    width:  f64,
    counts: Vec<usize>,
}

impl Histogram {
    fn of(values: &[f64]) -> Self {
        let mut lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let mut hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !lo.is_finite() || !hi.is_finite() {
            (lo, hi) = (0.0, 1.0);
        }
        if hi <= lo {
            (lo, hi) = (lo - 0.5, hi + 0.5);
        }
        let width = (hi - lo) / HIST_BINS as f64;

        let mut counts = vec![0; HIST_BINS];
        for v in values {
            let bin = (((v - lo) / width).floor() as usize).min(HIST_BINS - 1);
            counts[bin] += 1;
        }
        Self { lo, hi, width, counts }
    }
}

/// Gaussian KDE with Scott's bandwidth, scaled from density to
/// expected counts per histogram bin. None for constant data.
fn kde_counts(values: &[f64], lo: f64, hi: f64, bin_width: f64) -> Option<Vec<(f64, f64)>> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let std  = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt();
    let h    = std * (n as f64).powf(-0.2);
    if h <= 0.0 {
        return None;
    }

    let norm = 1.0 / (n as f64 * h * (2.0 * std::f64::consts::PI).sqrt());
    let step = (hi - lo) / (KDE_POINTS - 1) as f64;
    Some(
        (0..KDE_POINTS)
            .map(|k| {
                let x = lo + k as f64 * step;
                let density: f64 = values
                    .iter()
                    .map(|v| (-0.5 * ((x - v) / h).powi(2)).exp())
                    .sum::<f64>()
                    * norm;
                (x, density * n as f64 * bin_width)
            })
            .collect(),
    )
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len()) as f64;
    if n < 2.0 {
        return f64::NAN;
    }
    let ma = a.iter().sum::<f64>() / n;
    let mb = b.iter().sum::<f64>() / n;
    let (mut cov, mut va, mut vb) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        cov += (x - ma) * (y - mb);
        va  += (x - ma).powi(2);
        vb  += (y - mb).powi(2);
    }
    if va == 0.0 || vb == 0.0 {
        return f64::NAN;
    }
    cov / (va * vb).sqrt()
}

/// Diverging blue → light grey → red for r in [-1, 1].
fn coolwarm(r: f64) -> RGBColor {
    const COLD: (f64, f64, f64) = (59.0, 76.0, 192.0);
    const MID:  (f64, f64, f64) = (221.0, 221.0, 221.0);
    const WARM: (f64, f64, f64) = (180.0, 4.0, 38.0);

    if r.is_nan() {
        return RGBColor(200, 200, 200);
    }
    let r = r.clamp(-1.0, 1.0);
    let (from, to, t) = if r < 0.0 { (MID, COLD, -r) } else { (MID, WARM, r) };
    let lerp = |a: f64, b: f64| (a + (b - a) * t).round() as u8;
    RGBColor(lerp(from.0, to.0), lerp(from.1, to.1), lerp(from.2, to.2))
}
