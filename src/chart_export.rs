//! Figure model and export to PNG/SVG (plotters) and EPS (PostScript written directly).

use color_eyre::Result;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::ChartFormat;

/// Default y-axis label of per-variable panels.
pub const DELIVERY_RATE_LABEL: &str = "Delivery Rate";

/// Matplotlib "tab10" colors, in cycle order.
const PALETTE: [(u8, u8, u8); 7] = [
    (31, 119, 180),
    (255, 127, 14),
    (44, 160, 44),
    (214, 39, 40),
    (148, 103, 189),
    (140, 86, 75),
    (227, 119, 194),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisScale {
    Linear,
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisLabels {
    pub x: String,
    pub y: String,
}

impl AxisLabels {
    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
        }
    }

    /// `x` against the delivery-rate y label.
    pub fn delivery(x: impl Into<String>) -> Self {
        Self::new(x, DELIVERY_RATE_LABEL)
    }
}

/// Size and band styling shared by every figure of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct FigureStyle {
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: u32,
    pub band_alpha: f64,
}

impl Default for FigureStyle {
    fn default() -> Self {
        Self {
            width_in: 3.2,
            height_in: 2.4,
            dpi: 100,
            band_alpha: 0.125,
        }
    }
}

impl FigureStyle {
    /// Bitmap size in pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        let px = |inches: f64| (inches * self.dpi as f64).round().max(1.0) as u32;
        (px(self.width_in), px(self.height_in))
    }
}

/// One mean line with its ±std band. `x`, `mean` and `std` are index aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartExportSeries {
    /// Legend text; `None` keeps the series out of the legend.
    pub label: Option<String>,
    pub x: Vec<f64>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl ChartExportSeries {
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Mean line vertices, raised to `floor` where it lies below.
    pub fn line_points(&self, floor: Option<f64>) -> Vec<(f64, f64)> {
        self.x
            .iter()
            .copied()
            .zip(self.mean.iter().map(|&y| clamp_to_floor(y, floor)))
            .collect()
    }

    pub fn upper(&self) -> impl Iterator<Item = f64> + '_ {
        self.mean.iter().zip(&self.std).map(|(m, s)| m + s)
    }

    pub fn lower(&self) -> impl Iterator<Item = f64> + '_ {
        self.mean.iter().zip(&self.std).map(|(m, s)| m - s)
    }

    /// Closed outline of the band: upper edge left to right, then lower edge back.
    /// Values below `floor` are raised to it.
    pub fn band_polygon(&self, floor: Option<f64>) -> Vec<(f64, f64)> {
        let mut points: Vec<(f64, f64)> = self
            .x
            .iter()
            .copied()
            .zip(self.upper().map(|y| clamp_to_floor(y, floor)))
            .collect();
        let lower: Vec<(f64, f64)> = self
            .x
            .iter()
            .copied()
            .zip(self.lower().map(|y| clamp_to_floor(y, floor)))
            .collect();
        points.extend(lower.into_iter().rev());
        points
    }
}

fn clamp_to_floor(y: f64, floor: Option<f64>) -> f64 {
    floor.map_or(y, |f| y.max(f))
}

/// Axis ranges of a figure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartExportBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

/// One axis worth of series, written to one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    /// File stem of the written image.
    pub name: String,
    pub labels: AxisLabels,
    pub scale: AxisScale,
    pub legend: bool,
    pub series: Vec<ChartExportSeries>,
}

impl Figure {
    pub fn new(name: impl Into<String>, labels: AxisLabels, scale: AxisScale) -> Self {
        Self {
            name: name.into(),
            labels,
            scale,
            legend: false,
            series: Vec::new(),
        }
    }

    pub fn has_data(&self) -> bool {
        self.series.iter().any(|s| !s.is_empty())
    }

    /// Data limits padded by 5% (linear) or a twentieth of a decade (log).
    /// Empty figures get a unit x range and a `0..1` / `1..10` y range.
    pub fn bounds(&self) -> ChartExportBounds {
        let xs = self.series.iter().flat_map(|s| s.x.iter().copied());
        let (x_min, x_max) = padded_linear(min_max(xs), (0.0, 1.0));

        let (y_min, y_max) = match self.scale {
            AxisScale::Linear => {
                let ys = self.series.iter().flat_map(|s| s.lower().chain(s.upper()));
                padded_linear(min_max(ys), (0.0, 1.0))
            }
            AxisScale::Log => {
                let ys = self
                    .series
                    .iter()
                    .flat_map(|s| s.lower().chain(s.upper()).chain(s.mean.iter().copied()))
                    .filter(|y| *y > 0.0);
                match min_max(ys) {
                    None => (1.0, 10.0),
                    Some((lo, hi)) if lo == hi => (lo / 2.0, hi * 2.0),
                    Some((lo, hi)) => {
                        let pad = 10f64.powf((hi / lo).log10() * 0.05);
                        (lo / pad, hi * pad)
                    }
                }
            }
        };

        ChartExportBounds {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    /// Lowest value drawable on this figure's y axis, if the scale has one.
    fn floor(&self, bounds: &ChartExportBounds) -> Option<f64> {
        match self.scale {
            AxisScale::Linear => None,
            AxisScale::Log => Some(bounds.y_min),
        }
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn padded_linear(limits: Option<(f64, f64)>, empty: (f64, f64)) -> (f64, f64) {
    match limits {
        None => empty,
        Some((lo, hi)) if lo == hi => {
            let pad = if lo == 0.0 { 0.5 } else { lo.abs() * 0.05 };
            (lo - pad, hi + pad)
        }
        Some((lo, hi)) => {
            let pad = (hi - lo) * 0.05;
            (lo - pad, hi + pad)
        }
    }
}

/// Write `figure` to `path` in `format`.
pub fn write_chart(
    path: &Path,
    figure: &Figure,
    style: &FigureStyle,
    format: ChartFormat,
) -> Result<()> {
    match format {
        ChartFormat::Png => write_chart_png(path, figure, style),
        ChartFormat::Svg => write_chart_svg(path, figure, style),
        ChartFormat::Eps => write_chart_eps(path, figure, style),
    }
}

/// Escape a string for PostScript ( and ) and \.
fn ps_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// Latin letter of the Symbol font that draws a lowercase Greek letter.
fn symbol_font_char(c: char) -> Option<char> {
    const GREEK: &str = "αβγδεζηθικλμνξοπρστυφχψω";
    const LATIN: &str = "abgdezhqiklmnxoprstufcyw";
    GREEK
        .chars()
        .position(|g| g == c)
        .and_then(|i| LATIN.chars().nth(i))
}

/// Emit `show` operations for `s`, switching to the Symbol font for Greek letters.
/// Other non-ASCII characters are drawn as `?`.
fn ps_show(f: &mut impl Write, s: &str, size: u32) -> io::Result<()> {
    let mut run = String::new();
    let mut run_is_symbol = false;
    let flush = |f: &mut dyn Write, run: &mut String, symbol: bool| -> io::Result<()> {
        if run.is_empty() {
            return Ok(());
        }
        let font = if symbol { "Symbol" } else { "Helvetica" };
        writeln!(
            f,
            "/{} findfont {} scalefont setfont ({}) show",
            font,
            size,
            ps_escape(run)
        )?;
        run.clear();
        Ok(())
    };
    for c in s.chars() {
        let (ch, symbol) = match symbol_font_char(c) {
            Some(latin) => (latin, true),
            None if c.is_ascii() => (c, false),
            None => ('?', false),
        };
        if symbol != run_is_symbol {
            flush(f, &mut run, run_is_symbol)?;
            run_is_symbol = symbol;
        }
        run.push(ch);
    }
    flush(f, &mut run, run_is_symbol)
}

/// Generate "nice" tick values in [min, max] with roughly max_ticks steps.
fn nice_ticks(min: f64, max: f64, max_ticks: usize) -> Vec<f64> {
    let range = if max > min { max - min } else { 1.0 };
    if range <= 0.0 || max_ticks == 0 {
        return vec![min];
    }
    let raw_step = range / (max_ticks as f64).max(1.0);
    let mag = 10.0_f64.powf(raw_step.log10().floor());
    let norm = if mag > 0.0 { raw_step / mag } else { raw_step };
    let step = if norm <= 1.0 {
        1.0 * mag
    } else if norm <= 2.0 {
        2.0 * mag
    } else if norm <= 5.0 {
        5.0 * mag
    } else {
        10.0 * mag
    };
    let step = step.max(f64::EPSILON);
    let start = (min / step).floor() * step;
    let mut ticks = Vec::new();
    let mut v = start;
    while v <= max + step * 0.001 {
        if v >= min - step * 0.001 {
            ticks.push(v);
        }
        v += step;
        if ticks.len() > max_ticks + 2 {
            break;
        }
    }
    if ticks.is_empty() {
        ticks.push(min);
    }
    ticks
}

/// Powers of ten inside [min, max]; falls back to linear ticks when fewer than two fit.
fn log_ticks(min: f64, max: f64) -> Vec<f64> {
    let lo = min.log10().floor() as i32;
    let hi = max.log10().ceil() as i32;
    let ticks: Vec<f64> = (lo..=hi)
        .map(|e| 10f64.powi(e))
        .filter(|v| *v >= min * (1.0 - 1e-9) && *v <= max * (1.0 + 1e-9))
        .collect();
    if ticks.len() >= 2 {
        return ticks;
    }
    nice_ticks(min, max, 4)
        .into_iter()
        .filter(|v| *v > 0.0)
        .collect()
}

/// Format a tick value for display (compact: integer when whole, else 1–2 decimals).
fn format_tick(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    let abs = v.abs();
    if abs >= 1000.0 || (abs <= 0.01 && abs > 0.0) {
        format!("{:e}", v)
    } else if (v - v.round()).abs() < 1e-10 {
        format!("{:.0}", v)
    } else if abs >= 1.0 {
        format!("{:.1}", v)
    } else {
        format!("{:.2}", v)
    }
}

/// Position of a y value as a fraction of the plot height.
fn y_fraction(scale: AxisScale, bounds: &ChartExportBounds, y: f64) -> f64 {
    match scale {
        AxisScale::Linear => {
            let range = bounds.y_max - bounds.y_min;
            if range > 0.0 {
                (y - bounds.y_min) / range
            } else {
                0.5
            }
        }
        AxisScale::Log => {
            let lo = bounds.y_min.log10();
            let range = bounds.y_max.log10() - lo;
            if range > 0.0 {
                (y.max(bounds.y_min).log10() - lo) / range
            } else {
                0.5
            }
        }
    }
}

/// Band fill color: the series color blended over white, since PostScript has no alpha.
fn blend_over_white(c: f64, alpha: f64) -> f64 {
    1.0 - alpha * (1.0 - c)
}

/// Write a figure to EPS (Encapsulated PostScript). Sized in points from the figure style.
pub fn write_chart_eps(path: &Path, figure: &Figure, style: &FigureStyle) -> Result<()> {
    const MARGIN_LEFT: f64 = 46.0;
    const MARGIN_BOTTOM: f64 = 34.0;
    const MARGIN_RIGHT: f64 = 10.0;
    const MARGIN_TOP: f64 = 10.0;
    const TICK_LEN: f64 = 3.0;
    const CHAR_W: f64 = 4.5;

    let w = style.width_in * 72.0;
    let h = style.height_in * 72.0;
    let plot_w = (w - MARGIN_LEFT - MARGIN_RIGHT).max(1.0);
    let plot_h = (h - MARGIN_BOTTOM - MARGIN_TOP).max(1.0);

    let bounds = figure.bounds();
    let x_range = if bounds.x_max > bounds.x_min {
        bounds.x_max - bounds.x_min
    } else {
        1.0
    };
    let to_x = |x: f64| MARGIN_LEFT + (x - bounds.x_min) / x_range * plot_w;
    let to_y = |y: f64| MARGIN_BOTTOM + y_fraction(figure.scale, &bounds, y) * plot_h;
    let in_x = |px: f64| (MARGIN_LEFT - 0.01..=MARGIN_LEFT + plot_w + 0.01).contains(&px);
    let in_y = |py: f64| (MARGIN_BOTTOM - 0.01..=MARGIN_BOTTOM + plot_h + 0.01).contains(&py);

    let x_ticks = nice_ticks(bounds.x_min, bounds.x_max, 5);
    let y_ticks = match figure.scale {
        AxisScale::Linear => nice_ticks(bounds.y_min, bounds.y_max, 5),
        AxisScale::Log => log_ticks(bounds.y_min, bounds.y_max),
    };

    let mut f = io::BufWriter::new(File::create(path)?);

    writeln!(f, "%!PS-Adobe-3.0 EPSF-3.0")?;
    writeln!(
        f,
        "%%BoundingBox: 0 0 {} {}",
        w.ceil() as i32,
        h.ceil() as i32
    )?;
    writeln!(f, "%%Title: {}", figure.name)?;
    writeln!(f, "%%Creator: meshplot")?;
    writeln!(f, "%%EndComments")?;
    writeln!(f, "gsave")?;

    // Grid (light gray, behind plot)
    writeln!(f, "0.9 setgray")?;
    writeln!(f, "0.5 setlinewidth")?;
    for &v in &x_ticks {
        let px = to_x(v);
        if in_x(px) {
            writeln!(f, "{} {} moveto 0 {} rlineto stroke", px, MARGIN_BOTTOM, plot_h)?;
        }
    }
    for &v in &y_ticks {
        let py = to_y(v);
        if in_y(py) {
            writeln!(f, "{} {} moveto {} 0 rlineto stroke", MARGIN_LEFT, py, plot_w)?;
        }
    }

    // Series, clipped to the plot area
    let floor = figure.floor(&bounds);
    writeln!(f, "gsave")?;
    writeln!(
        f,
        "newpath {} {} {} {} rectclip",
        MARGIN_LEFT, MARGIN_BOTTOM, plot_w, plot_h
    )?;
    for (idx, s) in figure.series.iter().enumerate() {
        if s.is_empty() {
            continue;
        }
        let (r, g, b) = PALETTE[idx % PALETTE.len()];
        let (r, g, b) = (r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0);

        writeln!(
            f,
            "{} {} {} setrgbcolor",
            blend_over_white(r, style.band_alpha),
            blend_over_white(g, style.band_alpha),
            blend_over_white(b, style.band_alpha)
        )?;
        let band = s.band_polygon(floor);
        writeln!(f, "newpath {} {} moveto", to_x(band[0].0), to_y(band[0].1))?;
        for &(px, py) in &band[1..] {
            writeln!(f, "{} {} lineto", to_x(px), to_y(py))?;
        }
        writeln!(f, "closepath fill")?;

        writeln!(f, "{} {} {} setrgbcolor", r, g, b)?;
        writeln!(f, "1.2 setlinewidth")?;
        let line = s.line_points(floor);
        writeln!(f, "newpath {} {} moveto", to_x(line[0].0), to_y(line[0].1))?;
        for &(px, py) in &line[1..] {
            writeln!(f, "{} {} lineto", to_x(px), to_y(py))?;
        }
        writeln!(f, "stroke")?;
    }
    writeln!(f, "grestore")?;

    // Axis box
    writeln!(f, "0 setgray")?;
    writeln!(f, "0.8 setlinewidth")?;
    writeln!(f, "{} {} moveto", MARGIN_LEFT, MARGIN_BOTTOM)?;
    writeln!(f, "{} 0 rlineto", plot_w)?;
    writeln!(f, "0 {} rlineto", plot_h)?;
    writeln!(f, "{} 0 rlineto", -plot_w)?;
    writeln!(f, "closepath stroke")?;

    // Tick marks and labels
    for &v in &x_ticks {
        let px = to_x(v);
        if in_x(px) {
            writeln!(
                f,
                "{} {} moveto 0 {} rlineto stroke",
                px, MARGIN_BOTTOM, -TICK_LEN
            )?;
            let s = format_tick(v);
            let label_w = s.len() as f64 * CHAR_W;
            writeln!(f, "{} {} moveto", px - label_w / 2.0, MARGIN_BOTTOM - 12.0)?;
            ps_show(&mut f, &s, 8)?;
        }
    }
    for &v in &y_ticks {
        let py = to_y(v);
        if in_y(py) {
            writeln!(
                f,
                "{} {} moveto {} 0 rlineto stroke",
                MARGIN_LEFT, py, -TICK_LEN
            )?;
            let s = format_tick(v);
            let label_w = s.len() as f64 * CHAR_W;
            writeln!(f, "{} {} moveto", (MARGIN_LEFT - label_w - 5.0).max(2.0), py - 3.0)?;
            ps_show(&mut f, &s, 8)?;
        }
    }

    // Axis titles (x below tick labels, y rotated left of plot)
    let x_label = &figure.labels.x;
    let y_label = &figure.labels.y;
    if !x_label.is_empty() {
        let x_center = MARGIN_LEFT + plot_w / 2.0;
        let approx_w = x_label.chars().count() as f64 * CHAR_W;
        writeln!(f, "{} {} moveto", x_center - approx_w / 2.0, MARGIN_BOTTOM - 26.0)?;
        ps_show(&mut f, x_label, 9)?;
    }
    if !y_label.is_empty() {
        writeln!(f, "gsave")?;
        writeln!(f, "10 {} translate 90 rotate", MARGIN_BOTTOM + plot_h / 2.0)?;
        let approx_w = y_label.chars().count() as f64 * CHAR_W;
        writeln!(f, "{} 0 moveto", -approx_w / 2.0)?;
        ps_show(&mut f, y_label, 9)?;
        writeln!(f, "grestore")?;
    }

    // Legend (top right, one row per labeled series)
    if figure.legend {
        let entries: Vec<(usize, &str)> = figure
            .series
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.label.as_deref().map(|l| (i, l)))
            .collect();
        if !entries.is_empty() {
            const ROW_H: f64 = 10.0;
            let text_w = entries
                .iter()
                .map(|(_, l)| l.chars().count())
                .max()
                .unwrap_or(0) as f64
                * CHAR_W;
            let box_w = text_w + 26.0;
            let box_h = entries.len() as f64 * ROW_H + 4.0;
            let left = MARGIN_LEFT + plot_w - box_w - 4.0;
            let top = MARGIN_BOTTOM + plot_h - 4.0;
            writeln!(f, "1 setgray {} {} {} {} rectfill", left, top - box_h, box_w, box_h)?;
            writeln!(f, "0.5 setlinewidth 0.7 setgray")?;
            writeln!(f, "{} {} {} {} rectstroke", left, top - box_h, box_w, box_h)?;
            for (row, (idx, label)) in entries.iter().enumerate() {
                let (r, g, b) = PALETTE[idx % PALETTE.len()];
                let y = top - 2.0 - ROW_H * (row as f64 + 0.5);
                writeln!(
                    f,
                    "{} {} {} setrgbcolor 1.2 setlinewidth",
                    r as f64 / 255.0,
                    g as f64 / 255.0,
                    b as f64 / 255.0
                )?;
                writeln!(f, "{} {} moveto 14 0 rlineto stroke", left + 4.0, y)?;
                writeln!(f, "0 setgray {} {} moveto", left + 22.0, y - 3.0)?;
                ps_show(&mut f, label, 8)?;
            }
        }
    }

    writeln!(f, "grestore")?;
    writeln!(f, "showpage")?;
    writeln!(f, "%%EOF")?;
    let file = f.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

/// Write a figure to PNG using the plotters bitmap backend.
pub fn write_chart_png(path: &Path, figure: &Figure, style: &FigureStyle) -> Result<()> {
    let root = BitMapBackend::new(path, style.pixel_size()).into_drawing_area();
    draw_figure(root, figure, style)
}

/// Write a figure to SVG using the plotters SVG backend.
pub fn write_chart_svg(path: &Path, figure: &Figure, style: &FigureStyle) -> Result<()> {
    let root = SVGBackend::new(path, style.pixel_size()).into_drawing_area();
    draw_figure(root, figure, style)
}

fn draw_figure<DB>(root: DrawingArea<DB, Shift>, figure: &Figure, style: &FigureStyle) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let bounds = figure.bounds();
    let mut builder = ChartBuilder::on(&root);
    builder
        .margin(8)
        .x_label_area_size(32)
        .y_label_area_size(44);

    match figure.scale {
        AxisScale::Linear => {
            let mut chart = builder.build_cartesian_2d(
                bounds.x_min..bounds.x_max,
                bounds.y_min..bounds.y_max,
            )?;
            chart
                .configure_mesh()
                .x_desc(figure.labels.x.as_str())
                .y_desc(figure.labels.y.as_str())
                .draw()?;
            draw_band_series(&mut chart, figure, style, figure.floor(&bounds))?;
            if figure.legend && figure.series.iter().any(|s| s.label.is_some()) {
                chart
                    .configure_series_labels()
                    .background_style(WHITE.mix(0.8))
                    .border_style(BLACK)
                    .draw()?;
            }
        }
        AxisScale::Log => {
            let mut chart = builder.build_cartesian_2d(
                bounds.x_min..bounds.x_max,
                (bounds.y_min..bounds.y_max).log_scale(),
            )?;
            chart
                .configure_mesh()
                .x_desc(figure.labels.x.as_str())
                .y_desc(figure.labels.y.as_str())
                .draw()?;
            draw_band_series(&mut chart, figure, style, figure.floor(&bounds))?;
            if figure.legend && figure.series.iter().any(|s| s.label.is_some()) {
                chart
                    .configure_series_labels()
                    .background_style(WHITE.mix(0.8))
                    .border_style(BLACK)
                    .draw()?;
            }
        }
    }

    root.present()?;
    Ok(())
}

/// Band first, then the mean line on top, for every non-empty series.
fn draw_band_series<DB, Y>(
    chart: &mut ChartContext<'_, DB, Cartesian2d<RangedCoordf64, Y>>,
    figure: &Figure,
    style: &FigureStyle,
    floor: Option<f64>,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
    Y: Ranged<ValueType = f64>,
{
    for (idx, s) in figure.series.iter().enumerate() {
        if s.is_empty() {
            continue;
        }
        let (r, g, b) = PALETTE[idx % PALETTE.len()];
        let color = RGBColor(r, g, b);

        chart.draw_series(std::iter::once(Polygon::new(
            s.band_polygon(floor),
            color.mix(style.band_alpha).filled(),
        )))?;
        let anno = chart.draw_series(LineSeries::new(
            s.line_points(floor),
            color.stroke_width(2),
        ))?;
        if let Some(label) = &s.label {
            anno.label(label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color));
        }
    }
    Ok(())
}
