use calibration_core::{ChartKind, ChartRenderer, ChartSpec, LineStyle, SeriesSpec};
use plotters::prelude::*;
use std::io;
use std::path::Path;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
const MARKER_SIZE: i32 = 3;

/// Draws charts as SVG files through `plotters`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgChartRenderer;

impl ChartRenderer for SvgChartRenderer {
    type Error = io::Error;

    fn extension(&self) -> &'static str {
        "svg"
    }

    fn render(&self, spec: &ChartSpec, path: &Path) -> Result<(), Self::Error> {
        draw(spec, path).map_err(|err| {
            io::Error::other(format!("failed to draw '{}': {err}", spec.title))
        })
    }
}

fn draw(spec: &ChartSpec, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&spec.title, ("sans-serif", 18))
        .margin(12)
        .x_label_area_size(32)
        .y_label_area_size(56)
        .build_cartesian_2d(spec.x.start..spec.x.end, spec.y.min..spec.y.max)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Year")
        .draw()?;

    for series in &spec.series {
        let color = parse_hex(&series.style.color);
        let style = color.stroke_width(2);
        let anno = match spec.kind {
            ChartKind::Events => chart.draw_series(
                occurrences(series).map(|point| Circle::new(point, MARKER_SIZE, color.filled())),
            )?,
            ChartKind::Line => match dash_pattern(series.style.line) {
                None => chart.draw_series(LineSeries::new(series.points.iter().copied(), style))?,
                Some((size, spacing)) => chart.draw_series(DashedLineSeries::new(
                    series.points.iter().copied(),
                    size,
                    spacing,
                    style,
                ))?,
            },
        };
        anno.label(series.label.as_str()).legend(move |(x, y)| {
            PathElement::new(vec![(x, y), (x + 18, y)], color.stroke_width(2))
        });
    }

    if !spec.series.is_empty() {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    root.present()?;
    Ok(())
}

/// Event charts only mark years with at least one occurrence.
fn occurrences(series: &SeriesSpec) -> impl Iterator<Item = (i32, f64)> + '_ {
    series.points.iter().copied().filter(|&(_, v)| v > 0.0)
}

const fn dash_pattern(line: LineStyle) -> Option<(u32, u32)> {
    match line {
        LineStyle::Solid => None,
        LineStyle::Dashed => Some((8, 4)),
        LineStyle::DashDot => Some((12, 3)),
        LineStyle::Dotted => Some((2, 3)),
    }
}

fn parse_hex(color: &str) -> RGBColor {
    let hex = color.trim_start_matches('#');
    let channel = |idx: usize| {
        hex.get(idx..idx + 2)
            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
    };
    match (hex.len(), channel(0), channel(2), channel(4)) {
        (6, Some(r), Some(g), Some(b)) => RGBColor(r, g, b),
        _ => {
            log::debug!("unrecognised color {color}, using black");
            BLACK
        }
    }
}
