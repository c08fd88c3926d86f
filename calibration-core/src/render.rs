//! Seam between chart specifications and whatever draws them.
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::charts::ChartSpec;
use crate::error::CalibrationError;

/// Turns a [`ChartSpec`] into a file on disk.
/// Platform-specific implementations decide the image format.
pub trait ChartRenderer {
    type Error: std::error::Error + Send + Sync + 'static;

    /// File extension of the produced images, without the dot.
    fn extension(&self) -> &'static str;

    /// Draw `spec` into `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the chart cannot be drawn or written.
    fn render(&self, spec: &ChartSpec, path: &Path) -> Result<(), Self::Error>;

    /// File name for `spec` under this renderer.
    fn file_name(&self, spec: &ChartSpec) -> String {
        chart_file_name(&spec.file_stem, self.extension())
    }
}

#[must_use]
pub fn chart_file_name(stem: &str, extension: &str) -> String {
    format!("{stem}.{extension}")
}

/// Render every spec into `dir`, returning the written paths in input order.
///
/// # Errors
///
/// Stops at the first chart the renderer fails on.
pub fn render_all<R: ChartRenderer>(
    renderer: &R,
    specs: &[ChartSpec],
    dir: &Path,
) -> Result<Vec<PathBuf>, R::Error> {
    let mut written = Vec::with_capacity(specs.len());
    for spec in specs {
        let path = dir.join(renderer.file_name(spec));
        renderer.render(spec, &path)?;
        log::debug!("rendered {} -> {}", spec.title, path.display());
        written.push(path);
    }
    Ok(written)
}

/// Writes the chart specification itself as JSON, for external plotting tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonChartRenderer;

impl ChartRenderer for JsonChartRenderer {
    type Error = CalibrationError;

    fn extension(&self) -> &'static str {
        "json"
    }

    fn render(&self, spec: &ChartSpec, path: &Path) -> Result<(), Self::Error> {
        let file = fs::File::create(path).map_err(|source| CalibrationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), spec).map_err(|source| {
            CalibrationError::Json {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::ChartSpecBuilder;
    use crate::config::ChartKind;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("calibration-render-{name}-{nanos}"));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn json_renderer_writes_one_file_per_spec() {
        let palette = vec!["#112233".to_string()];
        let builder = ChartSpecBuilder::new(&palette, 2022);
        let specs = vec![
            builder.from_series(
                "Temperature (C)",
                ChartKind::Line,
                None,
                vec![("temp".to_string(), vec![(2022, 1.1), (2023, 1.2)])],
            ),
            builder.from_series("Events", ChartKind::Events, None, Vec::new()),
        ];
        let dir = temp_dir("json");

        let written = render_all(&JsonChartRenderer, &specs, &dir).unwrap();

        assert_eq!(
            written,
            vec![dir.join("Temperature _C_.json"), dir.join("Events.json")]
        );
        let body = fs::read_to_string(&written[0]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["x"]["end"], 2122);
        assert_eq!(value["series"][0]["style"]["line"], "solid");
        assert_eq!(value["kind"], "line");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn render_errors_surface() {
        let palette = vec!["#112233".to_string()];
        let spec = ChartSpecBuilder::new(&palette, 2022).from_series(
            "t",
            ChartKind::Line,
            None,
            Vec::new(),
        );
        let missing = std::env::temp_dir().join("calibration-render-no-such-dir/nested");
        let err = render_all(&JsonChartRenderer, &[spec], &missing).unwrap_err();
        assert!(matches!(err, CalibrationError::Io { .. }));
    }
}
