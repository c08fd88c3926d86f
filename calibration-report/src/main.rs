mod render;
mod summary;

use anyhow::{Context, Result};
use calibration_core::{
    CalibrationConfig, CalibrationPipeline, ChartRenderer, ReportBundle, calibration_dir,
    render_all,
};
use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use std::fs::{self, File};
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::time::Instant;

use render::SvgChartRenderer;
use summary::{RunSummary, generate_console_report, generate_json_report, generate_markdown_report};

const PLOTS_DIR: &str = "plots";

#[derive(Debug, Parser)]
#[command(name = "calibration-report", version)]
#[command(about = "Calibration charts and event statistics for a world-simulation run ensemble")]
struct Args {
    /// Run directory, or its calibration/ subdirectory
    dir: PathBuf,

    /// JSON file overriding the default chart configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for charts and report documents [default: <run dir>/plots]
    #[arg(long)]
    out: Option<PathBuf>,

    /// Summary format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Optional path to write the summary instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the report documents but skip drawing charts
    #[arg(long)]
    no_render: bool,

    /// Print every warning in the console summary
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.report == "console" || args.output.is_some() {
        announce_banner();
    }

    let start_time = Instant::now();
    let config = load_config(args.config.as_deref())?;
    let calibration_dir = calibration_dir(&args.dir);
    let output_dir = resolve_output_dir(args.out.as_deref(), &calibration_dir);
    let renderer = SvgChartRenderer;

    let bundle = CalibrationPipeline::new(config)
        .with_chart_extension(renderer.extension())
        .run(&calibration_dir)
        .with_context(|| format!("failed to build report for {}", calibration_dir.display()))?;

    let documents = bundle
        .write_documents(&output_dir)
        .with_context(|| format!("failed to write reports to {}", output_dir.display()))?;
    for path in &documents {
        log::info!("wrote {}", path.display());
    }

    let charts_written = if args.no_render {
        0
    } else {
        render_charts(&renderer, &bundle, &output_dir)?
    };

    let summary = RunSummary {
        generated_at: Utc::now(),
        calibration_dir: &calibration_dir,
        output_dir: &output_dir,
        charts_written,
        bundle: &bundle,
    };
    write_reports(&args, &summary, start_time)
}

fn announce_banner() {
    println!("{}", "🌍 Calibration Report".bright_cyan().bold());
    println!("{}", "=====================".cyan());
}

fn load_config(path: Option<&Path>) -> Result<CalibrationConfig> {
    let Some(path) = path else {
        return Ok(CalibrationConfig::default());
    };
    CalibrationConfig::load(path)
        .with_context(|| format!("failed to load configuration {}", path.display()))
}

fn resolve_output_dir(out: Option<&Path>, calibration_dir: &Path) -> PathBuf {
    out.map_or_else(
        || {
            calibration_dir
                .parent()
                .unwrap_or(calibration_dir)
                .join(PLOTS_DIR)
        },
        Path::to_path_buf,
    )
}

fn render_charts<R: ChartRenderer>(
    renderer: &R,
    bundle: &ReportBundle,
    output_dir: &Path,
) -> Result<usize> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let charts =
        render_all(renderer, &bundle.charts, output_dir).context("failed to draw charts")?;
    let comparisons = render_all(renderer, &bundle.comparison_charts, output_dir)
        .context("failed to draw run comparison charts")?;
    Ok(charts.len() + comparisons.len())
}

fn write_reports(args: &Args, summary: &RunSummary<'_>, start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => generate_json_report(&mut output_target, summary)?,
        "markdown" => generate_markdown_report(&mut output_target, summary)?,
        _ => generate_console_report(
            &mut output_target,
            summary,
            args.verbose,
            start_time.elapsed(),
        )?,
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
