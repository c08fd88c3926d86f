use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use calibration_core::{
    CALIBRATION_REPORT_FILE, CalibrationConfig, CalibrationError, CalibrationPipeline, Diagnostic,
    EVENT_REPORT_FILE, JsonChartRenderer, LayoutConfig, REPORT_WINDOW_YEARS, calibration_dir,
    render_all,
};
use serde_json::Value;

fn temp_run_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("calibration-pipeline-{name}-{nanos}"));
    fs::create_dir_all(calibration_dir(&dir)).expect("create fixture dir");
    dir
}

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).expect("write fixture file");
}

fn run_json(years: &[&[&str]]) -> String {
    let events: Vec<Value> = years
        .iter()
        .map(|names| {
            Value::Array(
                names
                    .iter()
                    .map(|n| serde_json::json!([n, null]))
                    .collect(),
            )
        })
        .collect();
    let summary: Vec<Value> = (0..years.len())
        .map(|i| {
            serde_json::json!({
                "temp": 1.0 + i as f64 * 0.1,
                "emissions": 40.0,
                "outlook": 10.0,
                "extinction_rate": 20.0,
                "habitability": 9.0,
                "land_use": 30.0
            })
        })
        .collect();
    serde_json::json!({ "events": events, "summary": summary }).to_string()
}

/// Three runs: Flooding in 2022 and 2023, in 2023 only, and never.
fn seed_flooding_fixture(root: &Path) -> PathBuf {
    let dir = calibration_dir(root);
    write(
        &dir,
        "0.csv",
        "Year,Emissions,Temperature,Fuel:Oil:Mix Share,Fuel:Coal:Mix Share,Feedstock:coal\n\
         2022,40.1,1.1,0.6,0.4,10\n\
         2023,40.5,1.2,0.5,0.5,9\n\
         2024,41.0,1.3,0.4,0.6,8\n",
    );
    write(
        &dir,
        "0.json",
        r#"{
            "start_year": 2022,
            "scenarios": ["BanFossilFuels", "Nuclear"],
            "seed": 42,
            "icon_events": [[["Flooding", "Asia"], ["Flooding", "Europe"]], [], [["Heatwave", null]]],
            "events": [[["Revolution", "Asia"]], [], [["Famine", null]]],
            "summary": []
        }"#,
    );
    write(&dir, "all_events.json", r#"["Flooding", "Famine", "Revolution"]"#);
    write(&dir, "1.json", &run_json(&[&["Flooding"], &["Flooding"]]));
    write(&dir, "2.json", &run_json(&[&[], &["Flooding"]]));
    write(&dir, "3.json", &run_json(&[&[], &[]]));
    dir
}

fn ensemble_only_config() -> CalibrationConfig {
    CalibrationConfig {
        layout: LayoutConfig {
            include_primary_in_ensemble: false,
            ..LayoutConfig::default()
        },
        ..CalibrationConfig::default()
    }
}

#[test]
fn flooding_ensemble_statistics() {
    let root = temp_run_dir("flooding");
    let dir = seed_flooding_fixture(&root);

    let bundle = CalibrationPipeline::new(ensemble_only_config())
        .run(&dir)
        .expect("pipeline runs");

    let stats = &bundle.stats;
    assert_eq!(stats.n_runs, 3);
    assert_eq!(stats.total_possible, 3);
    assert_eq!(stats.total_observed, 1);
    let flooding = stats.get("Flooding").expect("flooding observed");
    assert_eq!(flooding.total, 3);
    assert_eq!(flooding.min_year, 2022);
    assert_eq!(flooding.max_year, 2023);
    assert_eq!(flooding.per_year.get(&2022), Some(&1));
    assert_eq!(flooding.per_year.get(&2023), Some(&2));
    assert!((flooding.percent_of_runs - 66.666_666).abs() < 0.01);
    assert_eq!(format!("{:.1}", flooding.percent_of_runs), "66.7");
    assert_eq!(flooding.profile, vec![0.5, 1.0]);
    assert!(stats.get("Famine").is_none());

    fs::remove_dir_all(root).ok();
}

#[test]
fn merged_dataset_and_groups() {
    let root = temp_run_dir("groups");
    let dir = seed_flooding_fixture(&root);

    let bundle = CalibrationPipeline::new(ensemble_only_config())
        .run(&dir)
        .expect("pipeline runs");

    assert_eq!(bundle.dataset.len(), 3);
    let flooding_counts = bundle
        .dataset
        .numeric_points("Flooding")
        .expect("icon column merged");
    assert_eq!(flooding_counts, vec![(2022, 2.0), (2023, 0.0), (2024, 0.0)]);
    assert!(bundle.dataset.has_column("Heatwave"));

    let process = bundle
        .groups
        .group("Process outputs")
        .expect("process group synthesized");
    assert_eq!(process.titles, vec!["Process-Fuel-Mix Share"]);
    let feedstocks = bundle.groups.group("Feedstocks").expect("feedstock group");
    assert_eq!(feedstocks.titles, vec!["Feedstock-coal"]);

    let mix = bundle
        .charts
        .iter()
        .find(|c| c.title == "Process-Fuel-Mix Share")
        .expect("mix share chart");
    assert_eq!(mix.series.len(), 2);
    assert_eq!((mix.y.min, mix.y.max), (0.0, 1.0));
    for chart in bundle.all_charts() {
        assert_eq!(chart.x.start, 2022);
        assert_eq!(chart.x.end - chart.x.start, REPORT_WINDOW_YEARS);
    }

    let calibration = &bundle.report.calibration;
    assert_eq!(calibration.timeline[0].events, vec!["Revolution in Asia"]);
    assert_eq!(calibration.timeline[0].icon_events, vec!["2x Flooding"]);
    assert!(calibration.timeline[1].quiet);
    assert!(calibration.groups.iter().any(|g| g.name == "Process outputs"));

    fs::remove_dir_all(root).ok();
}

#[test]
fn malformed_runs_reduce_the_ensemble() {
    let root = temp_run_dir("malformed");
    let dir = seed_flooding_fixture(&root);
    write(&dir, "4.json", r#"{"events": "nope"}"#);
    write(&dir, "5.json", "{");

    let bundle = CalibrationPipeline::new(ensemble_only_config())
        .run(&dir)
        .expect("malformed runs are not fatal");

    assert_eq!(bundle.stats.n_runs, 3);
    assert_eq!(bundle.diagnostics.malformed_runs(), 2);
    assert_eq!(bundle.report.events.skipped_runs, 2);

    fs::remove_dir_all(root).ok();
}

#[test]
fn primary_run_joins_the_ensemble_by_default() {
    let root = temp_run_dir("primary");
    let dir = seed_flooding_fixture(&root);

    let bundle = CalibrationPipeline::new(CalibrationConfig::default())
        .run(&dir)
        .expect("pipeline runs");

    assert_eq!(bundle.stats.n_runs, 4);
    let labels: Vec<&str> = bundle
        .report
        .events
        .runs
        .iter()
        .map(|r| r.label.as_str())
        .collect();
    assert_eq!(labels, vec!["0", "1", "2", "3"]);

    fs::remove_dir_all(root).ok();
}

#[test]
fn uncatalogued_events_are_surfaced() {
    let root = temp_run_dir("uncatalogued");
    let dir = seed_flooding_fixture(&root);
    write(&dir, "4.json", &run_json(&[&["Meteor"]]));

    let bundle = CalibrationPipeline::new(ensemble_only_config())
        .run(&dir)
        .expect("pipeline runs");

    assert_eq!(bundle.stats.uncatalogued, vec!["Meteor"]);
    assert_eq!(bundle.report.events.uncatalogued, vec!["Meteor"]);
    assert!(bundle.diagnostics.iter().any(
        |d| matches!(d, Diagnostic::UncataloguedEvent { name } if name == "Meteor")
    ));

    fs::remove_dir_all(root).ok();
}

#[test]
fn missing_primary_inputs_abort() {
    let root = temp_run_dir("missing");
    let dir = calibration_dir(&root);
    let pipeline = CalibrationPipeline::new(CalibrationConfig::default());

    let err = pipeline.run(&dir).expect_err("no metadata");
    assert!(matches!(err, CalibrationError::NotFound { .. }));
    assert!(err.to_string().contains("0.json"));

    write(&dir, "0.json", r#"{"start_year": 2022, "scenarios": []}"#);
    let err = pipeline.run(&dir).expect_err("no dataset");
    assert!(err.to_string().contains("0.csv"));

    fs::remove_dir_all(root).ok();
}

#[test]
fn start_year_at_the_integer_limit_is_rejected() {
    let root = temp_run_dir("overflow");
    let dir = calibration_dir(&root);
    write(&dir, "0.csv", "Year,Value\n2147483600,1\n");
    write(&dir, "0.json", r#"{"start_year": 2147483600, "scenarios": []}"#);
    write(&dir, "all_events.json", "[]");

    let err = CalibrationPipeline::new(CalibrationConfig::default())
        .run(&dir)
        .expect_err("start year too close to the integer limit");
    assert!(matches!(err, CalibrationError::InvalidMetadata(_)));

    fs::remove_dir_all(root).ok();
}

#[test]
fn colliding_chart_titles_write_separate_files() {
    let root = temp_run_dir("collide");
    let dir = seed_flooding_fixture(&root);
    write(
        &dir,
        "4.json",
        r#"{"events": [[]], "summary": [{"temp": 1.0, "emissions": 40, "outlook": 10,
            "extinction_rate": 20, "habitability": 9, "land_use": 30,
            "sea (m)": 0.1, "sea [m]": 0.2}]}"#,
    );

    let bundle = CalibrationPipeline::new(ensemble_only_config())
        .with_chart_extension("json")
        .run(&dir)
        .expect("pipeline runs");
    let out = root.join("plots");
    let charts: Vec<_> = bundle.all_charts().cloned().collect();
    fs::create_dir_all(&out).expect("create output dir");
    let mut images = render_all(&JsonChartRenderer, &charts, &out).expect("charts written");

    let count = images.len();
    images.sort();
    images.dedup();
    assert_eq!(images.len(), count);
    assert!(out.join("runs__sea _m_.json").is_file());
    assert!(out.join("runs__sea _m__2.json").is_file());
    assert!(bundle.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::FileNameCollision { title, .. } if title == "runs__sea [m]"
    )));
    let refs = &bundle.report.events.comparison_charts;
    let sea: Vec<&str> = refs
        .iter()
        .filter(|r| r.title.starts_with("runs__sea"))
        .map(|r| r.file.as_str())
        .collect();
    assert_eq!(sea, vec!["runs__sea _m_.json", "runs__sea _m__2.json"]);

    fs::remove_dir_all(root).ok();
}

#[test]
fn documents_and_charts_are_written() {
    let root = temp_run_dir("write");
    let dir = seed_flooding_fixture(&root);
    let bundle = CalibrationPipeline::new(ensemble_only_config())
        .with_chart_extension("json")
        .run(&dir)
        .expect("pipeline runs");
    let out = root.join("plots");

    let documents = bundle.write_documents(&out).expect("documents written");
    let charts: Vec<_> = bundle.all_charts().cloned().collect();
    let images = render_all(&JsonChartRenderer, &charts, &out).expect("charts written");

    assert_eq!(
        documents,
        vec![out.join(CALIBRATION_REPORT_FILE), out.join(EVENT_REPORT_FILE)]
    );
    assert_eq!(images.len(), charts.len());
    let report: Value = serde_json::from_str(
        &fs::read_to_string(out.join(CALIBRATION_REPORT_FILE)).expect("read report"),
    )
    .expect("report is json");
    for group in report["groups"].as_array().expect("groups array") {
        for chart in group["charts"].as_array().expect("charts array") {
            let file = chart["file"].as_str().expect("file name");
            assert!(out.join(file).is_file(), "missing chart file {file}");
        }
    }
    let events: Value = serde_json::from_str(
        &fs::read_to_string(out.join(EVENT_REPORT_FILE)).expect("read event report"),
    )
    .expect("event report is json");
    assert_eq!(events["ranked"][0]["name"], "Flooding");
    assert_eq!(events["comparison_charts"][0]["title"], "runs__temp");
    assert_eq!(events["years"].as_array().map(Vec::len), Some(100));

    fs::remove_dir_all(root).ok();
}
