use meshplot::report::{build_report, DELIVERY_PANELS};
use meshplot::{
    run_reports, AxisScale, ChartFormat, FigureStyle, ReportError, ReportKind, ReportSession,
    RunOptions, ShapePolicy, SourceResolver,
};
use std::path::Path;
use tempfile::TempDir;

mod common;

use common::{delivery_records, memory_records, write_source};

fn options(input: &Path, output: &Path, policy: ShapePolicy) -> RunOptions {
    RunOptions {
        resolver: SourceResolver::new(input),
        style: FigureStyle::default(),
        output_dir: output.to_path_buf(),
        format: ChartFormat::Eps,
        shape_policy: policy,
        debug: false,
    }
}

fn write_delivery_sources(dir: &Path) {
    write_source(dir, "pt", &delivery_records("nHop", &[5.0, 6.0, 7.0]));
    write_source(dir, "nd", &delivery_records("nRep", &[5.0, 10.0]));
    write_source(dir, "l", &delivery_records("pSend", &[0.01, 0.03, 0.05]));
    write_source(dir, "r", &delivery_records("dMove", &[1.0, 2.0, 3.0, 4.0]));
}

#[test]
fn test_all_reports_write_every_figure() {
    let input = TempDir::new().expect("temp dir");
    let output = TempDir::new().expect("temp dir");
    write_source(input.path(), "M1", &memory_records(10, 100.0));
    write_source(input.path(), "M2", &memory_records(10, 3.0));
    write_delivery_sources(input.path());

    let opts = options(input.path(), output.path(), ShapePolicy::Strict);
    let written = run_reports(&ReportKind::ALL, &opts).expect("reports");

    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["memory.eps", "pt.eps", "nd.eps", "l.eps", "r.eps"]);

    let memory = std::fs::read_to_string(output.path().join("memory.eps")).unwrap();
    assert!(memory.contains("(Time Step) show"));
    assert!(memory.contains("(Memory Usage per User) show"));
    assert!(memory.contains("(ASMesh 1) show"));
    assert!(memory.contains("(ASMesh 2) show"));

    let lambda = std::fs::read_to_string(output.path().join("l.eps")).unwrap();
    assert!(lambda.contains("/Symbol findfont 9 scalefont setfont (l) show"));
    assert!(lambda.contains("(Delivery Rate) show"));

    let pt = std::fs::read_to_string(output.path().join("pt.eps")).unwrap();
    assert!(pt.contains("(pt) show"));
}

#[test]
fn test_session_figures_follow_plans() {
    let input = TempDir::new().expect("temp dir");
    write_source(input.path(), "M1", &memory_records(3, 1.0));
    write_source(input.path(), "M2", &memory_records(3, 2.0));
    write_delivery_sources(input.path());
    let opts = options(input.path(), input.path(), ShapePolicy::Strict);

    let mut session = ReportSession::new(FigureStyle::default());
    build_report(ReportKind::Memory, &mut session, &opts).unwrap();
    build_report(ReportKind::Delivery, &mut session, &opts).unwrap();

    let figures = session.figures();
    assert_eq!(figures.len(), 1 + DELIVERY_PANELS.len());
    assert_eq!(figures[0].scale, AxisScale::Log);
    assert_eq!(figures[0].series.len(), 2);
    assert_eq!(figures[0].series[0].x, vec![0.0, 1.0, 2.0]);
    for (figure, plan) in figures[1..].iter().zip(DELIVERY_PANELS.iter()) {
        assert_eq!(figure.name, plan.source);
        assert_eq!(figure.scale, AxisScale::Linear);
        assert_eq!(figure.labels.x, plan.x_label());
        let series = &figure.series[0];
        assert!(series.mean.iter().all(|m| (m - 0.6).abs() < 1e-9));
        assert!(series.std.iter().all(|s| (s - 0.1).abs() < 1e-9));
    }
}

#[test]
fn test_missing_source_aborts_without_writing() {
    let input = TempDir::new().expect("temp dir");
    let output = TempDir::new().expect("temp dir");
    let out_dir = output.path().join("figures");
    write_source(input.path(), "M1", &memory_records(4, 1.0));
    // M2 is missing

    let opts = options(input.path(), &out_dir, ShapePolicy::Strict);
    let err = run_reports(&[ReportKind::Memory], &opts).unwrap_err();

    let report_err = err.downcast_ref::<ReportError>().expect("report error");
    assert!(report_err.is_storage());
    assert!(!out_dir.exists(), "no partial chart is written");
}

#[test]
fn test_ragged_source_fails_strict_and_passes_per_group() {
    let input = TempDir::new().expect("temp dir");
    let output = TempDir::new().expect("temp dir");
    write_delivery_sources(input.path());
    let mut ragged = delivery_records("nHop", &[5.0, 6.0]);
    ragged.push(serde_json::json!({ "nHop": 7, "r": 0.9 }));
    write_source(input.path(), "pt", &ragged);

    let strict = options(input.path(), output.path(), ShapePolicy::Strict);
    let err = run_reports(&[ReportKind::Delivery], &strict).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ReportError>(),
        Some(ReportError::ShapeMismatch { .. })
    ));

    let lenient = options(input.path(), output.path(), ShapePolicy::PerGroup);
    let written = run_reports(&[ReportKind::Delivery], &lenient).expect("reports");
    assert_eq!(written.len(), DELIVERY_PANELS.len());
}

#[test]
fn test_empty_series_renders_without_error() {
    let input = TempDir::new().expect("temp dir");
    let output = TempDir::new().expect("temp dir");
    write_delivery_sources(input.path());
    // No record carries nHop
    write_source(input.path(), "pt", &[serde_json::json!({ "r": 5 })]);

    let opts = options(input.path(), output.path(), ShapePolicy::Strict);
    let written = run_reports(&[ReportKind::Delivery], &opts).expect("reports");
    let pt = std::fs::read_to_string(&written[0]).unwrap();
    assert!(!pt.contains("closepath fill"), "no band drawn");
    assert!(pt.contains("closepath stroke"), "axes drawn");
}

#[test]
fn test_missing_value_field_is_reported() {
    let input = TempDir::new().expect("temp dir");
    let output = TempDir::new().expect("temp dir");
    write_source(
        input.path(),
        "M1",
        &[
            serde_json::json!({ "t": 0, "s": 1 }),
            serde_json::json!({ "t": 0 }),
        ],
    );
    write_source(input.path(), "M2", &memory_records(1, 1.0));

    let opts = options(input.path(), output.path(), ShapePolicy::Strict);
    let err = run_reports(&[ReportKind::Memory], &opts).unwrap_err();
    match err.downcast_ref::<ReportError>() {
        Some(ReportError::MissingField { field, index, .. }) => {
            assert_eq!(field, "s");
            assert_eq!(*index, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_compressed_sources_are_detected_without_configuration() {
    use std::io::Write;

    let input = TempDir::new().expect("temp dir");
    let output = TempDir::new().expect("temp dir");
    for (id, scale) in [("M1", 2.0), ("M2", 4.0)] {
        let file = std::fs::File::create(input.path().join(format!("{id}.json.gz"))).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let body = serde_json::to_vec(&memory_records(3, scale)).unwrap();
        encoder.write_all(&body).unwrap();
        encoder.finish().unwrap();
    }

    let opts = options(input.path(), output.path(), ShapePolicy::Strict);
    let written = run_reports(&[ReportKind::Memory], &opts).expect("reports");
    assert_eq!(written, vec![output.path().join("memory.eps")]);
}
