use approx::assert_relative_eq;
use framecode_analysis::{
    write_raw_csv, write_summary_csv, AnalysisSpec, FileAnalysis, FileSummary, StatArgs,
    StatValue, Statistic,
};
use framecode_store::{ChannelConfig, ChannelKind, DataFile, Position, Shape, Value};
use std::path::Path;
use tempfile::TempDir;

fn write_session(path: &Path) {
    let mut file = DataFile::create(path).unwrap();
    let freeze = file
        .create_channel(ChannelKind::Event, ChannelConfig::named("freeze"))
        .unwrap();
    let body = file
        .create_channel(ChannelKind::Pos, ChannelConfig::named("body"))
        .unwrap();
    let zone = file
        .create_channel(ChannelKind::Zone, ChannelConfig::named("center"))
        .unwrap();
    file.set_zone_shape(
        zone,
        Shape::Polygon {
            points: vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]],
        },
    )
    .unwrap();

    file.notify_saw_first().unwrap();
    for i in 0..10 {
        let t = i as f64 * 0.1;
        file.add_timestamp(t).unwrap();
        file.set_value(freeze, t, Value::Event((3..6).contains(&i)))
            .unwrap();
        file.set_value(body, t, Value::Pos(Position::new(i as f64, 5.0)))
            .unwrap();
    }
    file.notify_saw_last().unwrap();
}

#[test]
fn test_load_and_compute() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mouse1.fcd");
    write_session(&path);

    let analysis = FileAnalysis::load(&path).unwrap();
    assert!(!analysis.missed_timestamps);
    assert_eq!(analysis.timestamps().len(), 10);

    let duration = analysis
        .compute_statistic("freeze", Statistic::ActiveDuration, &StatArgs::default())
        .unwrap()
        .as_f64()
        .unwrap();
    assert_relative_eq!(duration, 0.2, epsilon = 1e-9);

    let traveled = analysis
        .compute_statistic("body", Statistic::DistanceTraveled, &StatArgs::default())
        .unwrap();
    assert_eq!(traveled, StatValue::Number(9.0));

    let args = StatArgs {
        zone: Some("center".into()),
        ..Default::default()
    };
    let distance = analysis
        .compute_statistic("body", Statistic::MeanCenterDistance, &args)
        .unwrap()
        .as_f64()
        .unwrap();
    // x runs 0..9 against a centroid at x = 5
    assert_relative_eq!(distance, 2.5, epsilon = 1e-9);

    let area = analysis
        .compute_statistic("center", Statistic::Area, &StatArgs::default())
        .unwrap();
    assert_eq!(area, StatValue::Number(100.0));
}

#[test]
fn test_batch_export() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.fcd");
    write_session(&good);
    let bad = dir.path().join("bad.fcd");
    std::fs::write(&bad, b"not a data file").unwrap();

    let spec = AnalysisSpec::from_yaml_str(
        r#"
derived_channels:
  - name: moving_in_center
    method: pos_in_any_zone
    source: body
    zone_channels: [center]
computations:
  - statistic: event_count
  - statistic: active_duration
  - statistic: mean_speed
"#,
    )
    .unwrap();

    let mut summaries = Vec::new();
    for path in [&good, &bad] {
        let result = FileAnalysis::load(path).and_then(|mut analysis| {
            let raw = path.with_extension("csv");
            write_raw_csv(&analysis, raw)?;
            let stats = spec.apply(&mut analysis)?;
            Ok((analysis.missed_timestamps, stats))
        });
        summaries.push(match result {
            Ok((missed, stats)) => FileSummary {
                file: path.display().to_string(),
                missed_timestamps: Some(missed),
                result: Ok(stats),
            },
            Err(e) => FileSummary {
                file: path.display().to_string(),
                missed_timestamps: None,
                result: Err(e.to_string()),
            },
        });
    }

    assert!(summaries[0].result.is_ok());
    assert!(summaries[1].result.is_err());
    let stats = summaries[0].result.as_ref().unwrap();
    let derived = stats
        .iter()
        .find(|s| s.channel == "moving_in_center")
        .unwrap();
    assert_eq!(derived.values["event_count"], StatValue::Count(1));

    let summary_path = dir.path().join("summary.csv");
    write_summary_csv(&summary_path, &spec.labels(), &summaries).unwrap();
    let text = std::fs::read_to_string(&summary_path).unwrap();
    // freeze, moving_in_center, body, and the failed file
    assert_eq!(text.lines().count(), 1 + 3 + 1);
    assert!(dir.path().join("good.csv").exists());
}
