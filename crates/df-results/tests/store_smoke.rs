use df_results::*;

fn manifest(run_id: &str, example_id: &str, timestamp: &str) -> RunManifest {
    RunManifest {
        run_id: run_id.to_string(),
        example_id: example_id.to_string(),
        model: "BasicVolumeMassConservation".to_string(),
        timestamp: timestamp.to_string(),
        columns: vec!["m".to_string(), "P".to_string()],
        rows: 2,
        stats: RunStats {
            accepted_steps: 12,
            rejected_steps: 1,
            rhs_evaluations: 79,
        },
        engine_version: "0.1.0".to_string(),
    }
}

fn records() -> Vec<TimeseriesRecord> {
    vec![
        TimeseriesRecord::from_row(0.0, [0.00119, 100_031.0]),
        TimeseriesRecord::from_row(1.0, [0.00129, f64::NAN]),
    ]
}

fn fresh_store(name: &str) -> RunStore {
    let dir = std::env::temp_dir().join(format!("df_results_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    RunStore::new(dir).unwrap()
}

#[test]
fn save_and_load_run() {
    let store = fresh_store("save");
    let m = manifest("run_a", "mass", "2026-02-25T12:00:00+00:00");
    assert!(!store.has_run("run_a"));
    store.save_run(&m, &records()).unwrap();
    assert!(store.has_run("run_a"));

    assert_eq!(store.load_manifest("run_a").unwrap(), m);
    let loaded = store.load_timeseries("run_a").unwrap();
    assert_eq!(loaded, records());

    let series = extract_series(&m, &loaded, "P").unwrap();
    assert_eq!(series, vec![(0.0, Some(100_031.0)), (1.0, None)]);
    let t = extract_series(&m, &loaded, "time").unwrap();
    assert_eq!(t[1], (1.0, Some(1.0)));
    assert!(matches!(
        extract_series(&m, &loaded, "T"),
        Err(ResultsError::VariableNotFound { .. })
    ));

    let summary = summarize(&m, &loaded);
    assert_eq!(summary.time_range, Some((0.0, 1.0)));
    assert_eq!(summary.record_count, 2);
}

#[test]
fn missing_run_reported() {
    let store = fresh_store("missing");
    assert!(matches!(
        store.load_manifest("nope"),
        Err(ResultsError::RunNotFound { .. })
    ));
    assert!(matches!(
        store.load_timeseries("nope"),
        Err(ResultsError::RunNotFound { .. })
    ));
}

#[test]
fn row_width_mismatch_rejected() {
    let store = fresh_store("width");
    let m = manifest("run_w", "mass", "2026-02-25T12:00:00+00:00");
    let bad = vec![TimeseriesRecord::from_row(0.0, [1.0])];
    assert!(matches!(
        store.save_run(&m, &bad),
        Err(ResultsError::RowWidth { got: 1, expected: 2, .. })
    ));
    assert!(!store.has_run("run_w"));
}

#[test]
fn list_runs_by_example_oldest_first() {
    let store = fresh_store("list");
    store
        .save_run(&manifest("r2", "mass", "2026-02-25T13:00:00+00:00"), &[])
        .unwrap();
    store
        .save_run(&manifest("r1", "mass", "2026-02-25T12:00:00+00:00"), &[])
        .unwrap();
    store
        .save_run(&manifest("r3", "energy", "2026-02-25T14:00:00+00:00"), &[])
        .unwrap();

    let ids: Vec<_> = store
        .list_runs("mass")
        .unwrap()
        .into_iter()
        .map(|m| m.run_id)
        .collect();
    assert_eq!(ids, vec!["r1", "r2"]);
    assert_eq!(store.list_runs("energy").unwrap().len(), 1);

    store.delete_run("r1").unwrap();
    assert_eq!(store.list_runs("mass").unwrap().len(), 1);
}

#[test]
fn study_store_lives_next_to_study() {
    let dir = std::env::temp_dir().join(format!("df_results_study_{}", std::process::id()));
    let store = RunStore::for_study(&dir.join("study.yaml")).unwrap();
    assert_eq!(store.root_dir(), dir.join(".daeflow").join("runs"));
}
