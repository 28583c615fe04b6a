use protest_transition::logging::init_logging;

#[test]
fn dropping_guard_flushes_file_layer() {
    let dir = tempfile::tempdir().unwrap();
    let guard = init_logging(dir.path(), "pipeline.log");
    tracing::info!(target: "protest_transition", source_id = "dpi", "Source cleaned");
    drop(guard);

    let contents: String = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
        .collect();
    let line = contents
        .lines()
        .find(|l| l.contains("Source cleaned"))
        .expect("log line flushed to file");
    let json: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(json["fields"]["source_id"], "dpi");
}
