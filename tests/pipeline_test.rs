//! End-to-end pipeline scenarios: bulk sources on disk, in-process store,
//! full run through `run_import_pipeline`.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use cairn_importer::{
    run_import_pipeline, ImportConfig, ImportError, Mapping, MappingSet, MappingState,
    MemoryStore, PipelineOptions, ThingStore,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn write_jsonl(dir: &Path, name: &str, lines: &[&str]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

fn bulk_mapping(id: &str, collection: &str, path: &Path) -> Mapping {
    serde_yaml::from_str(&format!(
        r#"
id: {}
collection: {}
source:
  kind: bulk
  path: {}
transform:
  id: {{ field: "id" }}
  body: {{ field: "content", default: "" }}
  metadata:
    title: {{ field: "title" }}
"#,
        id,
        collection,
        path.display()
    ))
    .unwrap()
}

async fn run(
    mappings: Vec<Mapping>,
    store: Arc<MemoryStore>,
    configure: impl FnOnce(&mut PipelineOptions),
) -> cairn_importer::PipelineRunResult {
    let set = MappingSet::new(mappings).unwrap();
    let mut options = PipelineOptions::default();
    configure(&mut options);
    run_import_pipeline(&set, store, options).await.unwrap()
}

#[tokio::test]
async fn test_three_record_lifecycle() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let path = write_jsonl(
        dir.path(),
        "export.jsonl",
        &[
            r#"{"id": "a", "title": "A", "content": "alpha"}"#,
            r#"{"id": "b", "title": "B", "content": "beta"}"#,
            r#"{"id": "c", "title": "C", "content": "gamma"}"#,
        ],
    );

    // First run against an empty store: everything is created
    let run1 = run(
        vec![bulk_mapping("m", "items", &path)],
        store.clone(),
        |_| {},
    )
    .await;
    assert!(run1.success);
    assert_eq!(run1.total_created, 3);
    assert_eq!(run1.total_updated, 0);
    assert_eq!(run1.total_skipped, 0);
    assert_eq!(run1.total_errors, 0);

    // Mutate record B upstream and rerun: only B is updated
    write_jsonl(
        dir.path(),
        "export.jsonl",
        &[
            r#"{"id": "a", "title": "A", "content": "alpha"}"#,
            r#"{"id": "b", "title": "B", "content": "beta v2"}"#,
            r#"{"id": "c", "title": "C", "content": "gamma"}"#,
        ],
    );
    let run2 = run(
        vec![bulk_mapping("m", "items", &path)],
        store.clone(),
        |_| {},
    )
    .await;
    assert_eq!(run2.total_created, 0);
    assert_eq!(run2.total_updated, 1);
    assert_eq!(run2.total_skipped, 2);
    assert_eq!(run2.total_errors, 0);

    // Rerun unchanged: pure no-op
    let run3 = run(vec![bulk_mapping("m", "items", &path)], store, |_| {}).await;
    assert_eq!(run3.total_created, 0);
    assert_eq!(run3.total_updated, 0);
    assert_eq!(run3.total_skipped, 3);

    for r in run1
        .results
        .iter()
        .chain(run2.results.iter())
        .chain(run3.results.iter())
    {
        assert!(r.accounting_holds());
    }
}

#[tokio::test]
async fn test_idempotent_rerun_skips_everything() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let path = write_jsonl(
        dir.path(),
        "export.jsonl",
        &[
            r#"{"id": "x", "content": "one"}"#,
            r#"{"id": "y", "content": "two"}"#,
        ],
    );

    run(
        vec![bulk_mapping("m", "items", &path)],
        store.clone(),
        |_| {},
    )
    .await;
    let second = run(vec![bulk_mapping("m", "items", &path)], store, |_| {}).await;

    assert_eq!(second.total_created, 0);
    assert_eq!(second.results[0].skipped, second.results[0].processed);
}

#[tokio::test]
async fn test_dry_run_fidelity() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let path = write_jsonl(
        dir.path(),
        "export.jsonl",
        &[
            r#"{"id": "a", "content": "new version"}"#,
            r#"{"id": "b", "content": "brand new"}"#,
        ],
    );

    // Seed the store so record a exists with different content
    store
        .create_thing("items", "a", &Default::default(), "old version")
        .await
        .unwrap();

    let dry = run(
        vec![bulk_mapping("m", "items", &path)],
        store.clone(),
        |o| o.dry_run = true,
    )
    .await;
    // Classified but nothing written
    assert_eq!(dry.total_updated, 1);
    assert_eq!(dry.total_created, 1);
    assert_eq!(store.thing_count(), 1);
    assert_eq!(
        store
            .get_thing("items", "a")
            .await
            .unwrap()
            .unwrap()
            .body,
        "old version"
    );

    // A live run classifies every record identically, and writes
    let live = run(
        vec![bulk_mapping("m", "items", &path)],
        store.clone(),
        |_| {},
    )
    .await;
    assert_eq!(live.total_created, dry.total_created);
    assert_eq!(live.total_updated, dry.total_updated);
    assert_eq!(live.total_skipped, dry.total_skipped);
    assert_eq!(store.thing_count(), 2);
}

#[tokio::test]
async fn test_error_isolation() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let path = write_jsonl(
        dir.path(),
        "export.jsonl",
        &[
            r#"{"id": "a", "content": "1"}"#,
            r#"{"id": "b", "content": "2"}"#,
            r#"{"content": "no id, transform fails"}"#,
            r#"{"id": "d", "content": "4"}"#,
            r#"{"id": "e", "content": "5"}"#,
        ],
    );

    let result = run(vec![bulk_mapping("m", "items", &path)], store.clone(), |_| {}).await;
    let m = &result.results[0];

    assert_eq!(m.processed, 5);
    assert_eq!(m.errors, 1);
    assert_eq!(m.created, 4);
    assert_eq!(m.state, MappingState::Completed);
    assert_eq!(m.error_details.len(), 1);
    assert!(m.accounting_holds());
    assert!(!result.success);
    assert_eq!(store.thing_count(), 4);
}

#[tokio::test]
async fn test_skip_existing_never_touches_present_documents() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let path = write_jsonl(
        dir.path(),
        "export.jsonl",
        &[
            r#"{"id": "a", "content": "incoming"}"#,
            r#"{"id": "b", "content": "fresh"}"#,
        ],
    );

    store
        .create_thing("items", "a", &Default::default(), "original")
        .await
        .unwrap();

    let result = run(
        vec![bulk_mapping("m", "items", &path)],
        store.clone(),
        |o| o.skip_existing = true,
    )
    .await;

    assert_eq!(result.total_skipped, 1);
    assert_eq!(result.total_created, 1);
    assert_eq!(
        store
            .get_thing("items", "a")
            .await
            .unwrap()
            .unwrap()
            .body,
        "original"
    );
}

#[tokio::test]
async fn test_unknown_mapping_selection_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let path = write_jsonl(dir.path(), "export.jsonl", &[r#"{"id": "a"}"#]);

    let set = MappingSet::new(vec![bulk_mapping("real", "items", &path)]).unwrap();
    let mut options = PipelineOptions::default();
    options.mapping_filter = Some(vec!["zapier-apps".to_string()]);

    let err = run_import_pipeline(&set, store.clone(), options)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::Config(_)));
    // Aborted before any work
    assert_eq!(store.thing_count(), 0);
}

#[tokio::test]
async fn test_mapping_selection_runs_subset_only() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let apps = write_jsonl(dir.path(), "apps.jsonl", &[r#"{"id": "a"}"#]);
    let notes = write_jsonl(dir.path(), "notes.jsonl", &[r#"{"id": "n"}"#]);

    let result = run(
        vec![
            bulk_mapping("apps", "apps", &apps),
            bulk_mapping("notes", "notes", &notes),
        ],
        store.clone(),
        |o| o.mapping_filter = Some(vec!["notes".to_string()]),
    )
    .await;

    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].mapping_id, "notes");
    assert!(store.get_thing("apps", "a").await.unwrap().is_none());
    assert!(store.get_thing("notes", "n").await.unwrap().is_some());
}

#[tokio::test]
async fn test_failed_mapping_does_not_stop_others() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let good = write_jsonl(dir.path(), "good.jsonl", &[r#"{"id": "g"}"#]);
    // Loader construction fails for the missing file
    let missing = dir.path().join("missing.jsonl");

    let result = run(
        vec![
            bulk_mapping("broken", "items", &missing),
            bulk_mapping("good", "items", &good),
        ],
        store.clone(),
        |_| {},
    )
    .await;

    assert_eq!(result.results.len(), 2);
    let broken = result
        .results
        .iter()
        .find(|r| r.mapping_id == "broken")
        .unwrap();
    let good = result.results.iter().find(|r| r.mapping_id == "good").unwrap();

    assert_eq!(broken.state, MappingState::Failed);
    assert_eq!(broken.errors, 1);
    assert_eq!(good.state, MappingState::Completed);
    assert_eq!(good.created, 1);
    assert!(!result.success);
}

#[tokio::test]
async fn test_cancelled_run_reports_cancellation() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let path = write_jsonl(dir.path(), "export.jsonl", &[r#"{"id": "a"}"#]);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = run(
        vec![bulk_mapping("m", "items", &path)],
        store.clone(),
        |o| o.cancel = cancel,
    )
    .await;

    assert!(result.cancelled);
    assert!(!result.success);
    assert_eq!(store.thing_count(), 0);
}

#[tokio::test]
async fn test_concurrent_mappings_aggregate_cleanly() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let a = write_jsonl(
        dir.path(),
        "a.jsonl",
        &[r#"{"id": "a1"}"#, r#"{"id": "a2"}"#],
    );
    let b = write_jsonl(
        dir.path(),
        "b.jsonl",
        &[r#"{"id": "b1"}"#, r#"{"id": "b2"}"#, r#"{"id": "b3"}"#],
    );

    let result = run(
        vec![
            bulk_mapping("a", "left", &a),
            bulk_mapping("b", "right", &b),
        ],
        store.clone(),
        |o| o.max_concurrent_mappings = 2,
    )
    .await;

    assert!(result.success);
    assert_eq!(result.total_processed, 5);
    assert_eq!(result.total_created, 5);
    assert_eq!(store.thing_count(), 5);
}

#[tokio::test]
async fn test_full_config_file_offline_run() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let export = write_jsonl(
        dir.path(),
        "export.jsonl",
        &[r#"{"id": "a", "title": "Thing A", "content": "body"}"#],
    );

    let config_path = dir.path().join("import.yaml");
    fs::write(
        &config_path,
        format!(
            r#"
settings:
  max_in_flight_records: 4
mappings:
  - id: exports
    collection: things
    source:
      kind: bulk
      path: {}
    transform:
      id: {{ field: "title", slug: true }}
      body: {{ field: "content" }}
      metadata:
        title: {{ field: "title", required: true }}
"#,
            export.display()
        ),
    )
    .unwrap();

    let config = ImportConfig::load(&config_path).unwrap();
    let set = config.mapping_set().unwrap();
    let options = PipelineOptions::from_settings(&config.settings);

    let result = run_import_pipeline(&set, store.clone(), options)
        .await
        .unwrap();
    assert!(result.success);
    let thing = store.get_thing("things", "thing-a").await.unwrap().unwrap();
    assert_eq!(thing.body, "body");
    assert_eq!(thing.metadata["title"], serde_json::json!("Thing A"));
}
