//! Documents written by older releases must still load.

use folio_core::{Collection, Notes, Quotes, SourceMeta, SourceType, Summaries, Tasks};

#[test]
fn legacy_source_meta_with_naive_timestamps() {
    let json = r#"{
        "schema_version": "1.0.0",
        "title": "Understanding AI",
        "authors": ["Smith, John", "Doe, Jane"],
        "year": 2024,
        "source_type": "book",
        "metadata_source": "bibtex_import",
        "created_at": "2024-01-01T12:00:00.123456",
        "updated_at": "2024-01-02T08:30:00"
    }"#;
    let meta: SourceMeta = serde_json::from_str(json).unwrap();
    assert_eq!(meta.source_type, SourceType::Book);
    assert_eq!(meta.metadata_source, "bibtex_import");
    assert_eq!(meta.citation_key(), "Smith2024");
    assert!(meta.updated_at > meta.created_at);
}

#[test]
fn collections_missing_everything_but_items() {
    let notes: Notes = serde_json::from_str(r#"{"notes":[{"id":"n_1","content":"x","page":3}]}"#).unwrap();
    assert_eq!(notes.schema_version, "1.0.0");
    assert_eq!(notes.get_by_page(3).len(), 1);

    let quotes: Quotes = serde_json::from_str("{}").unwrap();
    assert!(quotes.is_empty());

    let tasks: Tasks = serde_json::from_str(r#"{"tasks":[{"id":"t_1","title":"Read"}]}"#).unwrap();
    assert_eq!(tasks.open_count(), 1);

    let sums: Summaries =
        serde_json::from_str(r#"{"summaries":[{"id":"s_1","title":"t","content":"c","source":"imported"}]}"#)
            .unwrap();
    assert!(sums.get_manual().is_empty());
    assert!(sums.get_ai_generated().is_empty());
}

#[test]
fn added_items_survive_json_round_trip() {
    let mut tasks = Tasks::default();
    tasks.add(folio_core::NewTask::new("Check stats").with_due_date("2031-05-01"));
    let id = tasks.items()[0].id.clone();
    tasks.complete(&id);

    let json = serde_json::to_string_pretty(&tasks).unwrap();
    let back: Tasks = serde_json::from_str(&json).unwrap();
    assert_eq!(back, tasks);
}

#[test]
fn sparse_documents_decode_identically_every_time() {
    let notes_json = r#"{"notes":[{"id":"n_1","content":"c"}]}"#;
    let a: Notes = serde_json::from_str(notes_json).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let b: Notes = serde_json::from_str(notes_json).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.items()[0].created_at, folio_core::timestamp::unknown());

    let meta_json = r#"{"title":"Untimed"}"#;
    let a: SourceMeta = serde_json::from_str(meta_json).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let b: SourceMeta = serde_json::from_str(meta_json).unwrap();
    assert_eq!(a, b);

    let project_json = r#"{"name":"P"}"#;
    let a: folio_core::ProjectConfig = serde_json::from_str(project_json).unwrap();
    let b: folio_core::ProjectConfig = serde_json::from_str(project_json).unwrap();
    assert_eq!(a, b);

    let tasks_json = r#"{"tasks":[{"id":"t_1","title":"Read"}]}"#;
    let a: Tasks = serde_json::from_str(tasks_json).unwrap();
    let b: Tasks = serde_json::from_str(tasks_json).unwrap();
    assert_eq!(a, b);
}
