//! Importing legacy exports through the engine.

use domains::legacy::MIGRATED_BOARD_NAME;
use domains::{Board, Geometry, Note, StorageDriver};
use integration_tests::{drain, memory_engine, names};
use serde_json::json;
use services::{CoreErrorKind, CoreEvent};

#[tokio::test]
async fn bare_note_array_becomes_a_migrated_board() {
    let engine = memory_engine().await;

    let boards = engine.import_legacy_data(r#"[{"content":"hi","x":5,"y":5}]"#).await.unwrap();

    assert_eq!(boards.len(), 1);
    let board = &boards[0];
    assert_eq!(board.name, MIGRATED_BOARD_NAME);
    assert_eq!(board.notes.len(), 1);
    let note = &board.notes[0];
    assert_eq!(note.content_html, "hi");
    assert_eq!(note.geometry, Geometry { x: 5.0, y: 5.0, ..Geometry::default() });

    assert_eq!(engine.driver().load().await.unwrap(), boards);
    assert!(engine.can_undo());
}

#[tokio::test]
async fn colliding_ids_are_renamed() {
    let engine = memory_engine().await;
    let id = uuid::Uuid::new_v4();
    let export = json!({ "workspaces": [{ "id": id.to_string(), "name": "Old", "notes": [] }] }).to_string();

    let first = engine.import_legacy_data(&export).await.unwrap();
    let second = engine.import_legacy_data(&export).await.unwrap();

    assert_eq!(first[0].id, id);
    assert_ne!(second[0].id, id);
    assert_eq!(names(&engine.all_boards()), vec!["Old", "Old"]);
}

#[tokio::test]
async fn import_is_announced_and_undoable_per_board() {
    let engine = memory_engine().await;
    let mut rx = engine.subscribe();
    let export = json!({
        "workspaces": [
            { "name": "One", "notes": [{ "content": "a" }] },
            { "name": "Two", "notes": [] },
        ]
    })
    .to_string();

    engine.import_legacy_data(&export).await.unwrap();

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(e, CoreEvent::LegacyDataImported { board_count: 2 })));

    assert!(engine.undo().await);
    assert_eq!(names(&engine.all_boards()), vec!["One"]);
}

#[tokio::test]
async fn unparseable_input_changes_nothing() {
    let engine = memory_engine().await;
    let mut rx = engine.subscribe();

    assert!(engine.import_legacy_data("{not json").await.is_err());
    assert!(engine.all_boards().is_empty());

    let kinds: Vec<CoreErrorKind> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            CoreEvent::CoreError { kind, .. } => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec![CoreErrorKind::LegacyImportFailed]);
}

#[tokio::test]
async fn invalid_migrated_boards_abort_the_whole_import() {
    let engine = memory_engine().await;
    // A note far outside the canvas fails validation after migration.
    let export = json!([{ "content": "lost", "x": 1.0e9 }]).to_string();

    assert!(engine.import_legacy_data(&export).await.unwrap_err().is_validation());
    assert!(engine.all_boards().is_empty());
}

#[tokio::test]
async fn current_boards_in_an_export_are_sanitized() {
    let engine = memory_engine().await;
    let mut board = Board::new("Pasted");
    let mut note = Note::new();
    note.content_html = "<p>hi</p><script>alert(1)</script><img src=x onerror=alert(2)>".into();
    board.notes.push(note.clone());
    let export = json!({ "boards": [board] }).to_string();

    engine.import_legacy_data(&export).await.unwrap();

    let stored = engine.note(note.id).unwrap().content_html;
    assert!(stored.starts_with("<p>hi</p>"));
    assert!(!stored.contains("script"));
    assert!(!stored.contains("onerror"));
    let persisted = engine.driver().load().await.unwrap();
    assert_eq!(persisted[0].notes[0].content_html, stored);
}
