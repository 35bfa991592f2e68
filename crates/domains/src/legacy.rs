//! # Legacy Migration
//!
//! Converts data exported by older app versions into the current board
//! schema. Every missing field is defaulted, so conversion never fails on
//! shape; only input that is not JSON at all is rejected.
//!
//! Accepted shapes:
//! - a bare array of note-like objects
//! - an array of workspace-like objects (first element has `notes`)
//! - a single object with a `notes` array
//! - an object with a `workspaces` array
//! - an object with a `boards` array, whose boards are converted only when
//!   their first note has no `geometry`

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{now_millis, Board, Geometry, Note};
use crate::sanitize::{sanitize_board, sanitize_html};

pub const MIGRATED_BOARD_NAME: &str = "Migrated Board";

#[derive(Debug, Error)]
#[error("failed to parse legacy data: {0}")]
pub struct LegacyParseError(#[from] serde_json::Error);

fn text<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn number(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(Value::as_f64).filter(|n| n.is_finite())
}

fn timestamp(value: &Value, key: &str, fallback: i64) -> i64 {
    match number(value, key) {
        Some(ms) if ms >= 1.0 => ms as i64,
        _ => fallback,
    }
}

fn id_or_fresh(value: &Value) -> Uuid {
    text(value, "id")
        .and_then(|s| Uuid::parse_str(s).ok())
        .filter(|id| !id.is_nil())
        .unwrap_or_else(Uuid::new_v4)
}

fn notes_of(value: &Value) -> Option<&Vec<Value>> {
    value.get("notes").and_then(Value::as_array)
}

/// Maps one legacy note (`{id?, content|contentHTML?, x?, y?, width?, height?,
/// tags?, color?, createdAt?, updatedAt?}`) onto the current note schema.
pub fn migrate_legacy_note(legacy: &Value) -> Note {
    let now = now_millis();
    let defaults = Geometry::default();
    let content = text(legacy, "contentHTML").or_else(|| text(legacy, "content")).unwrap_or("");
    let tags = legacy
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    let created_at = timestamp(legacy, "createdAt", now);

    Note {
        id: id_or_fresh(legacy),
        geometry: Geometry {
            x: number(legacy, "x").unwrap_or(defaults.x),
            y: number(legacy, "y").unwrap_or(defaults.y),
            w: number(legacy, "width").unwrap_or(defaults.w),
            h: number(legacy, "height").unwrap_or(defaults.h),
            z: 0,
        },
        content_html: sanitize_html(content),
        tags,
        color: text(legacy, "color").unwrap_or_default().to_string(),
        linked_assets: Vec::new(),
        created_at,
        updated_at: timestamp(legacy, "updatedAt", now).max(created_at),
    }
}

/// Builds a board around already-converted notes.
pub fn migrated_board(id: Uuid, name: &str, notes: Vec<Note>) -> Board {
    let mut board = Board::new(name);
    board.id = id;
    board.notes = notes;
    board
}

/// Maps a legacy workspace (`{id?, name?, notes?, createdAt?, updatedAt?}`).
pub fn migrate_legacy_workspace(legacy: &Value) -> Board {
    let now = now_millis();
    let notes = notes_of(legacy)
        .map(|notes| notes.iter().map(migrate_legacy_note).collect())
        .unwrap_or_default();
    let name = text(legacy, "name").unwrap_or(MIGRATED_BOARD_NAME);

    let mut board = migrated_board(id_or_fresh(legacy), name, notes);
    board.created_at = timestamp(legacy, "createdAt", now);
    board.updated_at = timestamp(legacy, "updatedAt", now).max(board.created_at);
    board
}

fn has_legacy_notes(board: &Value) -> bool {
    notes_of(board)
        .and_then(|notes| notes.first())
        .is_some_and(|first| first.get("geometry").is_none())
}

fn migrate_board_entry(board: &Value) -> Board {
    if has_legacy_notes(board) {
        return migrate_legacy_workspace(board);
    }
    // Close to current shape already; anything that still does not fit is
    // converted field by field rather than rejected.
    let mut migrated = serde_json::from_value::<Board>(board.clone())
        .unwrap_or_else(|_| migrate_legacy_workspace(board));
    sanitize_board(&mut migrated);
    migrated
}

/// Converts any supported legacy shape into boards. Unrecognized shapes
/// yield no boards.
pub fn migrate_from_legacy_format(data: &Value) -> Vec<Board> {
    match data {
        Value::Array(items) => match items.first() {
            None => Vec::new(),
            Some(first) if notes_of(first).is_some() => {
                items.iter().map(migrate_legacy_workspace).collect()
            }
            Some(_) => {
                let notes = items.iter().map(migrate_legacy_note).collect();
                vec![migrated_board(Uuid::new_v4(), MIGRATED_BOARD_NAME, notes)]
            }
        },
        Value::Object(_) => {
            if notes_of(data).is_some() {
                vec![migrate_legacy_workspace(data)]
            } else if let Some(workspaces) = data.get("workspaces").and_then(Value::as_array) {
                workspaces.iter().map(migrate_legacy_workspace).collect()
            } else if let Some(boards) = data.get("boards").and_then(Value::as_array) {
                boards.iter().map(migrate_board_entry).collect()
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

/// Parses a legacy export and converts it.
pub fn import_legacy_json(json: &str) -> Result<Vec<Board>, LegacyParseError> {
    let data: Value = serde_json::from_str(json)?;
    Ok(migrate_from_legacy_format(&data))
}
