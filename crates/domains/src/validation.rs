//! # Validation
//!
//! Schema checks for boards and notes. Full checks (`validate_board`,
//! `validate_note`) run on complete entities; patch checks apply the same
//! per-field rules to whichever fields are present and return a normalized
//! patch ready for merging. All checks are pure and collect every violation
//! instead of stopping at the first.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use uuid::Uuid;

use crate::error::{FieldViolation, ValidationError};
use crate::models::{Asset, Board, BoardPatch, GeometryPatch, Note, NotePatch, Playlist};
use crate::sanitize::sanitize_html;

pub const MAX_BOARD_NAME_CHARS: usize = 200;
pub const MAX_THEME_CHARS: usize = 50;
pub const MAX_NOTES_PER_BOARD: usize = 10_000;
pub const MAX_ASSETS_PER_BOARD: usize = 10_000;
pub const MAX_PLAYLISTS_PER_BOARD: usize = 1_000;
pub const MAX_CONTENT_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_CHARS: usize = 50;
pub const MAX_COLOR_CHARS: usize = 50;
pub const MAX_ASSET_PATH_CHARS: usize = 2048;
pub const MAX_MIME_CHARS: usize = 100;
pub const POSITION_RANGE: RangeInclusive<f64> = 0.0..=100_000.0;
pub const SIZE_RANGE: RangeInclusive<f64> = 50.0..=5_000.0;

#[derive(Default)]
struct Violations(Vec<FieldViolation>);

impl Violations {
    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldViolation { field: field.into(), message: message.into() });
    }

    fn finish(self, entity: &'static str) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { entity, violations: self.0 })
        }
    }

    fn id(&mut self, field: &str, id: &Uuid) {
        if id.is_nil() {
            self.push(field, "must be a non-nil UUID");
        }
    }

    fn text(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let len = value.chars().count();
        if len < min {
            self.push(field, format!("must be at least {min} characters"));
        } else if len > max {
            self.push(field, format!("must be at most {max} characters"));
        }
    }

    fn timestamp(&mut self, field: &str, value: i64) {
        if value <= 0 {
            self.push(field, "must be a positive timestamp");
        }
    }

    fn ranged(&mut self, field: &str, value: f64, range: &RangeInclusive<f64>) {
        if !value.is_finite() || !range.contains(&value) {
            self.push(
                field,
                format!("must be between {} and {}", range.start(), range.end()),
            );
        }
    }

    fn bounded<T>(&mut self, field: &str, items: &[T], max: usize) {
        if items.len() > max {
            self.push(field, format!("must hold at most {max} items"));
        }
    }

    fn unique_ids<'a>(&mut self, field: &str, ids: impl Iterator<Item = &'a Uuid>) {
        let mut seen = HashSet::new();
        for id in ids {
            if !seen.insert(id) {
                self.push(field, format!("duplicate id {id}"));
            }
        }
    }

    fn geometry(&mut self, prefix: &str, patch: &GeometryPatch) {
        if let Some(x) = patch.x {
            self.ranged(&format!("{prefix}.x"), x, &POSITION_RANGE);
        }
        if let Some(y) = patch.y {
            self.ranged(&format!("{prefix}.y"), y, &POSITION_RANGE);
        }
        if let Some(w) = patch.w {
            self.ranged(&format!("{prefix}.w"), w, &SIZE_RANGE);
        }
        if let Some(h) = patch.h {
            self.ranged(&format!("{prefix}.h"), h, &SIZE_RANGE);
        }
    }

    fn content(&mut self, field: &str, content: &str) {
        if content.len() > MAX_CONTENT_BYTES {
            self.push(field, format!("must be at most {MAX_CONTENT_BYTES} bytes"));
        }
    }

    fn tags(&mut self, field: &str, tags: &[String]) {
        self.bounded(field, tags, MAX_TAGS);
        for (i, tag) in tags.iter().enumerate() {
            self.text(&format!("{field}[{i}]"), tag, 0, MAX_TAG_CHARS);
        }
    }

    fn linked_assets(&mut self, field: &str, ids: &[Uuid]) {
        for (i, id) in ids.iter().enumerate() {
            self.id(&format!("{field}[{i}]"), id);
        }
    }

    fn note(&mut self, prefix: &str, note: &Note) {
        self.id(&format!("{prefix}id"), &note.id);
        self.geometry(&format!("{prefix}geometry"), &GeometryPatch::from(note.geometry));
        self.content(&format!("{prefix}contentHTML"), &note.content_html);
        self.tags(&format!("{prefix}tags"), &note.tags);
        self.text(&format!("{prefix}color"), &note.color, 0, MAX_COLOR_CHARS);
        self.linked_assets(&format!("{prefix}linkedAssets"), &note.linked_assets);
        self.timestamp(&format!("{prefix}createdAt"), note.created_at);
        self.timestamp(&format!("{prefix}updatedAt"), note.updated_at);
    }

    fn asset(&mut self, prefix: &str, asset: &Asset) {
        self.id(&format!("{prefix}.id"), &asset.id);
        if let Some(path) = &asset.path {
            self.text(&format!("{prefix}.path"), path, 0, MAX_ASSET_PATH_CHARS);
        }
        self.text(&format!("{prefix}.mime"), &asset.mime, 0, MAX_MIME_CHARS);
    }

    fn playlist(&mut self, prefix: &str, playlist: &Playlist) {
        self.id(&format!("{prefix}.id"), &playlist.id);
        self.linked_assets(&format!("{prefix}.tracks"), &playlist.tracks);
    }

    fn notes(&mut self, notes: &[Note]) {
        self.bounded("notes", notes, MAX_NOTES_PER_BOARD);
        self.unique_ids("notes", notes.iter().map(|n| &n.id));
        for (i, note) in notes.iter().enumerate() {
            self.note(&format!("notes[{i}]."), note);
        }
    }

    fn assets(&mut self, assets: &[Asset]) {
        self.bounded("assets", assets, MAX_ASSETS_PER_BOARD);
        self.unique_ids("assets", assets.iter().map(|a| &a.id));
        for (i, asset) in assets.iter().enumerate() {
            self.asset(&format!("assets[{i}]"), asset);
        }
    }

    fn playlists(&mut self, playlists: &[Playlist]) {
        self.bounded("playlists", playlists, MAX_PLAYLISTS_PER_BOARD);
        self.unique_ids("playlists", playlists.iter().map(|p| &p.id));
        for (i, playlist) in playlists.iter().enumerate() {
            self.playlist(&format!("playlists[{i}]"), playlist);
        }
    }
}

/// Checks a complete board, including every note, asset and playlist it holds.
pub fn validate_board(board: &Board) -> Result<(), ValidationError> {
    let mut v = Violations::default();
    v.id("id", &board.id);
    v.text("name", &board.name, 1, MAX_BOARD_NAME_CHARS);
    v.text("theme", &board.theme, 0, MAX_THEME_CHARS);
    v.notes(&board.notes);
    v.assets(&board.assets);
    v.playlists(&board.playlists);
    v.timestamp("createdAt", board.created_at);
    v.timestamp("updatedAt", board.updated_at);
    if board.updated_at < board.created_at {
        v.push("updatedAt", "must not be earlier than createdAt");
    }
    v.finish("board")
}

/// Checks a complete note.
pub fn validate_note(note: &Note) -> Result<(), ValidationError> {
    let mut v = Violations::default();
    v.note("", note);
    v.finish("note")
}

/// Checks only the board fields present in `patch`. Content of any notes it
/// carries is sanitized first, as in [`validate_note_patch`].
pub fn validate_board_patch(mut patch: BoardPatch) -> Result<BoardPatch, ValidationError> {
    if let Some(notes) = patch.notes.as_mut() {
        for note in notes.iter_mut() {
            note.content_html = sanitize_html(&note.content_html);
        }
    }

    let mut v = Violations::default();
    if let Some(id) = &patch.id {
        v.id("id", id);
    }
    if let Some(name) = &patch.name {
        v.text("name", name, 1, MAX_BOARD_NAME_CHARS);
    }
    if let Some(theme) = &patch.theme {
        v.text("theme", theme, 0, MAX_THEME_CHARS);
    }
    if let Some(notes) = &patch.notes {
        v.notes(notes);
    }
    if let Some(assets) = &patch.assets {
        v.assets(assets);
    }
    if let Some(playlists) = &patch.playlists {
        v.playlists(playlists);
    }
    if let Some(created_at) = patch.created_at {
        v.timestamp("createdAt", created_at);
    }
    if let Some(updated_at) = patch.updated_at {
        v.timestamp("updatedAt", updated_at);
    }
    v.finish("board")?;
    Ok(patch)
}

/// Checks only the note fields present in `patch`. The returned patch carries
/// sanitized content, so applying this function to its own output is a no-op.
pub fn validate_note_patch(mut patch: NotePatch) -> Result<NotePatch, ValidationError> {
    if let Some(content) = patch.content_html.take() {
        patch.content_html = Some(sanitize_html(&content));
    }

    let mut v = Violations::default();
    if let Some(id) = &patch.id {
        v.id("id", id);
    }
    if let Some(geometry) = &patch.geometry {
        v.geometry("geometry", geometry);
    }
    if let Some(content) = &patch.content_html {
        v.content("contentHTML", content);
    }
    if let Some(tags) = &patch.tags {
        v.tags("tags", tags);
    }
    if let Some(color) = &patch.color {
        v.text("color", color, 0, MAX_COLOR_CHARS);
    }
    if let Some(linked) = &patch.linked_assets {
        v.linked_assets("linkedAssets", linked);
    }
    if let Some(created_at) = patch.created_at {
        v.timestamp("createdAt", created_at);
    }
    if let Some(updated_at) = patch.updated_at {
        v.timestamp("updatedAt", updated_at);
    }
    v.finish("note")?;
    Ok(patch)
}
