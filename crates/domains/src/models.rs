//! # Domain Models
//!
//! These structs represent the core entities of Corkboard.
//! Serialized field names are camelCase so stored documents stay readable by
//! the web and desktop surfaces. Timestamps are Unix epoch milliseconds.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub type BoardId = Uuid;
pub type NoteId = Uuid;

/// Free-form metadata bucket carried by assets and playlists.
pub type Metadata = Map<String, Value>;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A named workspace holding notes, assets and playlists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: BoardId,
    pub name: String,
    pub theme: String,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub playlists: Vec<Playlist>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Board {
    pub const DEFAULT_NAME: &'static str = "New Board";
    pub const DEFAULT_THEME: &'static str = "default";

    /// An empty board stamped with the current time.
    pub fn new(name: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            theme: Self::DEFAULT_THEME.to_string(),
            notes: Vec::new(),
            assets: Vec::new(),
            playlists: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn note(&self, note_id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == note_id)
    }

    pub fn note_position(&self, note_id: NoteId) -> Option<usize> {
        self.notes.iter().position(|n| n.id == note_id)
    }

    /// Bumps `updated_at`, never moving it before `created_at`.
    pub fn touch(&mut self) {
        self.updated_at = now_millis().max(self.created_at);
    }

    /// Merges the fields present in `patch`. The id is immutable and ignored.
    pub fn apply(&mut self, patch: BoardPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(assets) = patch.assets {
            self.assets = assets;
        }
        if let Some(playlists) = patch.playlists {
            self.playlists = playlists;
        }
        if let Some(created_at) = patch.created_at {
            self.created_at = created_at;
        }
        if let Some(updated_at) = patch.updated_at {
            self.updated_at = updated_at;
        }
    }
}

/// Placement, size and stacking order of a note on its board.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub z: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, w: 200.0, h: 150.0, z: 0 }
    }
}

impl Geometry {
    pub fn merged(mut self, patch: &GeometryPatch) -> Self {
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(w) = patch.w {
            self.w = w;
        }
        if let Some(h) = patch.h {
            self.h = h;
        }
        if let Some(z) = patch.z {
            self.z = z;
        }
        self
    }
}

/// A positioned content unit owned by exactly one board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub geometry: Geometry,
    /// Sanitized HTML. Never holds script-executing markup once stored.
    #[serde(rename = "contentHTML")]
    pub content_html: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub linked_assets: Vec<Uuid>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Note {
    /// A blank note with default geometry.
    pub fn new() -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4(),
            geometry: Geometry::default(),
            content_html: String::new(),
            tags: Vec::new(),
            color: String::new(),
            linked_assets: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges the fields present in `patch`, including a partial geometry.
    pub fn apply(&mut self, patch: NotePatch) {
        if let Some(geometry) = patch.geometry {
            self.geometry = self.geometry.merged(&geometry);
        }
        if let Some(content_html) = patch.content_html {
            self.content_html = content_html;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(linked_assets) = patch.linked_assets {
            self.linked_assets = linked_assets;
        }
        if let Some(created_at) = patch.created_at {
            self.created_at = created_at;
        }
        if let Some(updated_at) = patch.updated_at {
            self.updated_at = updated_at;
        }
    }
}

impl Default for Note {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Video,
    Audio,
    File,
    Code,
}

/// Opaque media reference. Persisted only as part of its board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub mime: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: Uuid,
    /// Asset ids, in play order.
    #[serde(default)]
    pub tracks: Vec<Uuid>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Subset of board fields used for creation and partial updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<BoardId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<Note>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<Vec<Asset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlists: Option<Vec<Playlist>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl BoardPatch {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }
}

impl From<Board> for BoardPatch {
    fn from(board: Board) -> Self {
        Self {
            id: Some(board.id),
            name: Some(board.name),
            theme: Some(board.theme),
            notes: Some(board.notes),
            assets: Some(board.assets),
            playlists: Some(board.playlists),
            created_at: Some(board.created_at),
            updated_at: Some(board.updated_at),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<u32>,
}

impl From<Geometry> for GeometryPatch {
    fn from(g: Geometry) -> Self {
        Self { x: Some(g.x), y: Some(g.y), w: Some(g.w), h: Some(g.h), z: Some(g.z) }
    }
}

/// Subset of note fields used for creation and partial updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NoteId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<GeometryPatch>,
    #[serde(rename = "contentHTML", default, skip_serializing_if = "Option::is_none")]
    pub content_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_assets: Option<Vec<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl NotePatch {
    pub fn with_content(content_html: impl Into<String>) -> Self {
        Self { content_html: Some(content_html.into()), ..Self::default() }
    }
}

impl From<Note> for NotePatch {
    fn from(note: Note) -> Self {
        Self {
            id: Some(note.id),
            geometry: Some(note.geometry.into()),
            content_html: Some(note.content_html),
            tags: Some(note.tags),
            color: Some(note.color),
            linked_assets: Some(note.linked_assets),
            created_at: Some(note.created_at),
            updated_at: Some(note.updated_at),
        }
    }
}
