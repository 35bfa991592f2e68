//! corkboard/crates/domains/src/lib.rs
//!
//! The domain model, validation rules and port definitions for Corkboard.

pub mod error;
pub mod legacy;
pub mod models;
pub mod sanitize;
pub mod traits;
pub mod validation;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;

/// Schema version stamped on backups and other exported snapshots.
pub const CURRENT_DATA_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::models::*;

    #[test]
    fn board_document_uses_camel_case() {
        let mut board = Board::new("Hello Rust!");
        board.notes.push(Note::new());
        let json = serde_json::to_value(&board).unwrap();

        assert!(json.get("createdAt").is_some());
        assert!(json["notes"][0].get("contentHTML").is_some());
        assert!(json["notes"][0].get("linkedAssets").is_some());

        let back: Board = serde_json::from_value(json).unwrap();
        assert_eq!(back, board);
    }

    #[test]
    fn asset_kind_serializes_as_type_tag() {
        let asset = Asset {
            id: uuid::Uuid::new_v4(),
            kind: AssetKind::Code,
            path: None,
            mime: "text/x-rust".into(),
            metadata: Default::default(),
        };
        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["type"], "code");
        assert!(json.get("path").is_none());
    }

    #[test]
    fn note_apply_merges_partial_geometry() {
        let mut note = Note::new();
        note.apply(NotePatch {
            geometry: Some(GeometryPatch { x: Some(40.0), z: Some(3), ..Default::default() }),
            ..NotePatch::default()
        });
        assert_eq!(note.geometry, Geometry { x: 40.0, y: 0.0, w: 200.0, h: 150.0, z: 3 });
    }

    #[test]
    fn board_apply_keeps_id() {
        let mut board = Board::new("A");
        let id = board.id;
        board.apply(BoardPatch { id: Some(uuid::Uuid::new_v4()), ..BoardPatch::named("B") });
        assert_eq!(board.id, id);
        assert_eq!(board.name, "B");
    }
}
