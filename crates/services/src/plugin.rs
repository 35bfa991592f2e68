//! # Plugins
//!
//! Extension points called after engine mutations. Hooks never run inline
//! with the mutation that triggered them: the engine queues them and a
//! dispatcher task runs them in order, so a hook may call back into the
//! engine freely. Hook errors are logged and never reach the caller of the
//! original mutation.

use async_trait::async_trait;
use domains::{Board, BoardId, Note, NoteId, NotePatch};
use tracing::debug;

use crate::engine::Engine;
use crate::events::SyncEvent;

#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    async fn on_register(&self, _engine: &Engine) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_init(&self, _engine: &Engine) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_board_create(&self, _engine: &Engine, _board: &Board) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_board_update(&self, _engine: &Engine, _board: &Board) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_board_delete(&self, _engine: &Engine, _board_id: BoardId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_note_create(
        &self,
        _engine: &Engine,
        _board_id: BoardId,
        _note: &Note,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_note_update(
        &self,
        _engine: &Engine,
        _board_id: BoardId,
        _note: &Note,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_note_delete(
        &self,
        _engine: &Engine,
        _board_id: BoardId,
        _note_id: NoteId,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called by `Engine::flush_sync` for each queued event. Unlike the other
    /// hooks, an error here fails the flush.
    async fn on_sync(&self, _engine: &Engine, _event: &SyncEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

const TAG_RULES: &[(&[&str], &str)] = &[
    (&["todo", "task"], "todo"),
    (&["idea", "concept"], "idea"),
    (&["bug", "issue"], "issue"),
];

/// Visible text of an HTML fragment, lowercased.
fn plain_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.extend(c.to_lowercase()),
            _ => {}
        }
    }
    text
}

/// Tags implied by keywords in a note's content.
pub fn suggest_tags(content_html: &str) -> Vec<String> {
    let text = plain_text(content_html);
    TAG_RULES
        .iter()
        .filter(|(keywords, _)| keywords.iter().any(|k| text.contains(k)))
        .map(|(_, tag)| tag.to_string())
        .collect()
}

/// Tags untagged notes from keywords in their content whenever they change.
#[derive(Debug, Default)]
pub struct TagSuggester;

#[async_trait]
impl Plugin for TagSuggester {
    fn name(&self) -> &str {
        "tag-suggester"
    }

    async fn on_note_update(
        &self,
        engine: &Engine,
        board_id: BoardId,
        note: &Note,
    ) -> anyhow::Result<()> {
        if !note.tags.is_empty() || note.content_html.is_empty() {
            return Ok(());
        }
        let tags = suggest_tags(&note.content_html);
        if tags.is_empty() {
            return Ok(());
        }

        debug!(note_id = %note.id, ?tags, "suggesting tags");
        let patch = NotePatch { tags: Some(tags), ..NotePatch::default() };
        engine.update_note(board_id, note.id, patch).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_from_keywords() {
        assert_eq!(suggest_tags("<p>TODO: fix the <em>bug</em></p>"), vec!["todo", "issue"]);
        assert_eq!(suggest_tags("A new concept"), vec!["idea"]);
        assert!(suggest_tags("groceries").is_empty());
    }

    #[test]
    fn ignores_markup() {
        // "task" only appears inside an attribute
        assert!(suggest_tags(r#"<a href="/task">link</a>"#).is_empty());
    }
}
