//! HTML sanitization for note content.
//!
//! Notes accept a small formatting vocabulary. Anything outside it (scripts,
//! event handler attributes, `javascript:` URLs, styles) is stripped.

use std::collections::{HashMap, HashSet};

use ammonia::Builder;
use once_cell::sync::Lazy;

use crate::models::Board;

const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "strong", "em", "u", "s", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li",
    "a", "img", "blockquote", "code", "pre", "div", "span",
];

static SANITIZER: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::default();
    builder
        .tags(ALLOWED_TAGS.iter().copied().collect())
        .generic_attributes(HashSet::from(["title", "class"]))
        .tag_attributes(HashMap::from([
            ("a", HashSet::from(["href"])),
            ("img", HashSet::from(["src", "alt"])),
        ]));
    builder
});

/// Returns `html` with every disallowed tag and attribute removed.
pub fn sanitize_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    SANITIZER.clean(html).to_string()
}

/// Sanitizes the content of every note on `board` in place.
pub fn sanitize_board(board: &mut Board) {
    for note in &mut board.notes {
        note.content_html = sanitize_html(&note.content_html);
    }
}
