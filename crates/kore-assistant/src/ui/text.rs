//! Plain-text renderings of the tree and the gutter.

use crate::app::decorations::{GutterMarkers, gutter_glyph};
use crate::app::tree::{TreeItem, TreeNode};
use crate::domain::model::DocumentId;
use crate::infra::line_index::LineIndex;

/// Indented outline of a materialized tree, one node per line.
pub fn render_tree(items: &[TreeItem]) -> String {
    let mut lines = Vec::new();
    push_items(items, 0, &mut lines);
    lines.join("\n")
}

fn push_items(items: &[TreeItem], depth: usize, lines: &mut Vec<String>) {
    for item in items {
        let indent = "  ".repeat(depth);
        let line = match &item.node {
            TreeNode::PathGroup { .. } => format!("{indent}{}/", item.node.label()),
            node => match node.description() {
                Some(description) => format!("{indent}{}  {description}", node.label()),
                None => format!("{indent}{}", node.label()),
            },
        };
        lines.push(line);
        push_items(&item.children, depth + 1, lines);
    }
}

/// Source text prefixed with a marker column and line numbers.
pub fn render_gutter(text: &str, document: &DocumentId, gutter: &GutterMarkers) -> String {
    let marked = gutter.line_kinds(document);
    let index = LineIndex::new(text);
    let mut count = index.line_count();
    if text.ends_with('\n') {
        count -= 1;
    }

    (0..count)
        .map(|line| {
            let glyph = marked
                .get(&line)
                .map_or(" ", |kinds| gutter_glyph(kinds));
            let source = index.line(line).unwrap_or_default();
            format!("{glyph} {:>4} │ {source}", line + 1)
                .trim_end()
                .to_owned()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
