//! Element tree component and state management.

use std::collections::HashSet;

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use crate::app::store::ElementStore;
use crate::app::tree::{TreeNode, TreePresenter, ViewOptions};
use crate::domain::model::ElementKind;

/// Flattened, navigable view of the presenter's output.
///
/// Nodes start expanded. Collapsed nodes are remembered by key so the state
/// survives rebuilds triggered by store changes.
#[derive(Debug, Default, Clone)]
pub struct ElementTreeState {
    rows: Vec<TreeRow>,
    selected: usize,
    collapsed: HashSet<String>,
}

#[derive(Debug, Clone)]
struct TreeRow {
    node: TreeNode,
    depth: usize,
    expanded: bool,
}

impl ElementTreeState {
    /// Recompute visible rows, keeping the selection on the same node when possible.
    pub fn rebuild(&mut self, presenter: &TreePresenter, store: &ElementStore) {
        let previous = self.selected_node().map(TreeNode::key);

        let mut rows = Vec::new();
        self.push_level(presenter, store, None, 0, &mut rows);
        self.rows = rows;

        self.selected = previous
            .and_then(|key| self.rows.iter().position(|row| row.node.key() == key))
            .unwrap_or_else(|| self.selected.min(self.rows.len().saturating_sub(1)));
        if self.is_separator(self.selected) {
            self.select_next();
        }
    }

    fn push_level(
        &self,
        presenter: &TreePresenter,
        store: &ElementStore,
        parent: Option<&TreeNode>,
        depth: usize,
        rows: &mut Vec<TreeRow>,
    ) {
        for node in presenter.children(store, parent) {
            let expanded = node.is_expandable() && !self.collapsed.contains(&node.key());
            rows.push(TreeRow {
                node: node.clone(),
                depth,
                expanded,
            });
            if expanded {
                self.push_level(presenter, store, Some(&node), depth + 1, rows);
            }
        }
    }

    /// Node under the cursor.
    pub fn selected_node(&self) -> Option<&TreeNode> {
        self.rows.get(self.selected).map(|row| &row.node)
    }

    pub fn selected_index(&self) -> Option<usize> {
        if self.rows.is_empty() {
            None
        } else {
            Some(self.selected)
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Advance selection to the next selectable row.
    pub fn select_next(&mut self) {
        let mut next = self.selected + 1;
        while self.is_separator(next) {
            next += 1;
        }
        if next < self.rows.len() {
            self.selected = next;
        }
    }

    /// Move selection to the previous selectable row.
    pub fn select_previous(&mut self) {
        let mut previous = self.selected;
        while previous > 0 {
            previous -= 1;
            if !self.is_separator(previous) {
                self.selected = previous;
                return;
            }
        }
    }

    /// Toggle the expansion of the selected node. Returns `true` when the
    /// rows need rebuilding.
    pub fn toggle_expansion(&mut self) -> bool {
        let Some(row) = self.rows.get(self.selected) else {
            return false;
        };
        if !row.node.is_expandable() {
            return false;
        }
        let key = row.node.key();
        if !self.collapsed.remove(&key) {
            self.collapsed.insert(key);
        }
        true
    }

    /// Expand the selected node, or step into its first child when already open.
    pub fn expand_or_enter(&mut self) -> bool {
        let Some(row) = self.rows.get(self.selected) else {
            return false;
        };
        if !row.node.is_expandable() {
            return false;
        }
        if row.expanded {
            self.select_next();
            false
        } else {
            self.collapsed.remove(&row.node.key())
        }
    }

    /// Collapse the selected node or move focus to its parent.
    pub fn collapse_or_parent(&mut self) -> bool {
        let Some(row) = self.rows.get(self.selected) else {
            return false;
        };
        if row.expanded {
            self.collapsed.insert(row.node.key());
            return true;
        }
        let depth = row.depth;
        if let Some(parent) = self.rows[..self.selected]
            .iter()
            .rposition(|candidate| candidate.depth < depth)
        {
            self.selected = parent;
        }
        false
    }

    fn is_separator(&self, index: usize) -> bool {
        self.rows
            .get(index)
            .is_some_and(|row| row.node == TreeNode::Separator)
    }
}

/// Ratatui component responsible for rendering the element tree.
#[derive(Debug, Default)]
pub struct ElementTree;

impl ElementTree {
    pub fn render(
        &self,
        frame: &mut Frame<'_>,
        area: Rect,
        state: &ElementTreeState,
        options: ViewOptions,
        has_focus: bool,
    ) {
        let layout = if options.group_by_file {
            "by file"
        } else {
            "by kind"
        };
        let sort = if options.sort_by_file {
            "sorted by file"
        } else {
            "sorted by name"
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("Kore · {layout} · {sort}"));

        if state.is_empty() {
            let placeholder = Paragraph::new("No datapacks or functions found")
                .style(
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC),
                )
                .block(block);
            frame.render_widget(placeholder, area);
            return;
        }

        let items: Vec<ListItem> = state.rows.iter().map(row_item).collect();

        let mut list_state = ListState::default();
        list_state.select(state.selected_index());

        let highlight_style = if has_focus {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Gray)
                .add_modifier(Modifier::BOLD)
        };

        let list = List::new(items)
            .block(block)
            .highlight_style(highlight_style)
            .highlight_symbol("▸ ");

        frame.render_stateful_widget(list, area, &mut list_state);
    }
}

fn row_item(row: &TreeRow) -> ListItem<'static> {
    let mut spans = vec![Span::raw("  ".repeat(row.depth))];

    match &row.node {
        TreeNode::Separator => {
            spans.push(Span::styled(
                row.node.label(),
                Style::default().fg(Color::DarkGray),
            ));
            return ListItem::new(Line::from(spans));
        }
        TreeNode::Element(leaf) => {
            let (glyph, color) = kind_glyph(leaf.element().kind);
            spans.push(Span::styled(format!("{glyph} "), Style::default().fg(color)));
        }
        node => {
            let symbol = if row.expanded { "▾" } else { "▸" };
            let color = match node {
                TreeNode::Category { .. } => Color::Magenta,
                _ => Color::Yellow,
            };
            spans.push(Span::styled(format!("{symbol} "), Style::default().fg(color)));
        }
    }

    let label_style = match row.node {
        TreeNode::Category { .. } | TreeNode::FileGroup { .. } => {
            Style::default().add_modifier(Modifier::BOLD)
        }
        _ => Style::default(),
    };
    spans.push(Span::styled(row.node.label(), label_style));

    if let Some(description) = row.node.description() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(description, Style::default().fg(Color::DarkGray)));
    }

    ListItem::new(Line::from(spans))
}

fn kind_glyph(kind: ElementKind) -> (&'static str, Color) {
    match kind {
        ElementKind::DataPack => ("▣", Color::Green),
        ElementKind::Function => ("ƒ", Color::Blue),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use crate::domain::model::{DocumentId, Element, Position};

    fn store() -> ElementStore {
        let mut store = ElementStore::new();
        for (name, kind, doc) in [
            ("a/b", ElementKind::DataPack, "/ws/F1.kt"),
            ("a/c", ElementKind::DataPack, "/ws/F2.kt"),
            ("d", ElementKind::Function, "/ws/F1.kt"),
        ] {
            store.add(Element::new(
                name,
                kind,
                crate::domain::model::Span::new(Position::new(0, 0), Position::new(0, 4)),
                DocumentId::new(doc),
            ));
        }
        store
    }

    fn labels(state: &ElementTreeState) -> Vec<String> {
        state.rows.iter().map(|row| row.node.label()).collect()
    }

    #[test]
    fn rows_start_fully_expanded() {
        let store = store();
        let presenter = TreePresenter::new(ViewOptions::default());
        let mut state = ElementTreeState::default();
        state.rebuild(&presenter, &store);

        assert_eq!(state.len(), 7);
        assert_eq!(labels(&state)[..3], ["Datapacks", "a", "b"]);
    }

    #[test]
    fn navigation_skips_separators() {
        let store = store();
        let presenter = TreePresenter::new(ViewOptions::default());
        let mut state = ElementTreeState::default();
        state.rebuild(&presenter, &store);

        for _ in 0..3 {
            state.select_next();
        }
        assert_eq!(state.selected_node().map(TreeNode::label).as_deref(), Some("c"));
        state.select_previous();
        assert_eq!(state.selected_node().map(TreeNode::label).as_deref(), Some("b"));
    }

    #[test]
    fn collapse_survives_rebuild() {
        let mut store = store();
        let presenter = TreePresenter::new(ViewOptions::default());
        let mut state = ElementTreeState::default();
        state.rebuild(&presenter, &store);

        state.select_next();
        assert!(state.toggle_expansion());
        state.rebuild(&presenter, &store);
        assert_eq!(labels(&state), vec!["Datapacks", "a", "Functions", "d"]);

        store.add(Element::new(
            "e",
            ElementKind::Function,
            crate::domain::model::Span::default(),
            DocumentId::new("/ws/F3.kt"),
        ));
        state.rebuild(&presenter, &store);
        assert_eq!(state.selected_node().map(TreeNode::label).as_deref(), Some("a"));
        assert!(!labels(&state).contains(&"b".to_string()));
    }

    #[test]
    fn selection_stays_on_repeated_declaration() {
        let mut store = ElementStore::new();
        for line in [0, 5] {
            store.add(Element::new(
                "dup",
                ElementKind::Function,
                crate::domain::model::Span::new(Position::new(line, 0), Position::new(line, 4)),
                DocumentId::new("/ws/F1.kt"),
            ));
        }
        let presenter = TreePresenter::new(ViewOptions::default());
        let mut state = ElementTreeState::default();
        state.rebuild(&presenter, &store);

        state.select_next();
        state.select_next();
        assert_eq!(state.selected_index(), Some(2));
        state.rebuild(&presenter, &store);
        assert_eq!(state.selected_index(), Some(2));
    }

    #[test]
    fn collapse_or_parent_moves_up() {
        let store = store();
        let presenter = TreePresenter::new(ViewOptions::default());
        let mut state = ElementTreeState::default();
        state.rebuild(&presenter, &store);

        state.select_next();
        state.select_next();
        assert!(!state.collapse_or_parent());
        assert_eq!(state.selected_node().map(TreeNode::label).as_deref(), Some("a"));
        assert!(state.collapse_or_parent());
    }

    #[test]
    fn renders_tree_for_store() {
        let backend = TestBackend::new(60, 12);
        let mut terminal = Terminal::new(backend).unwrap();

        let store = store();
        let presenter = TreePresenter::new(ViewOptions::default());
        let mut state = ElementTreeState::default();
        state.rebuild(&presenter, &store);

        terminal
            .draw(|frame| {
                let area = frame.size();
                ElementTree.render(frame, area, &state, presenter.options(), true);
            })
            .unwrap();

        let buffer = terminal.backend().buffer().clone();
        let content: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(content.contains("Datapacks"));
        assert!(content.contains("F2.kt (1)"));
    }
}
