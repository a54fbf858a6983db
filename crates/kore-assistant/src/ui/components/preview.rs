//! Preview component showing the revealed declaration with gutter markers.

use std::fs;

use anyhow::{Context, Result};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::app::decorations::{GutterMarkers, gutter_glyph};
use crate::app::workspace::Reveal;
use crate::domain::model::DocumentId;

/// Window of source lines around a revealed declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewPane {
    pub document: DocumentId,
    /// One-based line the reveal points at.
    pub focus_line: usize,
    pub column: usize,
    pub lines: Vec<PreviewLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewLine {
    /// One-based line number.
    pub number: usize,
    pub glyph: &'static str,
    pub text: String,
}

impl PreviewPane {
    /// Read the revealed document and keep `context` lines either side of the focus.
    pub fn load(reveal: &Reveal, gutter: &GutterMarkers, context: usize) -> Result<Self> {
        let text = fs::read_to_string(reveal.document.path())
            .with_context(|| format!("failed to read {}", reveal.document))?;
        Ok(Self::from_text(&text, reveal, gutter, context))
    }

    pub fn from_text(text: &str, reveal: &Reveal, gutter: &GutterMarkers, context: usize) -> Self {
        let kinds = gutter.line_kinds(&reveal.document);
        let focus = reveal.line.saturating_sub(1);
        let first = focus.saturating_sub(context);
        let lines = text
            .lines()
            .enumerate()
            .skip(first)
            .take(focus - first + context + 1)
            .map(|(idx, line)| PreviewLine {
                number: idx + 1,
                glyph: kinds.get(&idx).map_or(" ", |kinds| gutter_glyph(kinds)),
                text: line.trim_end_matches('\r').to_owned(),
            })
            .collect();

        Self {
            document: reveal.document.clone(),
            focus_line: reveal.line,
            column: reveal.column,
            lines,
        }
    }
}

/// Ratatui component responsible for displaying a [`PreviewPane`].
#[derive(Debug, Default)]
pub struct Preview;

impl Preview {
    pub fn render(&self, pane: Option<&PreviewPane>, area: Rect, buf: &mut Buffer) {
        let Some(pane) = pane else {
            let placeholder = Paragraph::new("Press ↵ on a declaration to reveal it")
                .style(
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC),
                )
                .block(Block::default().title("Preview").borders(Borders::ALL))
                .wrap(Wrap { trim: true });
            placeholder.render(area, buf);
            return;
        };

        let title = format!(
            "{} ({}:{})",
            pane.document.file_name(),
            pane.focus_line,
            pane.column + 1
        );
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));

        let lines: Vec<Line> = pane
            .lines
            .iter()
            .map(|line| {
                let focused = line.number == pane.focus_line;
                let background = if focused {
                    Color::Rgb(40, 40, 70)
                } else {
                    Color::Reset
                };
                Line::from(vec![
                    Span::styled(
                        format!("{} ", line.glyph),
                        Style::default().fg(Color::Green).bg(background),
                    ),
                    Span::styled(
                        format!("{:>4} │ ", line.number),
                        Style::default().fg(Color::DarkGray).bg(background),
                    ),
                    Span::styled(line.text.clone(), Style::default().bg(background)),
                ])
            })
            .collect();

        Paragraph::new(lines).block(block).render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::app::decorations::{Decoration, DecorationHost};
    use crate::domain::model::{ElementKind, Position};

    #[test]
    fn keeps_context_around_focus_line() {
        let doc = DocumentId::new("/ws/Main.kt");
        let mut gutter = GutterMarkers::new();
        gutter.set_decorations(
            &doc,
            ElementKind::Function,
            vec![Decoration {
                span: crate::domain::model::Span::new(Position::new(3, 0), Position::new(3, 8)),
                hover: "Function: f".into(),
            }],
        );
        let reveal = Reveal {
            document: doc,
            line: 4,
            column: 0,
            text: "function(\"f\") {".into(),
        };
        let text = "a\nb\nc\nfunction(\"f\") {\n}\nz\nq";

        let pane = PreviewPane::from_text(text, &reveal, &gutter, 1);

        let numbers: Vec<_> = pane.lines.iter().map(|line| line.number).collect();
        assert_eq!(numbers, vec![3, 4, 5]);
        assert_eq!(pane.lines[1].glyph, "ƒ");
        assert_eq!(pane.lines[0].glyph, " ");
    }

    #[test]
    fn clamps_at_start_of_file() {
        let reveal = Reveal {
            document: DocumentId::new("/ws/Main.kt"),
            line: 1,
            column: 0,
            text: String::new(),
        };
        let pane = PreviewPane::from_text("one\ntwo", &reveal, &GutterMarkers::new(), 5);
        assert_eq!(pane.lines.len(), 2);
    }
}
