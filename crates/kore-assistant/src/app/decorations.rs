//! Gutter decorations for the active document.

use std::collections::{BTreeMap, HashMap};

use crate::domain::model::{DocumentId, Element, ElementKind, Span};

/// One gutter marker with its hover text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
    pub span: Span,
    pub hover: String,
}

/// Receiver of painted markers.
///
/// Each call replaces every marker previously painted for the same document
/// and kind.
pub trait DecorationHost {
    fn set_decorations(
        &mut self,
        document: &DocumentId,
        kind: ElementKind,
        decorations: Vec<Decoration>,
    );
}

/// Partitions elements per kind and repaints them on a [`DecorationHost`].
#[derive(Debug, Clone)]
pub struct DecorationRenderer {
    extensions: Vec<String>,
}

impl DecorationRenderer {
    /// `extensions` lists the tracked content types, e.g. `["kt", "kts"]`.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Whether `document` has one of the tracked content types.
    pub fn is_tracked(&self, document: &DocumentId) -> bool {
        document
            .extension()
            .is_some_and(|ext| self.extensions.iter().any(|tracked| *tracked == ext))
    }

    /// Replace the markers of `document` with those of `elements`.
    ///
    /// Elements belonging to other documents are ignored.
    pub fn render(
        &self,
        host: &mut dyn DecorationHost,
        document: &DocumentId,
        elements: &[Element],
    ) {
        if !self.is_tracked(document) {
            return;
        }

        for kind in ElementKind::ALL {
            let decorations: Vec<Decoration> = elements
                .iter()
                .filter(|element| element.kind == kind && &element.document == document)
                .map(|element| Decoration {
                    span: element.span,
                    hover: format!("{}: {}", kind.label(), element.name),
                })
                .collect();
            tracing::trace!(%document, %kind, count = decorations.len(), "painting decorations");
            host.set_decorations(document, kind, decorations);
        }
    }
}

/// In-memory decoration host backing the terminal gutter.
#[derive(Debug, Default, Clone)]
pub struct GutterMarkers {
    painted: HashMap<(DocumentId, ElementKind), Vec<Decoration>>,
}

impl GutterMarkers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markers(&self, document: &DocumentId, kind: ElementKind) -> &[Decoration] {
        self.painted
            .get(&(document.clone(), kind))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Kinds marked per zero-based line; a line carrying both kinds lists both.
    pub fn line_kinds(&self, document: &DocumentId) -> BTreeMap<usize, Vec<ElementKind>> {
        let mut lines: BTreeMap<usize, Vec<ElementKind>> = BTreeMap::new();
        for kind in ElementKind::ALL {
            for decoration in self.markers(document, kind) {
                let kinds = lines.entry(decoration.span.start.line).or_default();
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
        }
        lines
    }

    /// Drop every marker of `document`.
    pub fn forget(&mut self, document: &DocumentId) {
        self.painted.retain(|(painted, _), _| painted != document);
    }
}

impl DecorationHost for GutterMarkers {
    fn set_decorations(
        &mut self,
        document: &DocumentId,
        kind: ElementKind,
        decorations: Vec<Decoration>,
    ) {
        self.painted.insert((document.clone(), kind), decorations);
    }
}

/// Gutter glyph for a set of kinds on one line.
pub fn gutter_glyph(kinds: &[ElementKind]) -> &'static str {
    match (
        kinds.contains(&ElementKind::DataPack),
        kinds.contains(&ElementKind::Function),
    ) {
        (true, true) => "◆",
        (true, false) => "▣",
        (false, true) => "ƒ",
        (false, false) => " ",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::model::Position;

    #[derive(Default)]
    struct RecordingHost {
        calls: Vec<(DocumentId, ElementKind, Vec<Decoration>)>,
    }

    impl DecorationHost for RecordingHost {
        fn set_decorations(
            &mut self,
            document: &DocumentId,
            kind: ElementKind,
            decorations: Vec<Decoration>,
        ) {
            self.calls.push((document.clone(), kind, decorations));
        }
    }

    fn element(name: &str, kind: ElementKind, doc: &str, line: usize) -> Element {
        Element::new(
            name,
            kind,
            Span::new(Position::new(line, 2), Position::new(line, 20)),
            DocumentId::new(doc),
        )
    }

    #[test]
    fn paints_one_call_per_kind() {
        let renderer = DecorationRenderer::new(["kt"]);
        let doc = DocumentId::new("/ws/Main.kt");
        let elements = vec![
            element("pack", ElementKind::DataPack, "/ws/Main.kt", 1),
            element("load", ElementKind::Function, "/ws/Main.kt", 3),
            element("tick", ElementKind::Function, "/ws/Main.kt", 7),
        ];

        let mut host = RecordingHost::default();
        renderer.render(&mut host, &doc, &elements);

        assert_eq!(host.calls.len(), 2);
        let (_, kind, packs) = &host.calls[0];
        assert_eq!(*kind, ElementKind::DataPack);
        assert_eq!(packs[0].hover, "Datapack: pack");
        let (_, kind, functions) = &host.calls[1];
        assert_eq!(*kind, ElementKind::Function);
        assert_eq!(functions.len(), 2);
        assert_eq!(functions[1].hover, "Function: tick");
    }

    #[test]
    fn empty_kinds_still_clear_previous_markers() {
        let renderer = DecorationRenderer::new([".KT"]);
        let doc = DocumentId::new("/ws/Main.kt");
        let mut gutter = GutterMarkers::new();

        renderer.render(
            &mut gutter,
            &doc,
            &[element("pack", ElementKind::DataPack, "/ws/Main.kt", 1)],
        );
        assert_eq!(gutter.markers(&doc, ElementKind::DataPack).len(), 1);

        renderer.render(&mut gutter, &doc, &[]);
        assert!(gutter.markers(&doc, ElementKind::DataPack).is_empty());
        assert!(gutter.markers(&doc, ElementKind::Function).is_empty());
    }

    #[test]
    fn untracked_documents_are_left_alone() {
        let renderer = DecorationRenderer::new(["kt", "kts"]);
        let mut host = RecordingHost::default();
        renderer.render(
            &mut host,
            &DocumentId::new("/ws/notes.md"),
            &[element("pack", ElementKind::DataPack, "/ws/notes.md", 1)],
        );
        assert!(host.calls.is_empty());
        assert!(renderer.is_tracked(&DocumentId::new("/ws/build.gradle.kts")));
    }

    #[test]
    fn line_kinds_merge_both_styles() {
        let renderer = DecorationRenderer::new(["kt"]);
        let doc = DocumentId::new("/ws/Main.kt");
        let mut gutter = GutterMarkers::new();
        renderer.render(
            &mut gutter,
            &doc,
            &[
                element("pack", ElementKind::DataPack, "/ws/Main.kt", 4),
                element("fn", ElementKind::Function, "/ws/Main.kt", 4),
                element("other", ElementKind::Function, "/ws/Main.kt", 9),
            ],
        );

        let lines = gutter.line_kinds(&doc);
        assert_eq!(gutter_glyph(&lines[&4]), "◆");
        assert_eq!(gutter_glyph(&lines[&9]), "ƒ");
        assert!(!lines.contains_key(&0));

        gutter.forget(&doc);
        assert!(gutter.line_kinds(&doc).is_empty());
    }
}
