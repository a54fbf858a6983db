//! Glue between document lifecycle events and the element index.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};

use crate::app::decorations::{DecorationRenderer, GutterMarkers};
use crate::app::patterns;
use crate::app::scan::{IgnoreRules, Scanner, ScannerConfig};
use crate::app::store::ElementStore;
use crate::app::tree::{Activation, TreeItem, TreePresenter};
use crate::domain::errors::DomainError;
use crate::domain::model::{DocumentId, Element};
use crate::infra::config::Config;
use crate::infra::line_index::LineIndex;

/// Lifecycle notifications delivered by a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    Opened(DocumentId),
    Changed(DocumentId),
    Created(DocumentId),
    Deleted(DocumentId),
    /// A directory appeared, either created or renamed into place.
    DirectoryCreated(PathBuf),
    /// A directory, or any untracked path that may have been one, went away.
    DirectoryRemoved(PathBuf),
    ActiveChanged(Option<DocumentId>),
}

/// Totals reported after indexing a workspace root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub files: usize,
    pub skipped: usize,
    pub unreadable: usize,
    pub elements: usize,
}

/// Source location resolved for display after activating a tree leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reveal {
    pub document: DocumentId,
    /// One-based line number.
    pub line: usize,
    pub column: usize,
    pub text: String,
}

/// Owns the element store and everything derived from it.
pub struct Workspace {
    config: Config,
    roots: Vec<PathBuf>,
    ignore: Vec<IgnoreRules>,
    store: ElementStore,
    presenter: TreePresenter,
    renderer: DecorationRenderer,
    gutter: GutterMarkers,
    active: Option<DocumentId>,
    decorations_stale: Rc<Cell<bool>>,
}

impl Workspace {
    pub fn new(config: Config, roots: Vec<PathBuf>) -> Self {
        let mut store = ElementStore::new();
        let presenter = TreePresenter::attach(&mut store, config.view.options())
            .with_workspace_roots(roots.clone());

        let decorations_stale = Rc::new(Cell::new(false));
        let flag = decorations_stale.clone();
        store.subscribe(move || flag.set(true));

        Self {
            renderer: DecorationRenderer::new(config.scan.extensions()),
            config,
            roots,
            ignore: Vec::new(),
            store,
            presenter,
            gutter: GutterMarkers::new(),
            active: None,
            decorations_stale,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &ElementStore {
        &self.store
    }

    pub fn presenter(&self) -> &TreePresenter {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut TreePresenter {
        &mut self.presenter
    }

    pub fn gutter(&self) -> &GutterMarkers {
        &self.gutter
    }

    pub fn active(&self) -> Option<&DocumentId> {
        self.active.as_ref()
    }

    pub fn is_tracked(&self, document: &DocumentId) -> bool {
        self.renderer.is_tracked(document)
    }

    /// Materialize the tree for the current view options.
    pub fn tree(&self) -> Vec<TreeItem> {
        self.presenter.build(&self.store)
    }

    /// Replace everything known about `document` with the declarations in `text`.
    ///
    /// Returns the number of elements now attributed to the document. Untracked
    /// content types are ignored.
    pub fn index_text(&mut self, document: &DocumentId, text: &str) -> usize {
        if !self.renderer.is_tracked(document) {
            tracing::trace!(%document, "skipping untracked document");
            return 0;
        }

        self.store.remove_matching(document);

        let lines = LineIndex::new(text);
        let occurrences = patterns::scan(text);
        let count = occurrences.len();
        for occurrence in occurrences {
            self.store.add(Element::new(
                occurrence.name,
                occurrence.kind,
                lines.span(occurrence.range),
                document.clone(),
            ));
        }

        tracing::debug!(%document, elements = count, "document indexed");
        self.sync_decorations();
        count
    }

    /// Discover and index every tracked file below `root`.
    ///
    /// The root's ignore rules are kept so later lifecycle events for excluded
    /// paths are dropped as well.
    pub fn index_root(&mut self, root: &Path) -> Result<IndexSummary> {
        let rules = IgnoreRules::new(root, &self.config)
            .with_context(|| format!("failed to load ignore rules for {}", root.display()))?;
        self.ignore.retain(|existing| existing.root() != root);
        self.ignore.push(rules);

        let summary = self.index_below(root, root)?;
        tracing::info!(
            root = %root.display(),
            files = summary.files,
            skipped = summary.skipped,
            elements = summary.elements,
            "workspace indexed"
        );
        Ok(summary)
    }

    /// Index the tracked files of a directory that appeared after startup.
    pub fn index_directory(&mut self, dir: &Path) -> Result<IndexSummary> {
        let root = self
            .roots
            .iter()
            .filter(|root| dir.starts_with(root))
            .max_by_key(|root| root.components().count())
            .cloned()
            .unwrap_or_else(|| dir.to_path_buf());
        let summary = self.index_below(&root, dir)?;
        tracing::debug!(dir = %dir.display(), elements = summary.elements, "directory indexed");
        Ok(summary)
    }

    /// Whether `document` falls under the ignore rules of an indexed root.
    pub fn is_excluded(&self, document: &DocumentId) -> bool {
        self.ignore
            .iter()
            .any(|rules| rules.is_ignored(document.path()))
    }

    fn index_below(&mut self, root: &Path, dir: &Path) -> Result<IndexSummary> {
        let cfg = ScannerConfig::from_root(root.to_path_buf(), self.config.clone());
        let scan = Scanner::new()
            .scan(&cfg)
            .with_context(|| format!("failed to scan workspace {}", root.display()))?;

        let files: Vec<_> = scan
            .files
            .iter()
            .filter(|file| file.path.starts_with(dir))
            .collect();
        let mut summary = IndexSummary::default();

        for file in files {
            if file.skipped.is_some() {
                summary.skipped += 1;
                continue;
            }
            let document = DocumentId::new(&file.path);
            match read_document(&document) {
                Ok(text) => {
                    summary.files += 1;
                    summary.elements += self.index_text(&document, &text);
                }
                Err(err) => {
                    summary.unreadable += 1;
                    tracing::warn!(error = %err, "skipping unreadable document");
                }
            }
        }
        Ok(summary)
    }

    fn forget_document(&mut self, document: &DocumentId) {
        self.store.remove_matching(document);
        self.gutter.forget(document);
        if self.active.as_ref() == Some(document) {
            self.active = None;
        }
    }

    /// Apply a lifecycle event.
    pub fn handle(&mut self, event: DocumentEvent) {
        tracing::debug!(?event, "document event");
        match event {
            DocumentEvent::Opened(document)
            | DocumentEvent::Changed(document)
            | DocumentEvent::Created(document) => {
                if self.is_excluded(&document) {
                    tracing::trace!(%document, "skipping ignored document");
                } else if let Err(err) = self.rescan(&document) {
                    tracing::warn!(error = %err, "keeping previous elements");
                }
            }
            DocumentEvent::Deleted(document) => self.forget_document(&document),
            DocumentEvent::DirectoryCreated(dir) => {
                if let Err(err) = self.index_directory(&dir) {
                    tracing::warn!(error = %err, "failed to index new directory");
                }
            }
            DocumentEvent::DirectoryRemoved(dir) => {
                for document in self.store.documents() {
                    if document.path().starts_with(&dir) {
                        self.forget_document(&document);
                    }
                }
            }
            DocumentEvent::ActiveChanged(document) => self.set_active(document),
        }
        self.sync_decorations();
    }

    /// Switch the active document and repaint its markers.
    pub fn set_active(&mut self, document: Option<DocumentId>) {
        self.active = document;
        self.decorations_stale.set(true);
        self.sync_decorations();
    }

    /// Rescan the active document from disk.
    pub fn refresh_active(&mut self) -> Result<(), DomainError> {
        match self.active.clone() {
            Some(document) => self.rescan(&document).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Resolve an activation to the source line it points at.
    pub fn reveal(&self, activation: &Activation) -> Result<Reveal> {
        let text = read_document(&activation.document)?;
        let lines = LineIndex::new(&text);
        let start = activation.span.start;
        Ok(Reveal {
            document: activation.document.clone(),
            line: start.line + 1,
            column: start.column,
            text: lines.line(start.line).unwrap_or_default().to_owned(),
        })
    }

    fn rescan(&mut self, document: &DocumentId) -> Result<usize, DomainError> {
        if !self.renderer.is_tracked(document) {
            return Ok(0);
        }
        let text = read_document(document)?;
        Ok(self.index_text(document, &text))
    }

    fn sync_decorations(&mut self) {
        if !self.decorations_stale.replace(false) {
            return;
        }
        if let Some(active) = &self.active {
            let elements = self.store.list_by_document(active);
            self.renderer.render(&mut self.gutter, active, &elements);
        }
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("elements", &self.store.len())
            .field("active", &self.active)
            .field("options", &self.presenter.options())
            .finish()
    }
}

fn read_document(document: &DocumentId) -> Result<String, DomainError> {
    fs::read_to_string(document.path()).map_err(|source| DomainError::UnreadableDocument {
        path: document.path().to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::model::ElementKind;

    fn workspace(root: &Path) -> Workspace {
        Workspace::new(Config::default(), vec![root.to_path_buf()])
    }

    #[test]
    fn rescan_replaces_previous_elements() {
        let mut ws = workspace(Path::new("/ws"));
        let doc = DocumentId::new("/ws/Main.kt");

        assert_eq!(ws.index_text(&doc, "dataPack(\"a\") {}\nfunction(\"f\") {}"), 2);
        assert_eq!(ws.index_text(&doc, "dataPack(\"b\") {}"), 1);

        let names: Vec<_> = ws.store().list().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["b"]);
    }

    #[test]
    fn rescan_leaves_other_documents_untouched() {
        let mut ws = workspace(Path::new("/ws"));
        let first = DocumentId::new("/ws/A.kt");
        let second = DocumentId::new("/ws/B.kt");

        ws.index_text(&first, "function('one') {}");
        ws.index_text(&second, "function('two') {}");
        ws.index_text(&first, "");

        assert!(ws.store().list_by_document(&first).is_empty());
        assert_eq!(ws.store().list_by_document(&second).len(), 1);
    }

    #[test]
    fn spans_are_line_and_column_positions() {
        let mut ws = workspace(Path::new("/ws"));
        let doc = DocumentId::new("/ws/Main.kt");
        ws.index_text(&doc, "package demo\n\n  function(\"load\") {\n}");

        let element = ws.store().find_by_name("load").expect("indexed");
        assert_eq!(element.span.start.line, 2);
        assert_eq!(element.span.start.column, 2);
        assert_eq!(element.span.end.line, 2);
    }

    #[test]
    fn untracked_documents_are_not_indexed() {
        let mut ws = workspace(Path::new("/ws"));
        assert_eq!(
            ws.index_text(&DocumentId::new("/ws/notes.txt"), "dataPack('x') {}"),
            0
        );
        assert!(ws.store().is_empty());
    }

    #[test]
    fn active_document_gets_decorations() {
        let mut ws = workspace(Path::new("/ws"));
        let doc = DocumentId::new("/ws/Main.kt");
        let other = DocumentId::new("/ws/Other.kt");

        ws.set_active(Some(doc.clone()));
        ws.index_text(&doc, "dataPack('p') {}\nfunction('f') {}");
        ws.index_text(&other, "function('g') {}");

        assert_eq!(ws.gutter().markers(&doc, ElementKind::DataPack).len(), 1);
        assert_eq!(ws.gutter().markers(&doc, ElementKind::Function).len(), 1);
        assert!(ws.gutter().markers(&other, ElementKind::Function).is_empty());

        ws.index_text(&doc, "");
        assert!(ws.gutter().markers(&doc, ElementKind::DataPack).is_empty());
    }

    #[test]
    fn lifecycle_events_follow_disk() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("Pack.kt");
        let doc = DocumentId::new(&path);
        let mut ws = workspace(temp.path());

        fs::write(&path, "dataPack('a/b') {}")?;
        ws.handle(DocumentEvent::Created(doc.clone()));
        ws.handle(DocumentEvent::ActiveChanged(Some(doc.clone())));
        assert_eq!(ws.store().len(), 1);
        assert_eq!(ws.gutter().markers(&doc, ElementKind::DataPack).len(), 1);

        fs::write(&path, "dataPack('a/b') {}\nfunction('c') {}")?;
        ws.handle(DocumentEvent::Changed(doc.clone()));
        assert_eq!(ws.store().len(), 2);

        fs::remove_file(&path)?;
        ws.handle(DocumentEvent::Changed(doc.clone()));
        assert_eq!(ws.store().len(), 2, "unreadable documents keep their elements");

        ws.handle(DocumentEvent::Deleted(doc.clone()));
        assert!(ws.store().is_empty());
        assert!(ws.active().is_none());
        assert!(ws.gutter().line_kinds(&doc).is_empty());
        Ok(())
    }

    #[test]
    fn refresh_active_rereads_disk() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("Main.kt");
        let doc = DocumentId::new(&path);
        let mut ws = workspace(temp.path());

        fs::write(&path, "function('old') {}")?;
        ws.handle(DocumentEvent::Opened(doc.clone()));
        ws.set_active(Some(doc));
        fs::write(&path, "function('new') {}")?;
        ws.refresh_active()?;

        assert!(ws.store().find_by_name("old").is_none());
        assert!(ws.store().find_by_name("new").is_some());
        Ok(())
    }

    #[test]
    fn index_root_and_reveal() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        fs::create_dir_all(root.join("src"))?;
        fs::write(
            root.join("src/Pack.kt"),
            "val x = 1\n    dataPack(\"core/items\") {\n        function(\"give\") {}\n    }\n",
        )?;
        fs::write(root.join("src/Other.kt"), "function(\"tick\") {}")?;
        fs::write(root.join("notes.md"), "dataPack(\"ignored\") {}")?;

        let mut ws = workspace(root);
        let summary = ws.index_root(root)?;
        assert_eq!(summary.files, 2);
        assert_eq!(summary.elements, 3);
        assert!(ws.store().find_by_name("ignored").is_none());

        let tree = ws.tree();
        let pack = &tree[0].children[0].children[0].node;
        assert_eq!(pack.label(), "items");

        let reveal = ws.reveal(&pack.activation().expect("leaf"))?;
        assert_eq!(reveal.line, 2);
        assert_eq!(reveal.column, 4);
        assert_eq!(reveal.text.trim(), "dataPack(\"core/items\") {");
        Ok(())
    }

    #[test]
    fn presenter_is_stale_after_events() {
        let mut ws = workspace(Path::new("/ws"));
        assert!(ws.presenter().take_stale());

        ws.index_text(&DocumentId::new("/ws/A.kt"), "function('x') {}");
        assert!(ws.presenter().take_stale());

        ws.presenter_mut().set_group_by_file(true);
        assert!(ws.presenter().take_stale());
        assert_eq!(ws.tree()[0].node.label(), "A.kt");
    }

    #[test]
    fn ignored_paths_stay_out_after_startup() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        fs::create_dir_all(root.join("build/gen"))?;
        fs::create_dir_all(root.join("src"))?;
        let generated = root.join("build/gen/Gen.kt");
        fs::write(&generated, "function(\"generated\") {}")?;

        let mut ws = workspace(root);
        assert_eq!(ws.index_root(root)?.elements, 0);

        fs::write(&generated, "function(\"generated\") {}\nfunction(\"more\") {}")?;
        ws.handle(DocumentEvent::Changed(DocumentId::new(&generated)));
        assert!(ws.store().is_empty());

        let source = root.join("src/Main.kt");
        fs::write(&source, "function(\"main\") {}")?;
        ws.handle(DocumentEvent::Created(DocumentId::new(&source)));
        assert!(ws.store().find_by_name("main").is_some());
        Ok(())
    }

    #[test]
    fn directory_rename_moves_elements() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        fs::create_dir_all(root.join("src/nested"))?;
        fs::write(root.join("src/A.kt"), "dataPack(\"a\") {}")?;
        fs::write(root.join("src/nested/B.kt"), "function(\"b\") {}")?;
        fs::write(root.join("Top.kt"), "function(\"top\") {}")?;

        let mut ws = workspace(root);
        ws.index_root(root)?;
        ws.set_active(Some(DocumentId::new(root.join("src/A.kt"))));
        assert_eq!(ws.store().len(), 3);

        fs::rename(root.join("src"), root.join("moved"))?;
        ws.handle(DocumentEvent::DirectoryRemoved(root.join("src")));
        assert_eq!(ws.store().len(), 1);
        assert!(ws.active().is_none());

        ws.handle(DocumentEvent::DirectoryCreated(root.join("moved")));
        let moved: Vec<_> = ws
            .store()
            .documents()
            .into_iter()
            .filter(|doc| doc.path().starts_with(root.join("moved")))
            .collect();
        assert_eq!(moved.len(), 2);
        assert_eq!(ws.store().len(), 3);
        Ok(())
    }
}
