//! Domain models for discovered declarations and their source locations.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use crate::domain::errors::DomainError;

/// The two declaration forms recognized in source text.
///
/// The derived ordering places [`ElementKind::DataPack`] before
/// [`ElementKind::Function`], which the tree presenter relies on when sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    DataPack,
    Function,
}

impl ElementKind {
    pub const ALL: [ElementKind; 2] = [ElementKind::DataPack, ElementKind::Function];

    /// Stable identifier used on the command line and in JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::DataPack => "datapack",
            ElementKind::Function => "function",
        }
    }

    /// Singular, human readable label ("Datapack", "Function").
    pub fn label(&self) -> &'static str {
        match self {
            ElementKind::DataPack => "Datapack",
            ElementKind::Function => "Function",
        }
    }

    /// Label of the root category holding elements of this kind.
    pub fn category_label(&self) -> &'static str {
        match self {
            ElementKind::DataPack => "Datapacks",
            ElementKind::Function => "Functions",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "datapack" | "datapacks" | "dp" => Ok(ElementKind::DataPack),
            "function" | "functions" | "fn" => Ok(ElementKind::Function),
            other => Err(DomainError::UnknownKind(other.to_string())),
        }
    }
}

/// Opaque, content-independent identity of a source document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DocumentId(PathBuf);

impl DocumentId {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Final path component, used as the short file descriptor in views.
    pub fn file_name(&self) -> String {
        self.0
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.0.display().to_string())
    }

    /// Lowercased extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.0
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Zero-based line and column (in chars) inside a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Location of a full matched construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// One-based line number of the span start, as shown to users.
    pub fn display_line(&self) -> usize {
        self.start.line + 1
    }
}

/// One discovered declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Element {
    pub name: String,
    pub kind: ElementKind,
    pub span: Span,
    pub document: DocumentId,
}

impl Element {
    pub fn new(
        name: impl Into<String>,
        kind: ElementKind,
        span: Span,
        document: DocumentId,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            span,
            document,
        }
    }

    /// Last `/`-delimited segment of the name.
    pub fn display_name(&self) -> &str {
        self.name
            .rsplit_once('/')
            .map_or(self.name.as_str(), |(_, last)| last)
    }

    /// Whether both elements share the (name, kind, document) identity.
    pub fn same_identity(&self, other: &Element) -> bool {
        self.name == other.name && self.kind == other.kind && self.document == other.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(name: &str) -> Element {
        Element::new(
            name,
            ElementKind::DataPack,
            Span::default(),
            DocumentId::new("/work/src/Main.kt"),
        )
    }

    #[test]
    fn display_name_is_last_segment() {
        assert_eq!(element("a/b/c").display_name(), "c");
        assert_eq!(element("plain").display_name(), "plain");
        assert_eq!(element("trailing/").display_name(), "");
    }

    #[test]
    fn kinds_order_datapack_first() {
        assert!(ElementKind::DataPack < ElementKind::Function);
        assert_eq!(ElementKind::ALL[0], ElementKind::DataPack);
    }

    #[test]
    fn parses_kind_names() {
        assert_eq!("DataPack".parse::<ElementKind>().unwrap(), ElementKind::DataPack);
        assert_eq!("functions".parse::<ElementKind>().unwrap(), ElementKind::Function);
        assert!(matches!(
            "class".parse::<ElementKind>(),
            Err(DomainError::UnknownKind(kind)) if kind == "class"
        ));
    }

    #[test]
    fn document_file_name_and_extension() {
        let doc = DocumentId::new("/work/src/Build.KTS");
        assert_eq!(doc.file_name(), "Build.KTS");
        assert_eq!(doc.extension().as_deref(), Some("kts"));
    }

    #[test]
    fn identity_ignores_span() {
        let mut other = element("a/b");
        other.span = Span::new(Position::new(4, 2), Position::new(4, 20));
        assert!(element("a/b").same_identity(&other));
        assert!(!element("a/c").same_identity(&other));
    }
}
