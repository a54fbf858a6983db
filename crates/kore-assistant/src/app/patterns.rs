//! Textual declaration scanner.
//!
//! Matching is deliberately regex based: the scanner recognizes
//! `dataPack("name") {` and `function("name") {` call shapes anywhere in the
//! text without understanding the surrounding language.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::model::ElementKind;

static DATAPACK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"dataPack\s*\(\s*["']([^"']+)["']\s*\)\s*\{"#).expect("valid datapack pattern")
});

static FUNCTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"function\s*\(\s*["']([^"']+)["']\s*\)\s*\{"#).expect("valid function pattern")
});

/// A single pattern match inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub name: String,
    pub kind: ElementKind,
    /// Byte range of the whole construct, from the keyword through the `{`.
    pub range: Range<usize>,
}

fn pattern_for(kind: ElementKind) -> &'static Regex {
    match kind {
        ElementKind::DataPack => &DATAPACK_PATTERN,
        ElementKind::Function => &FUNCTION_PATTERN,
    }
}

/// Scan `text` for declarations.
///
/// All datapack matches come first in text order, followed by all function
/// matches. Every call starts from the beginning of the text.
pub fn scan(text: &str) -> Vec<Occurrence> {
    ElementKind::ALL
        .into_iter()
        .flat_map(|kind| scan_kind(text, kind))
        .collect()
}

/// Scan `text` for a single declaration kind.
pub fn scan_kind(text: &str, kind: ElementKind) -> Vec<Occurrence> {
    pattern_for(kind)
        .captures_iter(text)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let name = captures.get(1)?;
            Some(Occurrence {
                name: name.as_str().to_owned(),
                kind,
                range: whole.range(),
            })
        })
        .collect()
}
