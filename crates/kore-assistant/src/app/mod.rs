//! Application layer: scanning, indexing, and presenting declarations.

pub mod decorations;
pub mod patterns;
pub mod scan;
pub mod store;
pub mod tree;
pub mod workspace;
