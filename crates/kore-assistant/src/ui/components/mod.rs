//! Collection of reusable TUI components.

pub mod element_tree;
pub mod preview;
