//! Infrastructure adapters for configuration, text positions, and file watching.

pub mod config;
pub mod line_index;
pub mod watch;
