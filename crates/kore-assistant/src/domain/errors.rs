//! Domain-specific errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("unknown element kind '{0}' (expected 'datapack' or 'function')")]
    UnknownKind(String),
    #[error("failed to read document {path}")]
    UnreadableDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
