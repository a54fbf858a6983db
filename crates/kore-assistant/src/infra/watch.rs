//! File system watcher turning notify events into document events.

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::app::workspace::DocumentEvent;
use crate::domain::model::DocumentId;

/// Watches a workspace root and queues document events for the UI thread.
pub struct WorkspaceWatcher {
    rx: mpsc::Receiver<DocumentEvent>,
    _watcher: RecommendedWatcher,
}

impl WorkspaceWatcher {
    /// Start watching `root` recursively for files with one of `extensions`.
    pub fn new(root: &Path, extensions: &[String]) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let extensions: Vec<String> = extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();

        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    for document_event in translate(&event, &extensions) {
                        if tx.send(document_event).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => tracing::warn!(error = %err, "watch error"),
            })
            .context("failed to create file watcher")?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", root.display()))?;

        Ok(Self {
            rx,
            _watcher: watcher,
        })
    }

    /// Drain all pending events without blocking.
    pub fn drain(&self) -> Vec<DocumentEvent> {
        self.rx.try_iter().collect()
    }
}

fn translate(event: &Event, extensions: &[String]) -> Vec<DocumentEvent> {
    let appeared = |path: &PathBuf| {
        if is_tracked(path, extensions) {
            Some(DocumentEvent::Created(DocumentId::new(path.as_path())))
        } else if path.is_dir() {
            Some(DocumentEvent::DirectoryCreated(path.clone()))
        } else {
            None
        }
    };
    // The path is gone, so an untracked one may have been a directory.
    let vanished = |path: &PathBuf| {
        if is_tracked(path, extensions) {
            DocumentEvent::Deleted(DocumentId::new(path.as_path()))
        } else {
            DocumentEvent::DirectoryRemoved(path.clone())
        }
    };
    let paths = event.paths.iter();

    match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.filter_map(appeared).collect()
        }
        EventKind::Remove(RemoveKind::File) => paths
            .filter(|path| is_tracked(path, extensions))
            .map(vanished)
            .collect(),
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.map(vanished).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut events = Vec::new();
            if let Some(from) = event.paths.first() {
                events.push(vanished(from));
            }
            events.extend(event.paths.get(1).and_then(appeared));
            events
        }
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .filter_map(|path| {
                if path.exists() {
                    appeared(path)
                } else {
                    Some(vanished(path))
                }
            })
            .collect(),
        EventKind::Modify(_) => paths
            .filter(|path| is_tracked(path, extensions))
            .map(|path| DocumentEvent::Changed(DocumentId::new(path.as_path())))
            .collect(),
        _ => Vec::new(),
    }
}

fn is_tracked(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|tracked| tracked.eq_ignore_ascii_case(ext)))
}
