//! Workspace discovery of tracked source files.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::{DirEntry, WalkBuilder, WalkState};

use crate::infra::config::Config;

const KORE_IGNORE: &str = ".koreignore";

/// A tracked source file discovered under the workspace root.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub display_path: String,
    pub skipped: Option<SkipReason>,
}

/// Reason for not indexing a discovered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    LargeFile,
    BinaryFile,
}

/// Result of scanning a workspace root.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub files: Vec<SourceFile>,
}

impl ScanResult {
    /// Files that should be read and indexed.
    pub fn indexable(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.iter().filter(|file| file.skipped.is_none())
    }
}

/// Configuration inputs for the scanner.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub root: PathBuf,
    pub max_file_size: u64,
    pub config: Config,
}

impl ScannerConfig {
    pub fn from_root(root: PathBuf, config: Config) -> Self {
        Self {
            root,
            max_file_size: config.scan.max_file_size(),
            config,
        }
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    fn is_tracked(&self, path: &Path) -> bool {
        let extensions = self.config.scan.extensions();
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                extensions
                    .iter()
                    .any(|tracked| tracked.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
    }
}

/// Walks a workspace respecting ignore rules and collects tracked files.
#[derive(Debug, Default)]
pub struct Scanner;

impl Scanner {
    pub fn new() -> Self {
        Self
    }

    pub fn scan(&self, cfg: &ScannerConfig) -> Result<ScanResult> {
        let rules = IgnoreRules::new(&cfg.root, &cfg.config)?;
        let mut builder = WalkBuilder::new(&cfg.root);
        builder
            .git_ignore(true)
            .require_git(false)
            .hidden(!cfg.config.scan.show_hidden());

        let root = cfg.root.clone();
        builder.filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            let rel = entry.path().strip_prefix(&root).unwrap_or(entry.path());
            !rules.matches_globs(rel)
        });

        let files = Mutex::new(Vec::new());
        let cfg_ref = Arc::new(cfg.clone());

        builder.build_parallel().run(|| {
            let files = &files;
            let cfg = cfg_ref.clone();
            Box::new(move |result| match result {
                Ok(entry) => {
                    if let Some(file) = process_entry(&entry, &cfg)
                        && let Ok(mut guard) = files.lock()
                    {
                        guard.push(file);
                    }
                    WalkState::Continue
                }
                Err(err) => {
                    tracing::warn!(error = %err, "scanner error");
                    WalkState::Continue
                }
            })
        });

        let mut files = files.into_inner().unwrap_or_default();
        files.sort_by(|a, b| a.display_path.cmp(&b.display_path));

        tracing::debug!(root = %cfg.root.display(), files = files.len(), "workspace scanned");
        Ok(ScanResult { files })
    }
}

fn process_entry(entry: &DirEntry, cfg: &ScannerConfig) -> Option<SourceFile> {
    let path = entry.path();
    if path == cfg.root || !cfg.is_tracked(path) {
        return None;
    }

    let metadata = entry.metadata().ok()?;
    if !metadata.is_file() {
        return None;
    }
    let size = metadata.len();

    let skipped = if size > cfg.max_file_size {
        Some(SkipReason::LargeFile)
    } else if is_probably_binary(path) {
        Some(SkipReason::BinaryFile)
    } else {
        None
    };

    Some(SourceFile {
        path: path.to_path_buf(),
        display_path: to_display_path(&cfg.root, path),
        skipped,
    })
}

fn to_display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn is_probably_binary(path: &Path) -> bool {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(_) => return false,
    };
    let mut buf = [0u8; 1024];
    match file.read(&mut buf) {
        Ok(0) => false,
        Ok(n) => buf[..n].contains(&0),
        Err(_) => false,
    }
}

/// Exclusion rules of one workspace root, usable outside a directory walk.
///
/// Combines `[ignore] paths/globs`, `.koreignore`, the root `.gitignore`
/// and, unless `show_hidden` is set, dot-prefixed path components.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    root: PathBuf,
    globs: GlobSet,
    gitignore: Gitignore,
    show_hidden: bool,
}

impl IgnoreRules {
    pub fn new(root: &Path, config: &Config) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();

        for pattern in &config.ignore.paths {
            for expanded in expand_dir_pattern(pattern) {
                let glob = Glob::new(&expanded).context("invalid ignore path pattern")?;
                builder.add(glob);
            }
        }

        for glob in &config.ignore.globs {
            let glob = Glob::new(glob).context("invalid ignore glob")?;
            builder.add(glob);
        }

        for pattern in load_koreignore(root)? {
            for expanded in expand_dir_pattern(&pattern) {
                let glob = Glob::new(&expanded).context("invalid .koreignore pattern")?;
                builder.add(glob);
            }
        }

        let globs = builder.build().context("failed to build ignore matcher")?;

        let mut gitignore = GitignoreBuilder::new(root);
        let gitignore_path = root.join(".gitignore");
        if gitignore_path.exists()
            && let Some(err) = gitignore.add(&gitignore_path)
        {
            tracing::warn!(error = %err, "ignoring malformed .gitignore entries");
        }
        let gitignore = gitignore.build().context("failed to build .gitignore matcher")?;

        Ok(Self {
            root: root.to_path_buf(),
            globs,
            gitignore,
            show_hidden: config.scan.show_hidden(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` lies below the root and is excluded from indexing.
    ///
    /// Paths outside the root are never excluded.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let Ok(rel) = path.strip_prefix(&self.root) else {
            return false;
        };
        if rel.as_os_str().is_empty() {
            return false;
        }
        if !self.show_hidden
            && rel
                .components()
                .any(|part| part.as_os_str().to_string_lossy().starts_with('.'))
        {
            return true;
        }
        self.matches_globs(rel)
            || self
                .gitignore
                .matched_path_or_any_parents(rel, path.is_dir())
                .is_ignore()
    }

    fn matches_globs(&self, rel: &Path) -> bool {
        self.globs.is_match(rel)
    }
}

fn expand_dir_pattern(raw: &str) -> Vec<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    vec![
        trimmed.to_owned(),
        format!("{trimmed}/**"),
        format!("**/{trimmed}"),
        format!("**/{trimmed}/**"),
    ]
}

fn load_koreignore(root: &Path) -> Result<Vec<String>> {
    let path = root.join(KORE_IGNORE);
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut patterns = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        patterns.push(trimmed.to_owned());
    }
    Ok(patterns)
}
