//! Command-line surface of the terminal host.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::app::workspace::Workspace;
use crate::domain::model::{DocumentId, ElementKind};
use crate::infra::config::Config;
use crate::ui::app::UiApp;
use crate::ui::text::{render_gutter, render_tree};

#[derive(Debug, Parser)]
#[command(name = "kore-assistant")]
#[command(about = "Browse Kore datapack and function declarations")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Browse declarations interactively (default)
    Ui {
        /// Workspace root (defaults to current directory)
        root: Option<PathBuf>,
    },

    /// Print the declaration tree
    Tree {
        root: Option<PathBuf>,

        /// Group declarations under the file that contains them
        #[arg(long)]
        group_by_file: bool,

        /// Leaf ordering; falls back to the configured default
        #[arg(long, value_enum)]
        sort: Option<SortOrder>,

        /// Emit JSON instead of an indented outline
        #[arg(long)]
        json: bool,
    },

    /// List every declaration
    List {
        root: Option<PathBuf>,

        /// Only list declarations of this kind
        #[arg(long)]
        kind: Option<ElementKind>,

        #[arg(long)]
        json: bool,
    },

    /// Print where a declaration is defined
    Find {
        /// Full declaration name, including any `/` prefix
        name: String,
        root: Option<PathBuf>,
    },

    /// Print a file with gutter markers on declaration lines
    Gutter { file: PathBuf },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SortOrder {
    Name,
    File,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command.unwrap_or(Commands::Ui { root: None }) {
        Commands::Ui { root } => {
            let root = resolve_root(root)?;
            let workspace = open_workspace(&root)?;
            UiApp::new(workspace, root).run()
        }
        Commands::Tree {
            root,
            group_by_file,
            sort,
            json,
        } => {
            let root = resolve_root(root)?;
            let mut workspace = indexed_workspace(&root)?;
            if group_by_file {
                workspace.presenter_mut().set_group_by_file(true);
            }
            if let Some(sort) = sort {
                workspace
                    .presenter_mut()
                    .set_sort_by_file(sort == SortOrder::File);
            }
            let items = workspace.tree();
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if !items.is_empty() {
                println!("{}", render_tree(&items));
            }
            Ok(())
        }
        Commands::List { root, kind, json } => {
            let root = resolve_root(root)?;
            let workspace = indexed_workspace(&root)?;
            let mut elements = match kind {
                Some(kind) => workspace.store().list_by_kind(kind),
                None => workspace.store().list(),
            };
            elements.sort_by(|a, b| {
                (a.kind, a.document.path(), a.span.start)
                    .cmp(&(b.kind, b.document.path(), b.span.start))
            });
            if json {
                println!("{}", serde_json::to_string_pretty(&elements)?);
                return Ok(());
            }
            for element in elements {
                println!(
                    "{}\t{}\t{}:{}",
                    element.kind,
                    element.name,
                    display_path(element.document.path(), &root),
                    element.span.display_line()
                );
            }
            Ok(())
        }
        Commands::Find { name, root } => {
            let root = resolve_root(root)?;
            let workspace = indexed_workspace(&root)?;
            let Some(element) = workspace.store().find_by_name(&name) else {
                bail!("no datapack or function named `{name}`");
            };
            println!(
                "{}:{}:{}\t{}",
                display_path(element.document.path(), &root),
                element.span.display_line(),
                element.span.start.column + 1,
                element.kind.label()
            );
            Ok(())
        }
        Commands::Gutter { file } => {
            let file = fs::canonicalize(&file)
                .with_context(|| format!("failed to resolve {}", file.display()))?;
            let root = file.parent().map(Path::to_path_buf).unwrap_or_default();
            let mut workspace = open_workspace(&root)?;
            let document = DocumentId::new(&file);
            if !workspace.is_tracked(&document) {
                tracing::warn!(%document, "file type is not scanned for declarations");
            }
            let text = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            workspace.index_text(&document, &text);
            workspace.set_active(Some(document.clone()));
            println!("{}", render_gutter(&text, &document, workspace.gutter()));
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "kore-assistant", &mut io::stdout());
            Ok(())
        }
    }
}

fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    let root = match root {
        Some(root) => root,
        None => std::env::current_dir().context("unable to determine working directory")?,
    };
    fs::canonicalize(&root).with_context(|| format!("failed to resolve {}", root.display()))
}

fn open_workspace(root: &Path) -> Result<Workspace> {
    let config = Config::load_for(root)?;
    Ok(Workspace::new(config, vec![root.to_path_buf()]))
}

fn indexed_workspace(root: &Path) -> Result<Workspace> {
    let mut workspace = open_workspace(root)?;
    let summary = workspace.index_root(root)?;
    if summary.unreadable > 0 {
        tracing::warn!(unreadable = summary.unreadable, "some files could not be read");
    }
    Ok(workspace)
}

fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
