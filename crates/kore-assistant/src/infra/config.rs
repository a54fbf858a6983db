//! Configuration management utilities.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::app::tree::ViewOptions;

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".kore/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default = "View::unset")]
    pub view: View,
    #[serde(default = "Scan::unset")]
    pub scan: Scan,
    #[serde(default)]
    pub ignore: Ignore,
}

/// Initial tree view settings. Both can be toggled at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    #[serde(default)]
    group_by_file: Option<bool>,
    #[serde(default)]
    sort_by_file: Option<bool>,
}

impl View {
    /// A layer that leaves both toggles to lower layers.
    fn unset() -> Self {
        Self {
            group_by_file: None,
            sort_by_file: None,
        }
    }

    fn default_group_by_file() -> bool {
        false
    }

    fn default_sort_by_file() -> bool {
        true
    }

    pub fn group_by_file(&self) -> bool {
        self.group_by_file
            .unwrap_or_else(Self::default_group_by_file)
    }

    pub fn sort_by_file(&self) -> bool {
        self.sort_by_file.unwrap_or_else(Self::default_sort_by_file)
    }

    pub fn options(&self) -> ViewOptions {
        ViewOptions {
            group_by_file: self.group_by_file(),
            sort_by_file: self.sort_by_file(),
        }
    }
}

impl Default for View {
    fn default() -> Self {
        Self {
            group_by_file: Some(Self::default_group_by_file()),
            sort_by_file: Some(Self::default_sort_by_file()),
        }
    }
}

/// Discovery settings. Unset fields fall through to lower layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scan {
    #[serde(default)]
    extensions: Option<Vec<String>>,
    #[serde(default)]
    max_file_size: Option<u64>,
    #[serde(default)]
    show_hidden: Option<bool>,
}

impl Scan {
    fn unset() -> Self {
        Self {
            extensions: None,
            max_file_size: None,
            show_hidden: None,
        }
    }

    fn default_extensions() -> Vec<String> {
        vec!["kt".into(), "kts".into()]
    }

    fn default_max_file_size() -> u64 {
        1024 * 1024
    }

    /// Tracked file extensions, without the leading dot.
    pub fn extensions(&self) -> Vec<String> {
        self.extensions
            .clone()
            .unwrap_or_else(Self::default_extensions)
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
            .unwrap_or_else(Self::default_max_file_size)
    }

    pub fn show_hidden(&self) -> bool {
        self.show_hidden.unwrap_or(false)
    }
}

impl Default for Scan {
    fn default() -> Self {
        Self {
            extensions: Some(Self::default_extensions()),
            max_file_size: Some(Self::default_max_file_size()),
            show_hidden: Some(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ignore {
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub globs: Vec<String>,
}

impl Default for Ignore {
    fn default() -> Self {
        Self {
            paths: vec![
                "target/".into(),
                "build/".into(),
                "out/".into(),
                ".gradle/".into(),
                ".git/".into(),
                "node_modules/".into(),
            ],
            globs: Vec::new(),
        }
    }
}

/// Environment overrides for the view toggles.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    group_by_file: Option<bool>,
    sort_by_file: Option<bool>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            group_by_file: env::var("KORE_GROUP_BY_FILE").ok().and_then(|v| parse_flag(&v)),
            sort_by_file: env::var("KORE_SORT_BY_FILE").ok().and_then(|v| parse_flag(&v)),
        }
    }

    #[cfg(test)]
    fn for_tests(group_by_file: bool, sort_by_file: bool) -> Self {
        Self {
            group_by_file: Some(group_by_file),
            sort_by_file: Some(sort_by_file),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            tracing::warn!(value = other, "ignoring unrecognized boolean override");
            None
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, the workspace config
    /// found from `start`, and env overrides.
    pub fn load_for(start: &Path) -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = Some(workspace_config_path(start));
        Self::load_with_layers(global, workspace, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            view: merge_view(self.view, other.view),
            scan: merge_scan(self.scan, other.scan),
            ignore: merge_ignore(self.ignore, other.ignore),
        }
    }
}

fn merge_view(mut base: View, overlay: View) -> View {
    if let Some(value) = overlay.group_by_file {
        base.group_by_file = Some(value);
    }
    if let Some(value) = overlay.sort_by_file {
        base.sort_by_file = Some(value);
    }
    base
}

fn merge_scan(base: Scan, overlay: Scan) -> Scan {
    Scan {
        extensions: overlay.extensions.or(base.extensions),
        max_file_size: overlay.max_file_size.or(base.max_file_size),
        show_hidden: overlay.show_hidden.or(base.show_hidden),
    }
}

fn merge_ignore(base: Ignore, overlay: Ignore) -> Ignore {
    let mut paths: BTreeSet<String> = base.paths.into_iter().collect();
    paths.extend(overlay.paths);

    let mut globs: BTreeSet<String> = base.globs.into_iter().collect();
    globs.extend(overlay.globs);

    Ignore {
        paths: paths.into_iter().collect(),
        globs: globs.into_iter().collect(),
    }
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("kore-assistant/config.toml"))
}

fn workspace_config_path(start: &Path) -> PathBuf {
    let root = find_repo_root(start).unwrap_or_else(|| start.to_path_buf());
    root.join(DEFAULT_WORKSPACE_CONFIG_PATH)
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(group_by_file) = env.group_by_file {
        config.view.group_by_file = Some(group_by_file);
    }
    if let Some(sort_by_file) = env.sort_by_file {
        config.view.sort_by_file = Some(sort_by_file);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_defaults_when_no_files() {
        let config = Config::load_with_layers(None, None, EnvOverrides::default())
            .expect("load default config");
        assert!(!config.view.group_by_file());
        assert!(config.view.sort_by_file());
        assert_eq!(config.scan.extensions(), vec!["kt", "kts"]);
        assert!(config.ignore.paths.contains(&"build/".into()));
        assert!(config.ignore.globs.is_empty());
    }

    #[test]
    fn merge_global_and_workspace() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(
            &global,
            r#"
[view]
group_by_file = true
[ignore]
paths = ["generated/"]
"#,
        )?;

        let workspace_dir = temp.path().join("repo");
        fs::create_dir_all(workspace_dir.join(".kore"))?;
        fs::create_dir_all(workspace_dir.join(".git"))?;
        fs::write(
            workspace_dir.join(".kore/config.toml"),
            r#"
[view]
sort_by_file = false
[scan]
extensions = ["kt"]
[ignore]
globs = ["*.cache"]
"#,
        )?;

        let config = Config::load_with_layers(
            Some(global),
            Some(workspace_config_path(&workspace_dir.join("src"))),
            EnvOverrides::default(),
        )?;

        assert!(config.view.group_by_file());
        assert!(!config.view.sort_by_file());
        assert_eq!(config.scan.extensions(), vec!["kt"]);
        assert!(config.ignore.paths.contains(&"generated/".into()));
        assert!(config.ignore.paths.contains(&"target/".into()));
        assert!(config.ignore.globs.contains(&"*.cache".into()));

        Ok(())
    }

    #[test]
    fn workspace_layer_without_view_keeps_global_toggles() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("global.toml");
        fs::write(&global, "[view]\nsort_by_file = false\n")?;
        let workspace = temp.path().join("workspace.toml");
        fs::write(&workspace, "[scan]\nshow_hidden = true\n")?;

        let config =
            Config::load_with_layers(Some(global), Some(workspace), EnvOverrides::default())?;
        assert!(!config.view.sort_by_file());
        assert!(config.scan.show_hidden());
        Ok(())
    }

    #[test]
    fn overlay_can_restore_scan_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("global.toml");
        fs::write(
            &global,
            "[scan]\nshow_hidden = true\nextensions = [\"kts\"]\nmax_file_size = 10\n",
        )?;
        let workspace = temp.path().join("workspace.toml");
        fs::write(
            &workspace,
            r#"
[scan]
show_hidden = false
extensions = ["kt", "kts"]
max_file_size = 1048576
"#,
        )?;

        let config =
            Config::load_with_layers(Some(global), Some(workspace), EnvOverrides::default())?;
        assert!(!config.scan.show_hidden());
        assert_eq!(config.scan.extensions(), vec!["kt", "kts"]);
        assert_eq!(config.scan.max_file_size(), 1024 * 1024);
        Ok(())
    }

    #[test]
    fn layer_without_scan_keeps_lower_values() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("global.toml");
        fs::write(&global, "[scan]\nmax_file_size = 2048\n")?;
        let workspace = temp.path().join("workspace.toml");
        fs::write(&workspace, "[view]\ngroup_by_file = true\n")?;

        let config =
            Config::load_with_layers(Some(global), Some(workspace), EnvOverrides::default())?;
        assert_eq!(config.scan.max_file_size(), 2048);
        assert_eq!(config.scan.extensions(), vec!["kt", "kts"]);
        Ok(())
    }

    #[test]
    fn env_overrides_take_precedence() -> Result<()> {
        let overrides = EnvOverrides::for_tests(true, false);
        let config = Config::load_with_layers(None, None, overrides)?;
        assert_eq!(
            config.view.options(),
            ViewOptions {
                group_by_file: true,
                sort_by_file: false
            }
        );
        Ok(())
    }

    #[test]
    fn parses_flag_spellings() {
        assert_eq!(parse_flag("ON"), Some(true));
        assert_eq!(parse_flag(" 0 "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn invalid_config_returns_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("broken.toml");
        fs::write(&file, "this is not toml")?;
        let result = Config::from_file(&file);
        assert!(result.is_err());
        Ok(())
    }
}
