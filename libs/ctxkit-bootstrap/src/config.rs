use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::paths::home_dir::resolve_home_dir;

/// Host configuration with the root context, its named children and the
/// ambient sections (home dir, logging).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub host: HostConfig,
    /// Logging configuration (optional, uses defaults if None).
    pub logging: Option<LoggingConfig>,
    /// Root context definition.
    #[serde(default)]
    pub context: ContextConfig,
    /// Directory of `<child>.yaml` files merged into `children` (optional).
    #[serde(default)]
    pub contexts_dir: Option<String>,
    /// Child contexts by name. A child without `parent` hangs off the root.
    #[serde(default)]
    pub children: BTreeMap<String, ContextConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Normalized to an absolute path on load. Empty means the platform default.
    #[serde(default)]
    pub home_dir: String,
}

/// One context level: identity, environment, message catalog and inline
/// resources.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub application_name: String,
    /// Name of another child to nest under. Ignored for the root.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default)]
    pub default_profiles: Vec<String>,
    /// Arbitrary nested values, exposed as dotted property keys.
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
    /// locale → code → template. `root` is the locale-independent catalog.
    #[serde(default)]
    pub messages: BTreeMap<String, BTreeMap<String, String>>,
    /// location → inline text.
    #[serde(default)]
    pub resources: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub autowire: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            id: None,
            display_name: None,
            application_name: String::new(),
            parent: None,
            profiles: Vec::new(),
            default_profiles: Vec::new(),
            properties: BTreeMap::new(),
            messages: BTreeMap::new(),
            resources: BTreeMap::new(),
            autowire: true,
        }
    }
}

/// Logging configuration - maps subsystem names to their logging settings.
/// Key "default" is the catch-all for logs that don't match explicit subsystems.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Section {
    pub console_level: String, // "info", "debug", "error", "off"
    #[serde(default)]
    pub file: String, // "logs/ctxkit.log", empty disables the file sink
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_age_days: Option<u32>,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert(
        "default".to_string(),
        Section {
            console_level: "info".to_string(),
            file: "logs/ctxkit.log".to_string(),
            file_level: "debug".to_string(),
            max_age_days: Some(7),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    );
    logging
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: HostConfig::default(),
            logging: Some(default_logging_config()),
            context: ContextConfig::default(),
            contexts_dir: None,
            children: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Layered loading: defaults → YAML file → `APP__` environment variables.
    /// Normalizes `host.home_dir` into an absolute path and creates it.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        let path = config_path.as_ref();
        if !path.exists() {
            bail!("config file not found: {}", path.display());
        }

        // Optional sections stay None unless YAML/ENV provide them.
        let base = AppConfig {
            logging: None,
            ..AppConfig::default()
        };

        let figment = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(path))
            // APP__CONTEXT__APPLICATION_NAME=demo maps to context.application_name
            .merge(Env::prefixed("APP__").split("__"));

        let mut config: AppConfig = figment
            .extract()
            .context("Failed to extract config from figment")?;

        normalize_home_dir_inplace(&mut config.host).context("Failed to resolve host.home_dir")?;

        if let Some(dir) = config.contexts_dir.clone() {
            merge_context_files(&mut config.children, resolve_relative(&dir, path))?;
        }

        Ok(config)
    }

    /// Load from file, or defaults when no path is given.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => {
                let mut c = Self::default();
                normalize_home_dir_inplace(&mut c.host)
                    .context("Failed to resolve host.home_dir (defaults)")?;
                Ok(c)
            }
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if !args.profiles.is_empty() {
            self.context.profiles = args.profiles.clone();
        }

        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default_section) = logging.get_mut("default") {
            default_section.console_level = match args.verbose {
                0 => default_section.console_level.clone(),
                1 => "debug".to_string(),
                _ => "trace".to_string(),
            };
        }
    }
}

/// Command line arguments relevant to configuration.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub print_config: bool,
    pub verbose: u8,
    /// Replaces the root context's active profiles when non-empty.
    pub profiles: Vec<String>,
}

const DEFAULT_SUBDIR: &str = ".ctxkit";

fn normalize_home_dir_inplace(host: &mut HostConfig) -> Result<()> {
    let opt = if host.home_dir.trim().is_empty() {
        None
    } else {
        Some(host.home_dir.clone())
    };

    let resolved: PathBuf =
        resolve_home_dir(opt, DEFAULT_SUBDIR, true).context("home_dir normalization failed")?;

    host.home_dir = resolved.to_string_lossy().to_string();
    Ok(())
}

/// Relative `contexts_dir` values are taken from the config file's directory.
fn resolve_relative(dir: &str, config_path: &Path) -> PathBuf {
    let p = Path::new(dir);
    if p.is_absolute() {
        return p.to_path_buf();
    }
    config_path
        .parent()
        .map(|base| base.join(p))
        .unwrap_or_else(|| p.to_path_buf())
}

fn merge_context_files(
    children: &mut BTreeMap<String, ContextConfig>,
    dir: impl AsRef<Path>,
) -> Result<()> {
    use std::fs;
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        if ext != "yml" && ext != "yaml" {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let child: ContextConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("Invalid context file {}", path.display()))?;
        children.insert(name.to_string(), child);
    }
    Ok(())
}
