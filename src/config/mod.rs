//! Engine configuration management for `rekindle.toml`.
//!
//! # Sections
//!
//! | Section         | Purpose                                                |
//! |-----------------|--------------------------------------------------------|
//! | `[project]`     | Source root override, output dir, suffixes             |
//! | `[loader]`      | Namespace deny-prefixes delegated to the parent loader |
//! | `[enhancer]`    | Ordered stage registrations (`name = "impl-id"`)       |
//! | `[persistence]` | Store adapter bound by the entity-shape stage          |
//! | `[redefine]`    | External redefinition agent to attach and load         |
//! | `[watch]`       | Watch-mode debounce                                    |
//!
//! `[enhancer]` key order is the pipeline execution order, which is why the
//! toml parser runs with `preserve_order`.

mod error;

pub use error::ConfigError;

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::log;

/// Config file name searched upward from the working directory.
pub const CONFIG_FILE: &str = "rekindle.toml";

// ============================================================================
// Root configuration
// ============================================================================

/// Root configuration structure representing rekindle.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub project: ProjectConfig,

    #[serde(default)]
    pub loader: LoaderConfig,

    /// Ordered stage registrations: `enhancer.<name> = <implementation-id>`.
    #[serde(default)]
    pub enhancer: toml::map::Map<String, toml::Value>,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub redefine: RedefineConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

/// `[project]` section: where sources live and outputs land.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Watched source root. When absent the root is discovered from the
    /// first readable source file's package header (see `project::discover`).
    pub source_root: Option<PathBuf>,
    /// Compiled output directory, relative to the project root.
    pub output_dir: PathBuf,
    /// Source file suffix (without dot).
    pub source_suffix: String,
    /// Compiled file extension (without dot).
    pub compiled_ext: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            source_root: None,
            output_dir: PathBuf::from("build/classes"),
            source_suffix: "cls".to_string(),
            compiled_ext: "cbin".to_string(),
        }
    }
}

/// `[loader]` section: resolution scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Dotted namespace prefixes always delegated to the parent resolver.
    pub deny_prefixes: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            deny_prefixes: vec!["std.".to_string(), "host.".to_string()],
        }
    }
}

/// `[persistence]` section: store adapter for entity-shape synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Identifier of the store adapter entity helpers bind to.
    pub store: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            store: "memstore".to_string(),
        }
    }
}

/// `[redefine]` section: external agent attach.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RedefineConfig {
    /// Redefinition agent library loaded into the attached process. Absent
    /// means in-process redefinition only.
    pub agent: Option<PathBuf>,
    /// Options string handed to the agent on load.
    pub agent_params: String,
}

/// `[watch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Milliseconds of quiet time before a batch of fs events triggers a cycle.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    /// Load configuration from an explicit path, or search upward from the
    /// working directory. A missing file yields the defaults rooted at cwd.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => find_config_file()?,
        };

        let Some(path) = path else {
            let root = std::env::current_dir()
                .map_err(|e| ConfigError::Io(PathBuf::from("."), e))?;
            let mut config = Self::default();
            config.root = root;
            config.validate()?;
            return Ok(config);
        };

        let text =
            fs::read_to_string(&path).map_err(|e| ConfigError::Io(path.clone(), e))?;
        let mut config = Self::parse(&text)?;

        config.config_path = path
            .canonicalize()
            .map_err(|e| ConfigError::Io(path.clone(), e))?;
        config.root = config
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Parse config text, warning on unknown keys instead of failing.
    fn parse(text: &str) -> Result<Self, ConfigError> {
        let de = toml::de::Deserializer::new(text);
        let mut unknown = Vec::new();
        let config: Self = serde_ignored::deserialize(de, |path| {
            unknown.push(path.to_string());
        })?;
        for key in unknown {
            log!("config"; "unknown key `{key}` ignored");
        }
        Ok(config)
    }

    /// Validate field values, not file structure.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.project.source_suffix.is_empty() {
            return Err(ConfigError::Validation(
                "project.source_suffix must not be empty".into(),
            ));
        }
        if self.project.compiled_ext.is_empty() {
            return Err(ConfigError::Validation(
                "project.compiled_ext must not be empty".into(),
            ));
        }
        for (name, value) in &self.enhancer {
            if !value.is_str() {
                return Err(ConfigError::Validation(format!(
                    "enhancer.{name} must be a string implementation id"
                )));
            }
        }
        Ok(())
    }

    /// Absolute output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.project.output_dir)
    }

    /// Ordered `(stage name, implementation id)` registrations.
    pub fn enhancer_registrations(&self) -> Vec<(String, String)> {
        self.enhancer
            .iter()
            .filter_map(|(name, value)| {
                value.as_str().map(|id| (name.clone(), id.to_string()))
            })
            .collect()
    }

    /// Construct a default config rooted at the given directory (tests and
    /// embedded use).
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.root = root.into();
        config
    }
}

/// Search for rekindle.toml upward from the current directory.
fn find_config_file() -> Result<Option<PathBuf>, ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| ConfigError::Io(PathBuf::from("."), e))?;
    let mut dir = Some(cwd.as_path());
    while let Some(d) = dir {
        let candidate = d.join(CONFIG_FILE);
        if candidate.is_file() {
            return Ok(Some(candidate));
        }
        dir = d.parent();
    }
    Ok(None)
}

// ============================================================================
// Tests
// ============================================================================
