//! Configuration loading and root folder resolution
//!
//! Missing configuration never stops a run: absent TOML files produce a warning and the
//! compiled defaults. An explicitly named config file that cannot be read is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "ROADMAP_ROOT_FOLDER";

/// Environment variable naming the config file
pub const CONFIG_FILE_ENV: &str = "ROADMAP_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "roadmap.db";

/// Compiled fallbacks used when neither CLI, environment nor TOML supply a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
        }
    }
}

/// Logging section of the TOML config
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Tabular surface section: which workbook and tabs the passes use
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub workbook: Option<PathBuf>,
    pub input_tab: String,
    pub output_tab: String,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            workbook: None,
            input_tab: "Scoring_Inputs".to_string(),
            output_tab: "Scoring_Inputs".to_string(),
        }
    }
}

/// Scoring section: effort floor, batching and per-framework default overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Floor substituted for zero or near-zero effort before dividing
    pub min_effort: f64,
    /// Records per commit checkpoint; `None` commits once at the end
    pub batch_size: Option<usize>,
    /// Mirror the active framework's triple after each recomputation
    pub mirror_active: bool,
    /// `framework -> field -> default`, merged over the built-in defaults
    pub defaults: BTreeMap<String, BTreeMap<String, f64>>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_effort: 0.01,
            batch_size: None,
            mirror_active: true,
            defaults: BTreeMap::new(),
        }
    }
}

/// Complete TOML configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub sheet: SheetConfig,
    pub scoring: ScoringConfig,
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TomlConfig =
            toml::from_str(text).map_err(|e| Error::Config(format!("parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Load configuration with graceful degradation
    ///
    /// Priority: explicit path (must exist) → `ROADMAP_CONFIG` → platform config file
    /// if present → compiled defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            return Self::load(Path::new(&path));
        }
        match default_config_file() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                warn!("No config file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(0) = self.scoring.batch_size {
            return Err(Error::Config("scoring.batch_size must be at least 1".to_string()));
        }
        if self.sheet.input_tab.trim().is_empty() || self.sheet.output_tab.trim().is_empty() {
            return Err(Error::Config("sheet tab names must be non-empty".to_string()));
        }
        Ok(())
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. `ROADMAP_ROOT_FOLDER` environment variable
/// 3. TOML `root_folder`
/// 4. OS-dependent compiled default
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, config: &TomlConfig) -> Self {
        Self {
            cli_arg,
            toml_root: config.root_folder.clone(),
        }
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }
        if let Some(path) = &self.toml_root {
            return path.clone();
        }
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Database path inside a resolved root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("roadmap").join("config.toml"))
}

fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("roadmap"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/roadmap"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("roadmap"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/roadmap"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("roadmap"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\roadmap"))
    } else {
        PathBuf::from("./roadmap_data")
    }
}
