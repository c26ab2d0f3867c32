//! Agent bootstrap configuration.
//!
//! A small TOML file tells the agent which metadata sources to try, in what
//! order, and where each source's documents live. Every section is optional;
//! an absent file yields a config that probes the default locations.

use std::path::{Path, PathBuf};

use facet::Facet;

use crate::error::KeelError;
use crate::paths;

/// Known source names accepted in `agent.sources`.
pub const SOURCE_CONFIG_DRIVE: &str = "config-drive";
pub const SOURCE_FILE: &str = "file";

#[derive(Debug, Clone, Facet)]
#[facet(default)]
pub struct AgentSection {
    #[facet(default = "/var/lib/keel")]
    pub base_dir: String,
    /// Priority order; earlier sources are authoritative.
    #[facet(default)]
    pub sources: Vec<String>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            base_dir: paths::DEFAULT_BASE_DIR.into(),
            sources: Vec::new(),
        }
    }
}

impl AgentSection {
    /// Configured order, or the built-in default when none is given.
    pub fn source_order(&self) -> Vec<String> {
        if self.sources.is_empty() {
            vec![SOURCE_CONFIG_DRIVE.to_string(), SOURCE_FILE.to_string()]
        } else {
            self.sources.clone()
        }
    }
}

#[derive(Debug, Clone, Facet)]
#[facet(default)]
pub struct ConfigDriveSection {
    /// Candidate mount points, probed in order. May legitimately be empty —
    /// that makes the source unavailable, it is not a config error.
    #[facet(default)]
    pub disk_paths: Vec<String>,
    #[facet(default = "meta_data.json")]
    pub metadata_file: String,
    #[facet(default = "user_data")]
    pub userdata_file: String,
}

impl Default for ConfigDriveSection {
    fn default() -> Self {
        Self {
            disk_paths: paths::default_disk_paths(),
            metadata_file: "meta_data.json".into(),
            userdata_file: "user_data".into(),
        }
    }
}

#[derive(Debug, Clone, Facet)]
#[facet(default)]
pub struct FileSection {
    #[facet(default = "/var/lib/keel/instance-metadata.json")]
    pub metadata_path: String,
    #[facet(default = "/var/lib/keel/user-data.json")]
    pub userdata_path: String,
    #[facet(default = "/var/lib/keel/settings.json")]
    pub settings_path: String,
}

impl Default for FileSection {
    fn default() -> Self {
        Self {
            metadata_path: "/var/lib/keel/instance-metadata.json".into(),
            userdata_path: "/var/lib/keel/user-data.json".into(),
            settings_path: "/var/lib/keel/settings.json".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct Config {
    #[facet(default)]
    pub agent: AgentSection,
    #[facet(default)]
    pub config_drive: ConfigDriveSection,
    #[facet(default)]
    pub file: FileSection,
}

impl Config {
    pub fn base_dir(&self) -> PathBuf {
        PathBuf::from(&self.agent.base_dir)
    }
}

// ── validation ────────────────────────────────────────────

fn validate_config(config: &Config) -> Result<(), KeelError> {
    for source in &config.agent.sources {
        if source != SOURCE_CONFIG_DRIVE && source != SOURCE_FILE {
            return Err(KeelError::Validation {
                message: format!("unknown metadata source '{source}' in agent.sources"),
            });
        }
    }

    if config.config_drive.metadata_file.is_empty()
        || config.config_drive.userdata_file.is_empty()
    {
        return Err(KeelError::Validation {
            message: "config_drive file names must not be empty".into(),
        });
    }

    for (label, value) in [
        ("file.metadata_path", &config.file.metadata_path),
        ("file.userdata_path", &config.file.userdata_path),
        ("file.settings_path", &config.file.settings_path),
    ] {
        if value.is_empty() {
            return Err(KeelError::Validation {
                message: format!("{label} must not be empty"),
            });
        }
    }

    if config.agent.base_dir.is_empty() {
        return Err(KeelError::Validation {
            message: "agent.base_dir must not be empty".into(),
        });
    }

    Ok(())
}

// ── public API ────────────────────────────────────────────

/// Load and validate the agent config. A missing file is fine — the
/// defaults describe a standard installation.
pub fn load_config(path: &Path) -> Result<Config, KeelError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no agent config, using defaults");
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|source| KeelError::ConfigLoad {
        path: path.display().to_string(),
        source,
    })?;

    let config: Config = facet_toml::from_str(&contents).map_err(|e| KeelError::ConfigParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    validate_config(&config)?;

    Ok(config)
}
