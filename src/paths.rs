use std::path::{Path, PathBuf};

/// Default agent config file location.
pub const DEFAULT_CONFIG: &str = "/etc/keel/agent.toml";

/// Default state directory.
pub const DEFAULT_BASE_DIR: &str = "/var/lib/keel";

/// Candidate mount points probed for a config drive, in priority order.
pub fn default_disk_paths() -> Vec<String> {
    vec![
        "/media/config-2".to_string(),
        "/run/keel/config-drive".to_string(),
    ]
}

/// Where `bootstrap` persists the resolved settings for later restarts
/// and downstream subsystems.
pub fn resolved_settings_path(base_dir: &Path) -> PathBuf {
    base_dir.join("resolved-settings.json")
}

/// Boot log directory under the agent state dir.
pub fn log_dir(base_dir: &Path) -> PathBuf {
    base_dir.join("log")
}
