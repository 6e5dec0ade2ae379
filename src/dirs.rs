use std::path::{Path, PathBuf};

/// Default application data directory (container layout).
pub const DEFAULT_HOME: &str = "/app/data";

/// File name of the persisted device identity inside the data directory.
pub const SESSION_FILE: &str = "session.json";

/// File name of the optional TOML config inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Returns the base directory for bot data.
///
/// Uses `$A3S_REPLY_HOME` if set and non-empty, otherwise `/app/data`.
pub fn reply_home() -> PathBuf {
    match std::env::var("A3S_REPLY_HOME") {
        Ok(home) if !home.trim().is_empty() => PathBuf::from(home),
        _ => PathBuf::from(DEFAULT_HOME),
    }
}

/// Returns the path to the user configuration file.
pub fn config_path() -> PathBuf {
    reply_home().join(CONFIG_FILE)
}

/// Create `dir` and any missing parents.
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}
