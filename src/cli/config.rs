use std::path::Path;

use crate::config::BotConfig;
use crate::error::Result;

/// Resolve the configuration: `<data_dir>/config.toml` when a data
/// directory is given, else the default home, then `$PORT`.
pub fn resolve(data_dir: Option<&Path>) -> Result<BotConfig> {
    match data_dir {
        Some(dir) => BotConfig::load_in(dir),
        None => BotConfig::load(),
    }
}

/// Execute the `config` command: print the resolved configuration.
pub fn execute(data_dir: Option<&Path>) -> Result<()> {
    let config = resolve(data_dir)?;
    print!("{}", config.to_toml()?);
    Ok(())
}
