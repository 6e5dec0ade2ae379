use std::path::PathBuf;
use std::sync::Arc;

use crate::bootstrap;
use crate::config::BotConfig;
use crate::error::Result;
use crate::session::ConsoleProvider;

/// Flags accepted by `serve`, applied on top of the resolved config
#[derive(Debug, Default, Clone)]
pub struct ServeOverrides {
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
    pub pairing_timeout: Option<u64>,
}

impl ServeOverrides {
    pub fn apply(&self, config: &mut BotConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(secs) = self.pairing_timeout {
            config.pairing_timeout_secs = secs;
        }
    }
}

/// Execute the `serve` command: run until SIGINT/SIGTERM.
pub async fn execute(overrides: ServeOverrides) -> Result<()> {
    let mut config = super::config::resolve(overrides.data_dir.as_deref())?;
    overrides.apply(&mut config);

    tracing::info!(
        address = %config.bind_address(),
        data_dir = %config.data_dir.display(),
        "Starting a3s-reply"
    );

    let handle = bootstrap::start_bot(config, Arc::new(ConsoleProvider)).await?;
    bootstrap::shutdown_signal().await;

    tracing::info!("Shutting down...");
    handle.shutdown().await
}
