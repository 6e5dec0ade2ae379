use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use a3s_reply::cli::serve::ServeOverrides;
use a3s_reply::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "a3s_reply=debug,tower_http=debug"
    } else {
        "a3s_reply=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve {
            port,
            data_dir,
            pairing_timeout,
        } => {
            a3s_reply::cli::serve::execute(ServeOverrides {
                port,
                data_dir,
                pairing_timeout,
            })
            .await?;
        }
        Commands::Config { data_dir } => {
            a3s_reply::cli::config::execute(data_dir.as_deref())?;
        }
        Commands::Rules => {
            a3s_reply::cli::rules::execute();
        }
    }

    Ok(())
}
