//! # Cloak CLI
//!
//! Drives the lifecycle controller against the in-process devnet.
//!
//! ## Commands
//!
//! - `demo` - Create a request, verify it, and print the resulting view
//! - `sample-config` - Print a sample configuration file

mod demo;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cloak_config::{CloakConfig, global_config};
use tracing::warn;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "cloak")]
#[command(about = "Encrypted request lifecycle tool", long_about = None)]
struct Args {
    /// Config file (defaults to CLOAK_CONFIG, ./cloak.toml, then ~/.cloak/cloak.toml)
    #[arg(long, global = true, env = "CLOAK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run create and verify end to end against a local devnet
    Demo(demo::DemoArgs),

    /// Print a sample configuration file
    SampleConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloak_core=info,cloak_devnet=info".into()),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::SampleConfig => {
            print!("{}", CloakConfig::generate_sample());
            Ok(())
        }
        Command::Demo(demo_args) => {
            if let Some(path) = &args.config {
                let config = CloakConfig::load_from(path)?;
                if CloakConfig::set_global(config).is_err() {
                    warn!("Config already initialized, ignoring {}", path.display());
                }
            }
            demo::run(global_config(), demo_args).await
        }
    }
}
