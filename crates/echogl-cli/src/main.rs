//! EchoGL command-line front end
//!
//! Scans the local Steam libraries, enriches them with catalog data and
//! prints or launches the result.
//!
//! Usage:
//!     echogl scan [--no-enrich]
//!     echogl list
//!     echogl cover 440 --kind detail

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use echogl_config::EchoConfig;
use echogl_covers::CoverKind;
use echogl_library::{AppId, GameLibrary};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Optional credentials file in the working directory
const ENV_FILE: &str = ".env";

#[derive(Parser, Debug)]
#[command(name = "echogl", version, about = "Local Steam game library")]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, env = "ECHOGL_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Discover installed games and store them
    Scan {
        /// Skip catalog enrichment after the scan
        #[arg(long)]
        no_enrich: bool,
    },
    /// Rescan, then attach catalog data to games that have none
    Enrich,
    /// List stored games
    List,
    /// Show everything stored for one game
    Show { id: AppId },
    /// Resolve a cover image and print its path
    Cover {
        id: AppId,

        /// Which cover to fetch
        #[arg(long, default_value = "thumbnail")]
        kind: CoverKind,

        /// Ignore the path stored on the record
        #[arg(long)]
        refresh: bool,
    },
    /// Start a game through the Steam client
    Launch { id: AppId },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    debug!("Data directory: {}", config.data_dir().display());

    let (mut library, events) =
        GameLibrary::open(&config).context("Failed to open game library")?;

    let result = commands::run(&mut library, events, cli.command).await;

    library.shutdown().context("Failed to close game library")?;
    result
}

fn load_config(path: Option<&Path>) -> Result<EchoConfig> {
    let mut config = match path {
        Some(path) => EchoConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EchoConfig::load_default().context("Failed to load config")?,
    };

    // process environment wins over .env
    let env_file = Path::new(ENV_FILE);
    if env_file.is_file() {
        config
            .apply_env_file(env_file)
            .with_context(|| format!("Failed to read {}", env_file.display()))?;
    } else {
        debug!("No {} in the working directory", ENV_FILE);
    }
    config.apply_env();

    if config.credentials().is_none() {
        info!("Catalog credentials not set; enrichment is disabled");
    }
    Ok(config)
}

fn setup_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let default_level = if verbose { "debug" } else { "info" };
    let filter = if verbose {
        EnvFilter::new(default_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_cover() {
        let cli = Cli::parse_from(["echogl", "cover", "440", "--kind", "detail", "--refresh"]);
        assert_eq!(
            cli.command,
            Command::Cover {
                id: 440,
                kind: CoverKind::Detail,
                refresh: true,
            }
        );
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::parse_from(["echogl", "scan", "--no-enrich", "-v", "--config", "/tmp/echogl.toml"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/echogl.toml")));
        assert_eq!(cli.command, Command::Scan { no_enrich: true });
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(Cli::try_parse_from(["echogl", "show", "abc"]).is_err());
        assert!(Cli::try_parse_from(["echogl", "cover", "1", "--kind", "banner"]).is_err());
    }
}
