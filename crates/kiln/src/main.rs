//! kiln CLI - static site asset pipeline.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use kiln_transforms::AssetClass;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Build static site assets and serve them with live reload")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to kiln.toml config file
    #[arg(short, long, default_value = "kiln.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build once, then rebuild on change and serve with live reload (default)
    Watch {
        /// Port to listen on (defaults to config or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Open the site in a browser
        #[arg(long)]
        open: bool,
    },

    /// Clean the output directory and build every asset class
    Build {
        /// Fail when any file produced a warning
        #[arg(long)]
        strict: bool,
    },

    /// Delete the output directory
    Clean,

    /// Run a single asset class pipeline (html, css, js, images, fonts)
    Run {
        /// Asset class to build
        class: AssetClass,
    },

    /// Serve the output directory without building or watching
    Serve {
        /// Port to listen on (defaults to config or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let config = config::load(&cli.config)?;

    match cli.command.unwrap_or(Commands::Watch {
        port: None,
        open: false,
    }) {
        Commands::Watch { port, open } => {
            commands::watch::run(&config, port, open).await?;
        }
        Commands::Build { strict } => {
            commands::build::run(&config, strict).await?;
        }
        Commands::Clean => {
            commands::clean::run(&config).await?;
        }
        Commands::Run { class } => {
            commands::run::run(&config, class).await?;
        }
        Commands::Serve { port } => {
            commands::serve::run(&config, port).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_watch() {
        let cli = Cli::try_parse_from(["kiln"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("kiln.toml"));
    }

    #[test]
    fn run_parses_class_aliases() {
        let cli = Cli::try_parse_from(["kiln", "run", "scss", "-v"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Run {
                class: AssetClass::Stylesheet
            })
        ));
        assert!(cli.verbose);

        assert!(Cli::try_parse_from(["kiln", "run", "videos"]).is_err());
    }

    #[test]
    fn build_accepts_strict() {
        let cli = Cli::try_parse_from(["kiln", "build", "--strict"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Build { strict: true })));
    }
}
