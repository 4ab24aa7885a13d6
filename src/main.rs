//! # orbit-coverage CLI (`cov`)
//!
//! ## Usage
//!
//! ```bash
//! cov --config ./config/cov.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cov init` | Create the dataset ledger |
//! | `cov sources` | Show the configured source and satellites |
//! | `cov check` | List available acquisition plans and which are new |
//! | `cov sync` | Fetch new plans and compute their coverage |
//! | `cov compute` | Compute coverage for one local plan |
//! | `cov status` | Ledger summary per satellite |
//!
//! ## Examples
//!
//! ```bash
//! # Fetch and process whatever ESA published since the last run
//! cov sync
//!
//! # One-off run without a config file
//! cov compute --footprints S2A_MP_ACQ__KML_20240104T120000_20240122T150000.kml \
//!     --satellite S2A --tiles tiles_s2.geojson --output-dir out
//! ```

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use orbit_coverage::config::{self, Config};
use orbit_coverage::progress::ProgressMode;
use orbit_coverage::{coverage, ingest, migrate, sources, status};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Tile coverage of Sentinel-2 acquisition plans.
#[derive(Parser)]
#[command(
    name = "cov",
    about = "Tile x orbit coverage of Sentinel-2 acquisition plans",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cov.toml")]
    config: PathBuf,

    /// Progress on stderr. Defaults to human when stderr is a terminal.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the dataset ledger. Safe to run repeatedly.
    Init,

    /// Show the configured source, its satellites and whether it is reachable.
    Sources,

    /// List available acquisition plans and whether each is new. Writes nothing.
    Check {
        /// Only this satellite (e.g. `S2A`).
        #[arg(long)]
        satellite: Option<String>,
    },

    /// Fetch new acquisition plans and compute their coverage.
    Sync {
        /// Only this satellite (e.g. `S2A`).
        #[arg(long)]
        satellite: Option<String>,

        /// Show what would be fetched without fetching.
        #[arg(long)]
        dry_run: bool,

        /// Reprocess every available plan, new or not.
        #[arg(long)]
        force: bool,
    },

    /// Compute coverage for one local footprint dataset (KML or GeoJSON).
    Compute {
        /// Footprint dataset.
        #[arg(long)]
        footprints: PathBuf,

        /// Satellite the footprints belong to.
        #[arg(long)]
        satellite: String,

        /// Tile grid; overrides `grid.path`.
        #[arg(long)]
        tiles: Option<PathBuf>,

        /// Output directory; overrides `output.dir`.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Run label `YYYYMMDD_YYYYMMDD`; derived from the dataset when absent.
        #[arg(long)]
        run_label: Option<String>,
    },

    /// Ledger summary per satellite.
    Status,
}

/// Config for `cov compute`: the config file if present, else one built
/// from `--tiles` and `--output-dir`.
fn compute_config(
    path: &Path,
    tiles: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<Config> {
    let mut cfg = if path.exists() {
        config::load_config(path)?
    } else {
        match (&tiles, &output_dir) {
            (Some(tiles), Some(output_dir)) => Config::minimal(tiles, output_dir),
            _ => bail!(
                "No config file at {}; pass --tiles and --output-dir",
                path.display()
            ),
        }
    };
    if let Some(tiles) = tiles {
        cfg.grid.path = tiles;
    }
    if let Some(output_dir) = output_dir {
        cfg.output.dir = output_dir;
    }
    config::validate(&cfg)?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);
    let reporter = progress.reporter();

    if let Commands::Compute {
        footprints,
        satellite,
        tiles,
        output_dir,
        run_label,
    } = cli.command
    {
        let cfg = compute_config(&cli.config, tiles, output_dir)?;
        coverage::run_compute(
            &cfg,
            &footprints,
            &satellite,
            run_label.as_deref(),
            reporter.as_ref(),
        )?;
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Ledger initialized at {}", cfg.ledger.path.display());
        }
        Commands::Sources => {
            sources::list_sources(&cfg).await?;
        }
        Commands::Check { satellite } => {
            ingest::run_check(&cfg, satellite.as_deref()).await?;
        }
        Commands::Sync {
            satellite,
            dry_run,
            force,
        } => {
            ingest::run_sync(&cfg, satellite.as_deref(), dry_run, force, reporter.as_ref()).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
        Commands::Compute { .. } => {
            // Handled above (before config loading)
        }
    }

    Ok(())
}
