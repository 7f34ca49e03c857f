//! flyer-acquire - Flyer image acquisition and cache
//!
//! Locates a merchant's current flyer for a postal code, reassembles its page tiles
//! into one PNG and caches the result under the root folder.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flyer_acquire::models::{CacheStatus, CachedFlyerRecord};
use flyer_acquire::CacheError;
use flyer_common::config::{load_toml_config, resolve_root_folder, RootLayout};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for flyer-acquire
#[derive(Parser, Debug)]
#[command(name = "flyer-acquire")]
#[command(about = "Fetch, stitch and cache retail flyer images")]
#[command(version)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, env = "FLYER_CACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the database and images
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Return a fresh cached flyer, acquiring one on a miss
    Fetch {
        postal_code: String,
        merchant: String,
        /// Listing category (default from config)
        #[arg(long)]
        category: Option<String>,
    },
    /// Acquire a new flyer even if a fresh one is cached
    Refresh {
        postal_code: String,
        merchant: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Show the fresh cached flyer without acquiring
    Show { postal_code: String, merchant: String },
    /// Delete a cached flyer by external id
    Delete { flyer_id: String },
    /// Delete every flyer older than the freshness window
    PurgeStale,
    /// Store the listing session id in the database
    SetSessionId { session_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = load_toml_config(args.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting flyer-acquire {}", env!("CARGO_PKG_VERSION"));

    let layout = RootLayout::new(resolve_root_folder(args.root_folder.as_deref(), &toml_config));
    layout
        .ensure_directories()
        .with_context(|| format!("Failed to initialize root folder {}", layout.root.display()))?;
    let layout = layout
        .canonicalize()
        .context("Failed to resolve root folder")?;
    info!("Root folder: {}", layout.root.display());

    let pool = flyer_acquire::db::init_database_pool(&layout.database_path)
        .await
        .context("Failed to open database")?;

    if let Command::SetSessionId { session_id } = &args.command {
        anyhow::ensure!(
            flyer_acquire::config::is_valid_session_id(session_id),
            "Session id must not be blank"
        );
        flyer_acquire::db::settings::set_listing_session_id(&pool, session_id.trim().to_string())
            .await?;
        println!("Listing session id updated");
        return Ok(());
    }

    let acquisition = flyer_acquire::config::build_acquisition_config(&pool, &toml_config).await?;
    let service = flyer_acquire::build_service(pool, &layout, acquisition)?;

    let orphans = service.reconcile_orphans().await?;
    if orphans > 0 {
        info!("Removed {} orphaned image files", orphans);
    }

    match args.command {
        Command::Fetch {
            postal_code,
            merchant,
            category,
        } => match service
            .get_or_acquire(&postal_code, &merchant, category.as_deref())
            .await
        {
            Ok(cached) => {
                let label = match cached.status {
                    CacheStatus::Hit => "cached",
                    CacheStatus::Acquired => "acquired",
                };
                print_record(&cached.record, label);
            }
            Err(CacheError::NotFound { .. }) => {
                println!("No flyer found for {} in {}", merchant, postal_code);
                std::process::exit(2);
            }
            Err(e) => return Err(e.into()),
        },
        Command::Refresh {
            postal_code,
            merchant,
            category,
        } => match service
            .refresh(&postal_code, &merchant, category.as_deref())
            .await
        {
            Ok(record) => print_record(&record, "acquired"),
            Err(CacheError::NotFound { .. }) => {
                println!("No flyer found for {} in {}", merchant, postal_code);
                std::process::exit(2);
            }
            Err(e) => return Err(e.into()),
        },
        Command::Show {
            postal_code,
            merchant,
        } => match service.find_fresh(&merchant, &postal_code).await? {
            Some(record) => print_record(&record, "cached"),
            None => println!("No fresh flyer cached for {} in {}", merchant, postal_code),
        },
        Command::Delete { flyer_id } => {
            if service.delete(&flyer_id).await? {
                println!("Deleted flyer {}", flyer_id);
            } else {
                println!("Flyer {} is not cached", flyer_id);
            }
        }
        Command::PurgeStale => {
            let purged = service.purge_stale().await?;
            println!("Purged {} stale flyers", purged);
        }
        Command::SetSessionId { .. } => {}
    }

    Ok(())
}

fn print_record(record: &CachedFlyerRecord, label: &str) {
    println!(
        "{} flyer {} ({}, {}) fetched {}: {}",
        label,
        record.flyer_id,
        record.merchant_name,
        record.postal_code,
        record.fetched_at.to_rfc3339(),
        record.image_path.display()
    );
}
