//! Acquisition-plan synchronisation.
//!
//! Lists the configured source, decides per dataset whether it is new
//! (see [`ChangeDetection`]), fetches new datasets and runs coverage on each.
//! The tile grid is loaded once, on the first dataset that needs it.

use anyhow::{bail, Result};
use orbit_coverage_core::models::TileGrid;
use std::path::Path;
use tracing::{error, info};

use crate::config::{ChangeDetection, Config};
use crate::coverage::{compute_dataset, print_outcome};
use crate::ledger::{Ledger, LedgerEntry};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::sources::build_source;
use crate::tiles::load_tile_grid;
use crate::traits::{DatasetHandle, FootprintSource};

/// Whether a dataset is already processed, judged without fetching it.
///
/// The ledger decides when it knows the file. A file in the download
/// directory that the ledger has never seen was processed before the
/// ledger existed and counts as processed.
pub fn known_processed(entry: Option<&LedgerEntry>, download_dir: &Path, file_name: &str) -> bool {
    match entry {
        Some(entry) => entry.is_processed(),
        None => download_dir.join(file_name).exists(),
    }
}

/// Whether fetched content still needs a run under content-hash detection.
pub fn content_changed(entry: Option<&LedgerEntry>, sha256: &str) -> bool {
    entry
        .and_then(|e| e.processed_sha256.as_deref())
        .map_or(true, |processed| processed != sha256)
}

fn check_satellite_filter(config: &Config, satellite: Option<&str>) -> Result<()> {
    if let Some(sat) = satellite {
        if !config.ingest.satellites.iter().any(|s| s.id == sat) {
            bail!(
                "Unknown satellite '{}'. Configured: {}",
                sat,
                config
                    .ingest
                    .satellites
                    .iter()
                    .map(|s| s.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    Ok(())
}

async fn list_handles(
    source: &dyn FootprintSource,
    satellite: Option<&str>,
) -> Result<Vec<DatasetHandle>> {
    let mut handles = source.list_available().await?;
    if let Some(sat) = satellite {
        handles.retain(|h| h.satellite.as_str() == sat);
    }
    Ok(handles)
}

/// `cov check`: lists available datasets and whether each is new. Writes nothing.
pub async fn run_check(config: &Config, satellite: Option<&str>) -> Result<()> {
    check_satellite_filter(config, satellite)?;
    let source = build_source(config)?;
    let handles = list_handles(source.as_ref(), satellite).await?;
    let ledger = Ledger::open(config).await?;
    let download_dir = &config.ingest.download_dir;

    println!("check {} ({})", source.name(), source.location());
    println!("{:<10} {:<10} DATASET", "SATELLITE", "STATUS");
    let mut new_count = 0;
    for handle in &handles {
        let entry = ledger.entry(&handle.file_name).await?;
        let status = if known_processed(entry.as_ref(), download_dir, &handle.file_name) {
            match config.ingest.change_detection {
                ChangeDetection::FileName => "processed",
                ChangeDetection::ContentHash => "processed?",
            }
        } else {
            new_count += 1;
            "new"
        };
        println!("{:<10} {:<10} {}", handle.satellite, status, handle.file_name);
    }
    println!();
    println!("  available: {}", handles.len());
    println!("  new: {}", new_count);
    if config.ingest.change_detection == ChangeDetection::ContentHash {
        println!("  (content-hash: processed datasets are re-checked on sync)");
    }

    ledger.close().await;
    Ok(())
}

/// `cov sync`: fetches new datasets from the configured source and runs
/// coverage for each.
pub async fn run_sync(
    config: &Config,
    satellite: Option<&str>,
    dry_run: bool,
    force: bool,
    reporter: &dyn ProgressReporter,
) -> Result<()> {
    check_satellite_filter(config, satellite)?;
    let source = build_source(config)?;
    run_sync_with_source(config, source.as_ref(), satellite, dry_run, force, reporter).await
}

/// Sync against any [`FootprintSource`].
///
/// A dataset that cannot be fetched, recorded or computed is logged and left
/// unprocessed so the next sync retries it; the remaining datasets still run
/// and the call fails afterwards, listing the failures.
///
/// Coverage runs block the calling worker, so this needs the multi-threaded
/// Tokio runtime.
pub async fn run_sync_with_source(
    config: &Config,
    source: &dyn FootprintSource,
    satellite: Option<&str>,
    dry_run: bool,
    force: bool,
    reporter: &dyn ProgressReporter,
) -> Result<()> {
    reporter.report(ProgressEvent::Discovering {
        satellite: satellite.unwrap_or("all").to_string(),
    });
    let handles = list_handles(source, satellite).await?;
    let ledger = Ledger::open(config).await?;
    let download_dir = &config.ingest.download_dir;
    let detection = config.ingest.change_detection;

    let mut candidates = Vec::new();
    for handle in &handles {
        let entry = ledger.entry(&handle.file_name).await?;
        let skip = !force
            && detection == ChangeDetection::FileName
            && known_processed(entry.as_ref(), download_dir, &handle.file_name);
        if !skip {
            candidates.push((handle, entry));
        }
    }

    if dry_run {
        println!("sync {} (dry-run)", source.name());
        println!("  available: {}", handles.len());
        println!("  to fetch: {}", candidates.len());
        for (handle, _) in &candidates {
            println!("    {} {}", handle.satellite, handle.locator);
        }
        ledger.close().await;
        return Ok(());
    }

    let mut loaded_grid: Option<TileGrid> = None;
    let total = candidates.len() as u64;
    let mut processed = 0u64;
    let mut unchanged = 0u64;
    let mut failed = Vec::new();

    for (n, (handle, entry)) in candidates.iter().enumerate() {
        reporter.report(ProgressEvent::Fetching {
            satellite: handle.satellite.to_string(),
            dataset: handle.file_name.clone(),
            n: n as u64 + 1,
            total,
        });
        let fetched = match source.fetch(handle, download_dir).await {
            Ok(path) => ledger.record_fetched(handle, &path).await.map(|sha| (path, sha)),
            Err(e) => Err(e),
        };
        let (path, sha) = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(dataset = %handle.file_name, error = %format!("{:#}", e), "fetch failed");
                failed.push(handle.file_name.clone());
                continue;
            }
        };

        if !force
            && detection == ChangeDetection::ContentHash
            && !content_changed(entry.as_ref(), &sha)
        {
            info!(dataset = %handle.file_name, "content unchanged since last run");
            unchanged += 1;
            continue;
        }

        let grid: &TileGrid = match loaded_grid {
            Some(ref grid) => grid,
            None => loaded_grid.insert(load_tile_grid(&config.grid)?),
        };

        let computed = tokio::task::block_in_place(|| {
            compute_dataset(config, grid, &path, &handle.satellite, None, reporter)
        });
        match computed {
            Ok(outcome) => {
                if let Err(e) = ledger
                    .mark_processed(
                        &handle.file_name,
                        outcome.run_label.as_str(),
                        outcome.report.records,
                    )
                    .await
                {
                    error!(dataset = %handle.file_name, error = %format!("{:#}", e), "ledger update failed");
                    failed.push(handle.file_name.clone());
                    continue;
                }
                print_outcome(&handle.satellite, grid, &outcome);
                processed += 1;
            }
            Err(e) => {
                error!(dataset = %handle.file_name, error = %format!("{:#}", e), "coverage run failed");
                failed.push(handle.file_name.clone());
            }
        }
    }

    ledger.close().await;

    if processed == 0 && failed.is_empty() {
        println!("Files are up to date");
        return Ok(());
    }

    println!("sync {}", source.name());
    println!("  available: {}", handles.len());
    println!("  processed: {}", processed);
    if unchanged > 0 {
        println!("  unchanged: {}", unchanged);
    }
    if !failed.is_empty() {
        println!("  failed: {}", failed.len());
        bail!("{} dataset(s) failed: {}", failed.len(), failed.join(", "));
    }
    println!("ok");
    Ok(())
}
