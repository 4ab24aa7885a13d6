//! Ledger overview for `cov status`.

use anyhow::Result;

use crate::config::Config;
use crate::ledger::Ledger;

pub async fn run_status(config: &Config) -> Result<()> {
    let ledger = Ledger::open(config).await?;
    let stats = ledger.satellite_stats().await?;

    let db_size = std::fs::metadata(&config.ledger.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Ledger:   {}", config.ledger.path.display());
    println!("Size:     {}", format_bytes(db_size));
    println!("Output:   {}", config.output.dir.display());
    println!();

    if stats.is_empty() {
        println!("No datasets recorded yet. Run `cov sync`.");
    } else {
        println!(
            "{:<10} {:>8} {:>10} {:>10}   {:<18} LAST PROCESSED",
            "SATELLITE", "DATASETS", "PROCESSED", "OVERLAPS", "LAST RUN"
        );
        println!("{}", "-".repeat(80));
        for s in &stats {
            println!(
                "{:<10} {:>8} {:>10} {:>10}   {:<18} {}",
                s.satellite,
                s.datasets,
                s.processed,
                s.records,
                s.last_run_label.as_deref().unwrap_or("-"),
                s.last_processed_at
                    .map(format_ts)
                    .unwrap_or_else(|| "never".to_string())
            );
        }
    }

    ledger.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_human_readable() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn timestamps_format_as_utc() {
        assert_eq!(format_ts(0), "1970-01-01 00:00");
    }
}
