//! Dataset ledger: which acquisition plans were fetched and processed.
//!
//! One row per dataset file name in the `datasets` table. A dataset counts
//! as processed only once its coverage run has succeeded.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::migrate::migrate;
use crate::traits::DatasetHandle;

/// A ledger row.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub file_name: String,
    pub satellite: String,
    pub locator: String,
    pub sha256: Option<String>,
    pub size_bytes: Option<i64>,
    pub fetched_at: Option<i64>,
    pub processed_at: Option<i64>,
    /// Hash of the content the last successful run was computed from.
    pub processed_sha256: Option<String>,
    pub run_label: Option<String>,
    pub record_count: Option<i64>,
}

impl LedgerEntry {
    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }
}

/// Per-satellite ledger totals for `cov status`.
#[derive(Debug, Clone, PartialEq)]
pub struct SatelliteStats {
    pub satellite: String,
    pub datasets: i64,
    pub processed: i64,
    pub records: i64,
    pub last_processed_at: Option<i64>,
    pub last_run_label: Option<String>,
}

pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    /// Opens the ledger database, creating the schema if needed.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    pub async fn entry(&self, file_name: &str) -> Result<Option<LedgerEntry>> {
        let row = sqlx::query(
            r#"
            SELECT file_name, satellite, locator, sha256, size_bytes, fetched_at,
                   processed_at, processed_sha256, run_label, record_count
            FROM datasets WHERE file_name = ?
            "#,
        )
        .bind(file_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| LedgerEntry {
            file_name: row.get("file_name"),
            satellite: row.get("satellite"),
            locator: row.get("locator"),
            sha256: row.get("sha256"),
            size_bytes: row.get("size_bytes"),
            fetched_at: row.get("fetched_at"),
            processed_at: row.get("processed_at"),
            processed_sha256: row.get("processed_sha256"),
            run_label: row.get("run_label"),
            record_count: row.get("record_count"),
        }))
    }

    /// Records a fresh download and returns its SHA-256.
    pub async fn record_fetched(&self, handle: &DatasetHandle, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let sha = hex::encode(Sha256::digest(&bytes));
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO datasets (file_name, satellite, locator, sha256, size_bytes, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(file_name) DO UPDATE SET
                satellite = excluded.satellite,
                locator = excluded.locator,
                sha256 = excluded.sha256,
                size_bytes = excluded.size_bytes,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(&handle.file_name)
        .bind(handle.satellite.as_str())
        .bind(&handle.locator)
        .bind(&sha)
        .bind(bytes.len() as i64)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(sha)
    }

    /// Marks a dataset processed with the content it was computed from.
    pub async fn mark_processed(
        &self,
        file_name: &str,
        run_label: &str,
        record_count: u64,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let updated = sqlx::query(
            r#"
            UPDATE datasets
            SET processed_at = ?, processed_sha256 = sha256, run_label = ?, record_count = ?
            WHERE file_name = ?
            "#,
        )
        .bind(now)
        .bind(run_label)
        .bind(record_count as i64)
        .bind(file_name)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            anyhow::bail!("Dataset {} was never recorded as fetched", file_name);
        }
        Ok(())
    }

    pub async fn satellite_stats(&self) -> Result<Vec<SatelliteStats>> {
        let rows = sqlx::query(
            r#"
            SELECT
                satellite,
                COUNT(*) AS datasets,
                COUNT(processed_at) AS processed,
                COALESCE(SUM(record_count), 0) AS records,
                MAX(processed_at) AS last_processed_at
            FROM datasets
            GROUP BY satellite
            ORDER BY satellite
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = Vec::with_capacity(rows.len());
        for row in &rows {
            let satellite: String = row.get("satellite");
            let last_run_label: Option<String> = sqlx::query_scalar(
                r#"
                SELECT run_label FROM datasets
                WHERE satellite = ? AND processed_at IS NOT NULL
                ORDER BY processed_at DESC, file_name DESC
                LIMIT 1
                "#,
            )
            .bind(&satellite)
            .fetch_optional(&self.pool)
            .await?
            .flatten();

            stats.push(SatelliteStats {
                satellite,
                datasets: row.get("datasets"),
                processed: row.get("processed"),
                records: row.get("records"),
                last_processed_at: row.get("last_processed_at"),
                last_run_label,
            });
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_coverage_core::models::SatelliteId;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config(tmp: &TempDir) -> Config {
        let mut config = Config::minimal(Path::new("tiles.geojson"), &tmp.path().join("out"));
        config.ledger.path = tmp.path().join("ledger.sqlite");
        config
    }

    fn handle() -> DatasetHandle {
        DatasetHandle {
            satellite: SatelliteId::new("S2A").unwrap(),
            file_name: "S2A_PLAN.KML".to_string(),
            locator: "https://host/S2A_PLAN.KML".to_string(),
        }
    }

    async fn fetched(tmp: &TempDir, content: &str) -> PathBuf {
        let path = tmp.path().join("S2A_PLAN.KML");
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    #[tokio::test]
    async fn fetched_then_processed() {
        let tmp = TempDir::new().unwrap();
        let ledger = Ledger::open(&config(&tmp)).await.unwrap();
        assert!(ledger.entry("S2A_PLAN.KML").await.unwrap().is_none());

        let path = fetched(&tmp, "v1").await;
        let sha = ledger.record_fetched(&handle(), &path).await.unwrap();
        assert_eq!(sha.len(), 64);
        let entry = ledger.entry("S2A_PLAN.KML").await.unwrap().unwrap();
        assert!(!entry.is_processed());
        assert_eq!(entry.size_bytes, Some(2));

        ledger
            .mark_processed("S2A_PLAN.KML", "20240104_20240122", 12)
            .await
            .unwrap();
        let entry = ledger.entry("S2A_PLAN.KML").await.unwrap().unwrap();
        assert!(entry.is_processed());
        assert_eq!(entry.processed_sha256.as_deref(), Some(sha.as_str()));

        // A refetch with new content keeps the processed hash for comparison.
        let path = fetched(&tmp, "v2").await;
        let new_sha = ledger.record_fetched(&handle(), &path).await.unwrap();
        let entry = ledger.entry("S2A_PLAN.KML").await.unwrap().unwrap();
        assert_ne!(entry.sha256.as_deref(), entry.processed_sha256.as_deref());
        assert_eq!(entry.sha256, Some(new_sha));

        let stats = ledger.satellite_stats().await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].satellite, "S2A");
        assert_eq!(stats[0].processed, 1);
        assert_eq!(stats[0].records, 12);
        assert_eq!(stats[0].last_run_label.as_deref(), Some("20240104_20240122"));
        ledger.close().await;
    }

    #[tokio::test]
    async fn unknown_dataset_cannot_be_processed() {
        let tmp = TempDir::new().unwrap();
        let ledger = Ledger::open(&config(&tmp)).await.unwrap();
        assert!(ledger.mark_processed("nope.kml", "20240101_20240102", 0).await.is_err());
    }
}
