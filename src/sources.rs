use anyhow::Result;

use crate::config::{Config, SourceKind};
use crate::source_dir::DirectorySource;
use crate::source_web::WebSource;
use crate::traits::FootprintSource;

/// The configured acquisition-plan source.
pub fn build_source(config: &Config) -> Result<Box<dyn FootprintSource>> {
    Ok(match config.ingest.source {
        SourceKind::Web => Box::new(WebSource::new(config)?),
        SourceKind::Directory => Box::new(DirectorySource::new(config)?),
    })
}

/// `cov sources`: configured satellites and whether the source answers.
pub async fn list_sources(config: &Config) -> Result<()> {
    let source = build_source(config)?;
    let (status, healthy) = match source.health().await {
        Ok(()) => ("OK".to_string(), true),
        Err(e) => (format!("UNREACHABLE ({:#})", e), false),
    };

    println!("source: {} {}", source.name(), source.location());
    println!("status: {}", status);
    println!();
    println!("{:<10} {:<16} {:<24} HEALTHY", "SATELLITE", "SECTION", "INCLUDE");
    for sat in &config.ingest.satellites {
        println!(
            "{:<10} {:<16} {:<24} {}",
            sat.id,
            sat.section_class.as_deref().unwrap_or("-"),
            sat.include_glob.as_deref().unwrap_or("-"),
            healthy
        );
    }
    Ok(())
}
