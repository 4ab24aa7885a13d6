//! Acquisition plans published on the ESA Sentinel-2 web page.
//!
//! The page holds one `div` per satellite, tagged with a CSS class such as
//! `sentinel-2a`, listing links to KML plans. Link targets are rewritten the
//! way the download server expects: the last path segment upper-cased and
//! the site root prefixed.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use orbit_coverage_core::models::SatelliteId;
use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::traits::{DatasetHandle, FootprintSource};

pub struct WebSource {
    client: reqwest::Client,
    page_url: String,
    link_base: String,
    /// Satellite id and the CSS class of its section.
    sections: Vec<(SatelliteId, String)>,
}

impl WebSource {
    pub fn new(config: &Config) -> Result<Self> {
        let web = &config.ingest.web;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(web.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        let mut sections = Vec::new();
        for sat in &config.ingest.satellites {
            let class = sat.section_class.clone().ok_or_else(|| {
                anyhow::anyhow!("ingest.satellites.{}: section_class is not set", sat.id)
            })?;
            sections.push((sat.satellite_id()?, class));
        }

        Ok(Self {
            client,
            page_url: web.page_url.clone(),
            link_base: web.link_base.trim_end_matches('/').to_string(),
            sections,
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;
        if !resp.status().is_success() {
            bail!("GET {} returned {}", url, resp.status());
        }
        Ok(resp)
    }
}

#[async_trait]
impl FootprintSource for WebSource {
    fn name(&self) -> &str {
        "web"
    }

    fn location(&self) -> String {
        self.page_url.clone()
    }

    async fn list_available(&self) -> Result<Vec<DatasetHandle>> {
        let html = self.get(&self.page_url).await?.text().await?;
        let handles = extract_datasets(&html, &self.sections, &self.link_base)?;
        debug!(count = handles.len(), page = %self.page_url, "listed acquisition plans");
        Ok(handles)
    }

    async fn fetch(&self, handle: &DatasetHandle, download_dir: &Path) -> Result<PathBuf> {
        info!(url = %handle.locator, "downloading acquisition plan");
        let bytes = self.get(&handle.locator).await?.bytes().await?;
        tokio::fs::create_dir_all(download_dir).await?;
        let path = download_dir.join(&handle.file_name);
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Datasets linked from each satellite's section of the page.
///
/// A section runs from the element carrying the satellite's class to the
/// next configured section start. Satellites without a section yield
/// nothing; a link listed twice is kept once.
pub fn extract_datasets(
    html: &str,
    sections: &[(SatelliteId, String)],
    link_base: &str,
) -> Result<Vec<DatasetHandle>> {
    let class_attr = Regex::new(r#"(?i)<[a-z0-9]+[^>]*\sclass\s*=\s*["']([^"']*)["']"#)?;
    let heading = Regex::new(r"(?is)<h4[^>]*>(.*?)</h4>")?;
    let href = Regex::new(r#"(?i)<a\s[^>]*href\s*=\s*["']([^"']+)["']"#)?;

    // Start offset of each configured section, in document order.
    let mut starts: Vec<(usize, usize)> = Vec::new();
    for m in class_attr.captures_iter(html) {
        let (Some(whole), Some(classes)) = (m.get(0), m.get(1)) else {
            continue;
        };
        for (index, (_, class)) in sections.iter().enumerate() {
            let already = starts.iter().any(|(_, i)| *i == index);
            if !already && classes.as_str().split_whitespace().any(|c| c == class) {
                starts.push((whole.start(), index));
            }
        }
    }

    let mut handles = Vec::new();
    for (n, (start, index)) in starts.iter().enumerate() {
        let end = starts.get(n + 1).map(|(s, _)| *s).unwrap_or(html.len());
        let body = &html[*start..end];
        let satellite = &sections[*index].0;

        if let Some(h) = heading.captures(body).and_then(|c| c.get(1)) {
            debug!(satellite = %satellite, heading = h.as_str().trim(), "found section");
        }

        for link in href.captures_iter(body).filter_map(|c| c.get(1)) {
            let link = link.as_str().trim();
            if !link.to_ascii_lowercase().ends_with(".kml") {
                continue;
            }
            let (dir, last) = link.rsplit_once('/').unwrap_or(("", link));
            let file_name = last.to_uppercase();
            let path = if link.contains('/') {
                format!("{}/{}", dir, file_name)
            } else {
                file_name.clone()
            };
            let locator = if path.starts_with("http://") || path.starts_with("https://") {
                path
            } else if path.starts_with('/') {
                format!("{}{}", link_base, path)
            } else {
                format!("{}/{}", link_base, path)
            };
            if handles.iter().any(|h: &DatasetHandle| h.locator == locator) {
                continue;
            }
            handles.push(DatasetHandle {
                satellite: satellite.clone(),
                file_name,
                locator,
            });
        }
    }
    Ok(handles)
}
