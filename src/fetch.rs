//! Download each referenced document's HTML once into the local cache.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use thiserror::Error;
use tracing::warn;

use crate::http::Pacer;
use crate::utils::{split_lines, url_to_filename};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {0}")]
    Status(u16),
    #[error("could not write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub trait HtmlSource {
    fn fetch_html(&self, url: &str) -> Result<String, FetchError>;
}

impl HtmlSource for Client {
    fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.get(url.trim()).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(resp.text()?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub url: String,
    pub path: PathBuf,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchStats {
    pub success: usize,
    pub failed: usize,
    /// Already cached; counted in `success` too.
    pub skipped: usize,
}

/// Unique URLs across all cells, in first-seen order, mapped to cache paths.
pub fn plan_downloads<'a>(url_cells: impl IntoIterator<Item = &'a str>, out_dir: &Path) -> Vec<Download> {
    let mut seen = HashSet::new();
    let mut plan = Vec::new();
    for cell in url_cells {
        for url in split_lines(cell) {
            if !seen.insert(url.clone()) {
                continue;
            }
            let Some(filename) = url_to_filename(&url) else {
                warn!(url = %url, "no filename in url, skipping");
                continue;
            };
            plan.push(Download {
                path: out_dir.join(filename),
                url,
            });
        }
    }
    plan
}

fn is_cached(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

pub fn download_all(source: &dyn HtmlSource, plan: &[Download], pacer: Pacer) -> FetchStats {
    let mut stats = FetchStats::default();
    let total = plan.len();
    for (i, item) in plan.iter().enumerate() {
        let name = item
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if is_cached(&item.path) {
            println!("[{}/{}] Already exists: {}", i + 1, total, name);
            stats.success += 1;
            stats.skipped += 1;
            continue;
        }

        println!("[{}/{}] Downloading: {}", i + 1, total, name);
        match download_one(source, item) {
            Ok(()) => stats.success += 1,
            Err(err) => {
                warn!(url = %item.url, error = %err, "download failed");
                println!("  Error downloading {}: {}", item.url, err);
                stats.failed += 1;
            }
        }
        pacer.wait();
    }
    stats
}

fn download_one(source: &dyn HtmlSource, item: &Download) -> Result<(), FetchError> {
    let body = source.fetch_html(&item.url)?;
    fs::write(&item.path, body).map_err(|source| FetchError::Write {
        path: item.path.clone(),
        source,
    })
}
