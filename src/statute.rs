//! NDAA statute text lookup keyed by (fiscal year, section).

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::table::Table;
use crate::utils::{parse_fy, parse_section_enum};

pub const TEXT_COLUMN: &str = "ndaa_text";
pub const LOOKUP_FAILED: &str = "[Error: lookup failed]";

/// Every variant renders as the bracketed marker written into the CSV.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("[Error: could not parse FY from '{0}']")]
    FiscalYear(String),
    #[error("[Error: NDAA JSON not found for FY{0}]")]
    MissingYear(i32),
    #[error("[Error: invalid NDAA JSON for FY{year}: {detail}]")]
    InvalidYear { year: i32, detail: String },
    #[error("[Error: could not parse section from '{0}']")]
    Section(String),
    #[error("[Not found: FY{year} section {section}]")]
    NotFound { year: i32, section: String },
}

/// One node of a statute document: a title, subtitle, section, subsection...
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatuteNode {
    #[serde(rename = "enum", default)]
    pub number: Option<String>,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub children: Vec<StatuteNode>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatuteFile {
    Many(Vec<StatuteNode>),
    One(StatuteNode),
}

impl StatuteNode {
    fn walk<'a>(&'a self, out: &mut Vec<&'a StatuteNode>) {
        out.push(self);
        for child in &self.children {
            child.walk(out);
        }
    }

    /// Heading and body lines of this node and all descendants, in order.
    pub fn flat_text(&self) -> String {
        let mut nodes = Vec::new();
        self.walk(&mut nodes);
        let mut lines = Vec::new();
        for node in nodes {
            let head = [node.number.as_deref(), node.header.as_deref()]
                .into_iter()
                .flatten()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if !head.is_empty() {
                lines.push(head);
            }
            if let Some(text) = node.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                lines.push(text.to_string());
            }
        }
        lines.join("\n")
    }
}

/// Nodes whose enum equals `number`, in document order.
pub fn find_sections<'a>(roots: &'a [StatuteNode], number: &str) -> Vec<&'a StatuteNode> {
    let mut nodes = Vec::new();
    for root in roots {
        root.walk(&mut nodes);
    }
    nodes
        .into_iter()
        .filter(|n| n.number.as_deref().map(str::trim) == Some(number))
        .collect()
}

pub fn parse_statute(json: &str) -> Result<Vec<StatuteNode>, serde_json::Error> {
    Ok(match serde_json::from_str::<StatuteFile>(json)? {
        StatuteFile::Many(nodes) => nodes,
        StatuteFile::One(node) => vec![node],
    })
}

/// Year documents loaded on first use and kept for the run, including
/// the fact that a year is missing.
pub struct StatuteLookup {
    dir: PathBuf,
    years: HashMap<i32, Result<Vec<StatuteNode>, LookupError>>,
}

impl StatuteLookup {
    pub fn new(dir: &Path) -> Self {
        StatuteLookup {
            dir: dir.to_path_buf(),
            years: HashMap::new(),
        }
    }

    pub fn year_path(&self, year: i32) -> PathBuf {
        self.dir.join(format!("ndaa_fy{}.json", year))
    }

    fn load_year(&self, year: i32) -> Result<Vec<StatuteNode>, LookupError> {
        let path = self.year_path(year);
        let json = fs::read_to_string(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => LookupError::MissingYear(year),
            _ => LookupError::InvalidYear {
                year,
                detail: err.to_string(),
            },
        })?;
        let nodes = parse_statute(&json).map_err(|err| LookupError::InvalidYear {
            year,
            detail: err.to_string(),
        })?;
        debug!(year, path = ?path, "loaded statute document");
        Ok(nodes)
    }

    pub fn lookup(&mut self, fy: &str, section: &str) -> Result<String, LookupError> {
        let year = parse_fy(fy).ok_or_else(|| LookupError::FiscalYear(fy.to_string()))?;
        if !self.years.contains_key(&year) {
            let loaded = self.load_year(year);
            self.years.insert(year, loaded);
        }
        let roots = match self.years.get(&year) {
            Some(Ok(roots)) => roots,
            Some(Err(err)) => return Err(err.clone()),
            None => return Err(LookupError::MissingYear(year)),
        };

        let number = parse_section_enum(section).ok_or_else(|| LookupError::Section(section.to_string()))?;
        let matches = find_sections(roots, &number);
        let first = matches.first().ok_or_else(|| LookupError::NotFound {
            year,
            section: section.to_string(),
        })?;
        let text = first.flat_text();
        if matches.iter().skip(1).any(|m| m.flat_text() != text) {
            warn!(year, section, matches = matches.len(), "several distinct statute entries, using the first");
        }
        Ok(text)
    }
}

#[derive(Debug, Default)]
pub struct JoinReport {
    pub pairs: usize,
    pub found: usize,
    pub not_found: usize,
}

/// Progress line for a failed lookup; the marker is cut at 80 characters.
fn miss_line(fy: &str, section: &str, marker: &str) -> String {
    let shown: String = marker.chars().take(80).collect();
    format!("  MISS: {} section {} -> {}", fy, section, shown)
}

/// Resolve each unique (year, section) pair once, then fan the text out to
/// every row as the `ndaa_text` column.
pub fn join_statute_text(table: &mut Table, lookup: &mut StatuteLookup) -> JoinReport {
    let pairs: BTreeSet<(String, String)> = (0..table.len())
        .map(|i| {
            (
                table.value(i, "ndaa_year").to_string(),
                table.value(i, "ndaa_section").to_string(),
            )
        })
        .collect();

    println!("Looking up {} unique (ndaa_year, ndaa_section) pairs...", pairs.len());

    let mut report = JoinReport {
        pairs: pairs.len(),
        ..Default::default()
    };
    let mut texts: HashMap<(String, String), String> = HashMap::new();
    for (fy, section) in pairs {
        let text = match lookup.lookup(&fy, &section) {
            Ok(text) => {
                report.found += 1;
                text
            }
            Err(err) => {
                report.not_found += 1;
                let marker = err.to_string();
                println!("{}", miss_line(&fy, &section, &marker));
                marker
            }
        };
        texts.insert((fy, section), text);
    }

    let column = (0..table.len())
        .map(|i| {
            let key = (
                table.value(i, "ndaa_year").to_string(),
                table.value(i, "ndaa_section").to_string(),
            );
            texts.get(&key).cloned().unwrap_or_else(|| LOOKUP_FAILED.to_string())
        })
        .collect();
    table.set_column(TEXT_COLUMN, column);
    report
}
