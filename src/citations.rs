//! Resolve Federal Register citations (`88 FR 73238`) to published documents.

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::http::Pacer;
use crate::utils::{parse_fr_date, split_lines};
use crate::Settings;

pub const NOT_FOUND: &str = "Not Found";

const FIELDS: &[&str] = &[
    "title",
    "document_number",
    "citation",
    "start_page",
    "body_html_url",
    "html_url",
    "publication_date",
];

#[derive(Error, Debug)]
pub enum CitationError {
    #[error("could not parse citation format: {0}")]
    Citation(String),
    #[error("could not parse date: {0}")]
    Date(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub volume: String,
    pub page: String,
}

pub fn parse_citation(citation: &str) -> Result<Citation, CitationError> {
    let parts: Vec<&str> = citation.trim().split(" FR ").collect();
    match parts.as_slice() {
        [volume, page] => Ok(Citation {
            volume: volume.trim().to_string(),
            page: page.trim().to_string(),
        }),
        _ => Err(CitationError::Citation(citation.to_string())),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrDocument {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub document_number: Option<String>,
    #[serde(default)]
    pub citation: Option<String>,
    #[serde(default)]
    pub start_page: Option<Value>,
    #[serde(default)]
    pub body_html_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub publication_date: Option<String>,
}

impl FrDocument {
    /// `start_page` as the API renders it, whether sent as number or string.
    pub fn start_page_str(&self) -> Option<String> {
        match self.start_page.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Full-text HTML link, preferring the body-only rendition.
    pub fn html_link(&self) -> String {
        [&self.body_html_url, &self.html_url]
            .into_iter()
            .flatten()
            .find(|u| !u.is_empty())
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<FrDocument>,
}

/// Documents published by an agency on a single date.
pub trait DocumentSearch {
    fn search(&self, agency: &str, iso_date: &str) -> Result<Vec<FrDocument>, CitationError>;
}

pub struct FederalRegisterClient {
    client: Client,
    base_url: String,
}

impl FederalRegisterClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        FederalRegisterClient {
            client,
            base_url: base_url.to_string(),
        }
    }
}

impl DocumentSearch for FederalRegisterClient {
    fn search(&self, agency: &str, iso_date: &str) -> Result<Vec<FrDocument>, CitationError> {
        let mut query: Vec<(&str, &str)> = vec![
            ("conditions[agencies][]", agency),
            ("conditions[publication_date][gte]", iso_date),
            ("conditions[publication_date][lte]", iso_date),
            ("per_page", "100"),
        ];
        query.extend(FIELDS.iter().map(|f| ("fields[]", *f)));

        debug!(agency, iso_date, "searching federal register");
        let resp = self.client.get(&self.base_url).query(&query).send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(CitationError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: SearchResponse = resp.json()?;
        Ok(parsed.results)
    }
}

pub struct Resolver<'a> {
    search: &'a dyn DocumentSearch,
    agencies: Vec<String>,
    pacer: Pacer,
}

impl<'a> Resolver<'a> {
    pub fn new(search: &'a dyn DocumentSearch, settings: &Settings, pacer: Pacer) -> Self {
        Resolver {
            search,
            agencies: vec![
                settings.primary_agency.clone(),
                settings.fallback_agency.clone(),
            ],
            pacer,
        }
    }

    /// Look up one citation. Agencies are tried in order; the broader
    /// fallback only runs when the narrow one has no page match.
    pub fn resolve(&self, citation: &str, fr_date: &str) -> Result<Option<FrDocument>, CitationError> {
        let parsed = parse_citation(citation)?;
        let iso_date = parse_fr_date(fr_date).ok_or_else(|| CitationError::Date(fr_date.to_string()))?;

        for agency in &self.agencies {
            let results = self.search.search(agency, &iso_date)?;
            if let Some(doc) = first_page_match(&results, &parsed.page, citation) {
                return Ok(Some(doc));
            }
        }
        info!(citation, iso_date = %iso_date, "no page match");
        Ok(None)
    }

    /// Resolve every citation in a (possibly multi-line) cell. Returns the
    /// newline-joined title and URL columns. Extra citations without a date
    /// reuse the last date given.
    pub fn resolve_cell(&self, citation_cell: &str, date_cell: &str, label: &str) -> (String, String) {
        let citations = split_lines(citation_cell);
        if citations.is_empty() {
            return (String::new(), String::new());
        }
        let mut dates = split_lines(date_cell);
        let last = dates.last().cloned().unwrap_or_default();
        while dates.len() < citations.len() {
            dates.push(last.clone());
        }

        let mut titles = Vec::with_capacity(citations.len());
        let mut urls = Vec::with_capacity(citations.len());
        for (citation, date) in citations.iter().zip(&dates) {
            match self.resolve(citation, date) {
                Ok(Some(doc)) => {
                    println!(
                        "{} Found: {} -> {}",
                        label,
                        citation,
                        doc.document_number.as_deref().unwrap_or("?")
                    );
                    titles.push(doc.title.clone().unwrap_or_default());
                    urls.push(doc.html_link());
                }
                Ok(None) => {
                    println!("{} Could not find: {}", label, citation);
                    titles.push(NOT_FOUND.to_string());
                    urls.push(String::new());
                }
                Err(err) => {
                    warn!(citation = %citation, error = %err, "lookup failed");
                    println!("{} Could not find: {}", label, citation);
                    titles.push(NOT_FOUND.to_string());
                    urls.push(String::new());
                }
            }
            self.pacer.wait();
        }
        (titles.join("\n"), urls.join("\n"))
    }
}

fn first_page_match(results: &[FrDocument], page: &str, citation: &str) -> Option<FrDocument> {
    let mut matches = results
        .iter()
        .filter(|d| d.start_page_str().as_deref() == Some(page));
    let first = matches.next()?;
    let extra = matches.count();
    if extra > 0 {
        warn!(
            citation,
            picked = first.document_number.as_deref().unwrap_or("?"),
            extra,
            "multiple documents share this start page, using the first"
        );
    }
    Some(first.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    /// Canned results keyed by (agency, date); records every call.
    #[derive(Default)]
    struct FakeSearch {
        results: HashMap<(String, String), Vec<FrDocument>>,
        calls: RefCell<Vec<(String, String)>>,
    }

    impl FakeSearch {
        fn with(mut self, agency: &str, date: &str, docs: Vec<FrDocument>) -> Self {
            self.results.insert((agency.to_string(), date.to_string()), docs);
            self
        }
    }

    impl DocumentSearch for FakeSearch {
        fn search(&self, agency: &str, iso_date: &str) -> Result<Vec<FrDocument>, CitationError> {
            self.calls.borrow_mut().push((agency.to_string(), iso_date.to_string()));
            Ok(self
                .results
                .get(&(agency.to_string(), iso_date.to_string()))
                .cloned()
                .unwrap_or_default())
        }
    }

    fn doc(number: &str, page: Value) -> FrDocument {
        FrDocument {
            title: Some(format!("Rule {}", number)),
            document_number: Some(number.to_string()),
            start_page: Some(page),
            body_html_url: Some(format!("https://www.federalregister.gov/full_text/{}.html", number)),
            ..Default::default()
        }
    }

    const DARS: &str = "defense-acquisition-regulations-system";
    const DOD: &str = "defense-department";

    #[test]
    fn citation_parts() {
        let c = parse_citation("88 FR 73238").unwrap();
        assert_eq!(c.volume, "88");
        assert_eq!(c.page, "73238");
        assert!(parse_citation("88 F.R. 73238").is_err());
        assert!(parse_citation("88 FR 1 FR 2").is_err());
    }

    #[test]
    fn start_page_number_or_string() {
        assert_eq!(doc("a", serde_json::json!(73238)).start_page_str().as_deref(), Some("73238"));
        assert_eq!(doc("a", serde_json::json!("73238")).start_page_str().as_deref(), Some("73238"));
        assert_eq!(doc("a", Value::Null).start_page_str(), None);
    }

    #[test]
    fn matches_exact_page_in_primary_agency() {
        let search = FakeSearch::default().with(
            DARS,
            "2023-12-26",
            vec![doc("2023-28001", serde_json::json!(73200)), doc("2023-28002", serde_json::json!(73238))],
        );
        let resolver = Resolver::new(&search, &Settings::default(), Pacer::none());
        let found = resolver.resolve("88 FR 73238", "12/26/23").unwrap().unwrap();
        assert_eq!(found.document_number.as_deref(), Some("2023-28002"));
        assert_eq!(search.calls.borrow().len(), 1);
    }

    #[test]
    fn falls_back_to_department() {
        let search = FakeSearch::default().with(DOD, "2024-06-27", vec![doc("2024-13863", serde_json::json!(53700))]);
        let resolver = Resolver::new(&search, &Settings::default(), Pacer::none());
        let found = resolver.resolve("89 FR 53700", "06/27/2024").unwrap();
        assert!(found.is_some());
        let calls = search.calls.borrow();
        assert_eq!(calls[0].0, DARS);
        assert_eq!(calls[1].0, DOD);
    }

    #[test]
    fn bad_inputs_do_not_query() {
        let search = FakeSearch::default();
        let resolver = Resolver::new(&search, &Settings::default(), Pacer::none());
        assert!(matches!(resolver.resolve("garbage", "12/26/23"), Err(CitationError::Citation(_))));
        assert!(matches!(resolver.resolve("88 FR 1", "Dec 26"), Err(CitationError::Date(_))));
        assert!(search.calls.borrow().is_empty());
    }

    #[test]
    fn multi_value_cell_reuses_last_date() {
        let search = FakeSearch::default().with(
            DARS,
            "2023-12-26",
            vec![doc("2023-28002", serde_json::json!(73238))],
        );
        let resolver = Resolver::new(&search, &Settings::default(), Pacer::none());
        let (titles, urls) = resolver.resolve_cell("88 FR 73238\n88 FR 99999", "12/26/23", "[1/1]");
        assert_eq!(titles, "Rule 2023-28002\nNot Found");
        assert_eq!(urls, "https://www.federalregister.gov/full_text/2023-28002.html\n");
        assert!(search.calls.borrow().iter().all(|(_, d)| d == "2023-12-26"));
    }

    #[test]
    fn empty_cell_makes_no_requests() {
        let search = FakeSearch::default();
        let resolver = Resolver::new(&search, &Settings::default(), Pacer::none());
        assert_eq!(resolver.resolve_cell("  ", "", "[1/1]"), (String::new(), String::new()));
        assert!(search.calls.borrow().is_empty());
    }

    #[test]
    fn each_citation_is_paced() {
        let search = FakeSearch::default().with(
            DARS,
            "2023-12-26",
            vec![doc("2023-28002", serde_json::json!(73238))],
        );
        let resolver = Resolver::new(&search, &Settings::default(), Pacer::new(30));

        let start = Instant::now();
        resolver.resolve_cell("88 FR 73238\n88 FR 99999", "12/26/23", "[1/1]");
        assert!(start.elapsed() >= Duration::from_millis(60));

        let start = Instant::now();
        resolver.resolve_cell("", "12/26/23", "[1/1]");
        assert!(start.elapsed() < Duration::from_millis(30));
    }

    #[test]
    fn html_link_prefers_body() {
        let mut d = doc("x", serde_json::json!(1));
        d.html_url = Some("https://example.com/x".into());
        assert!(d.html_link().contains("full_text"));
        d.body_html_url = Some(String::new());
        assert_eq!(d.html_link(), "https://example.com/x");
    }
}
