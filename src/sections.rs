//! Affected DFARS sections from Federal Register full-text HTML.
//!
//! A rule's regulatory text is a run of `div.section` containers, each keyed
//! by a `div.sectno-reference` anchor (`id="sectno-reference-216.102"`) and
//! introduced by a `p.amendment-part` instruction somewhere before it
//! ("2. Revise section 216.102 to read as follows:"). Sections whose subject
//! ends in `[Amended]` carry no text; their changes live in the numbered
//! instructions that follow.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use indicatif::ProgressBar;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::{debug, warn};

use crate::table::Table;
use crate::utils::{document_id_from_url, split_lines};

static SECTION: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.section").unwrap());
static SECTNO_REF: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.sectno-reference").unwrap());
static SUBJECT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.section-subject").unwrap());
static AMENDMENT_PART: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p.amendment-part").unwrap());
static SUBNUMBER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.amendment-part-subnumber").unwrap());
static SECTION_NUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Ss]ection\s+(\d{3}\.\d[\w\-\.]*)").unwrap());

const SECTNO_PREFIX: &str = "sectno-reference-";
const AMENDED_MARKER: &str = "[Amended]";

pub const SUMMARY_COLUMN: &str = "affected_dfars_sections";

pub const DETAIL_HEADERS: [&str; 7] = [
    "ndaa_year",
    "ndaa_section",
    "case_number",
    "document_id",
    "affected_dfars_section",
    "amendment_instruction",
    "content",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionChange {
    pub section: String,
    pub instruction: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmendmentRecord {
    pub ndaa_year: String,
    pub ndaa_section: String,
    pub case_number: String,
    pub document_id: String,
    pub affected_dfars_section: String,
    pub amendment_instruction: String,
    pub content: String,
}

// ── HTML helpers ──

fn has_class(el: &ElementRef, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// Non-empty stripped text nodes joined by single spaces.
fn flat_text(el: &ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn section_number(section: &ElementRef) -> Option<String> {
    let anchor = section.select(&SECTNO_REF).next()?;
    let id = anchor.value().attr("id").unwrap_or_default();
    let number = id.replace(SECTNO_PREFIX, "").trim().to_string();
    if number.is_empty() {
        None
    } else {
        Some(number)
    }
}

/// Nearest earlier sibling `amendment-part` with text.
fn preceding_instruction(section: &ElementRef) -> String {
    section
        .prev_siblings()
        .filter_map(ElementRef::wrap)
        .filter(|el| has_class(el, "amendment-part"))
        .map(|el| flat_text(&el))
        .find(|t| !t.is_empty())
        .unwrap_or_default()
}

/// Section body, minus the `sectno` header.
fn section_content(section: &ElementRef) -> String {
    section
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| !has_class(el, "sectno"))
        .map(|el| flat_text(&el))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// `p.amendment-part` elements after `start` in document order.
fn following_amendment_parts<'a>(
    doc: &'a Html,
    start: ElementRef<'a>,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    let start_id = start.id();
    doc.tree
        .root()
        .descendants()
        .skip_while(move |n| n.id() != start_id)
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "p" && has_class(el, "amendment-part"))
}

// ── [Amended] sections ──

#[derive(Debug, Clone, Default)]
struct AmendedInfo {
    instruction: String,
    content: String,
}

/// For `[Amended]` sections: the main instruction that follows the section,
/// plus any numbered sub-instructions, stopping at the next main instruction.
fn collect_amended_instructions(doc: &Html) -> HashMap<String, AmendedInfo> {
    let mut result = HashMap::new();
    for section in doc.select(&SECTION) {
        let is_amended = section
            .select(&SUBJECT)
            .next()
            .is_some_and(|s| s.text().collect::<String>().contains(AMENDED_MARKER));
        if !is_amended {
            continue;
        }
        let Some(number) = section_number(&section) else {
            continue;
        };

        let mut main = String::new();
        let mut subs = Vec::new();
        for part in following_amendment_parts(doc, section) {
            if part.select(&SUBNUMBER).next().is_some() {
                subs.push(flat_text(&part));
            } else if main.is_empty() {
                main = flat_text(&part);
            } else {
                break;
            }
        }

        result.insert(
            number,
            AmendedInfo {
                instruction: main,
                content: subs.join("\n"),
            },
        );
    }
    result
}

// ── Extraction ──

/// Every affected section in one document, first occurrence winning.
pub fn extract_sections(html: &str) -> Vec<SectionChange> {
    let doc = Html::parse_document(html);
    let amended = collect_amended_instructions(&doc);

    let mut results = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for section in doc.select(&SECTION) {
        let Some(number) = section_number(&section) else {
            continue;
        };
        if !seen.insert(number.clone()) {
            continue;
        }

        let mut instruction = preceding_instruction(&section);
        let mut content = section_content(&section);

        if content.is_empty() || content.trim() == AMENDED_MARKER {
            if let Some(info) = amended.get(&number) {
                if !info.instruction.is_empty() {
                    instruction = info.instruction.clone();
                }
                content = info.content.clone();
            }
        }

        results.push(SectionChange {
            section: number,
            instruction,
            content,
        });
    }

    if results.is_empty() {
        for part in doc.select(&AMENDMENT_PART) {
            let text = flat_text(&part);
            for caps in SECTION_NUM_RE.captures_iter(&text) {
                let number = caps[1].to_string();
                if seen.insert(number.clone()) {
                    results.push(SectionChange {
                        section: number,
                        instruction: text.clone(),
                        content: String::new(),
                    });
                }
            }
        }
        if !results.is_empty() {
            debug!(sections = results.len(), "no section containers, used instruction text");
        }
    }

    results
}

// ── Table-level pass ──

#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// One `;`-joined entry per input row.
    pub summary: Vec<String>,
    pub details: Vec<AmendmentRecord>,
    pub skipped: Vec<String>,
    pub processed: usize,
}

/// Run the extractor over every row's documents. Parsed documents are
/// memoized by id since several tracker rows often cite the same rule.
pub fn extract_table(table: &Table, html_dir: &Path, pb: &ProgressBar) -> ExtractionReport {
    let mut report = ExtractionReport::default();
    let mut parsed: HashMap<String, Option<Vec<SectionChange>>> = HashMap::new();

    for idx in 0..table.len() {
        let ndaa_year = table.value(idx, "ndaa_year");
        let ndaa_section = table.value(idx, "ndaa_section");
        let case_number = table.value(idx, "case_number");

        let mut row_sections: Vec<String> = Vec::new();
        let mut row_has_data = false;

        for url in split_lines(table.value(idx, "fr_body_html_url")) {
            let Some(doc_id) = document_id_from_url(&url) else {
                continue;
            };

            let sections = parsed
                .entry(doc_id.clone())
                .or_insert_with(|| load_document(html_dir, &doc_id));
            let Some(sections) = sections else {
                report.skipped.push(format!("{} (row {})", doc_id, idx));
                continue;
            };
            if sections.is_empty() {
                report.skipped.push(format!("{} (row {}, no sections)", doc_id, idx));
                continue;
            }

            row_has_data = true;
            for s in sections.iter() {
                if !row_sections.contains(&s.section) {
                    row_sections.push(s.section.clone());
                }
                report.details.push(AmendmentRecord {
                    ndaa_year: ndaa_year.to_string(),
                    ndaa_section: ndaa_section.to_string(),
                    case_number: case_number.to_string(),
                    document_id: doc_id.clone(),
                    affected_dfars_section: s.section.clone(),
                    amendment_instruction: s.instruction.clone(),
                    content: s.content.clone(),
                });
            }
        }

        if row_has_data {
            report.processed += 1;
        }
        report.summary.push(row_sections.join(";"));
        pb.inc(1);
    }
    report
}

/// `None` when the cached file is missing or unreadable.
fn load_document(html_dir: &Path, doc_id: &str) -> Option<Vec<SectionChange>> {
    let path = html_dir.join(format!("{}.html", doc_id));
    if !path.exists() {
        return None;
    }
    match fs::read_to_string(&path) {
        Ok(html) => Some(extract_sections(&html)),
        Err(err) => {
            warn!(path = ?path, error = %err, "could not read cached html");
            None
        }
    }
}
