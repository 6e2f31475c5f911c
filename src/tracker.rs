//! DFARS NDAA Implementation Tracker: PDF table rows -> final-rule citations.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::utils::truncate;

/// Words separated by single spaces; two or more spaces end a cell.
static FRAGMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+(?: \S+)*").unwrap());

/// pdftotext may start centered or right-aligned text a little left of
/// its column header.
const COLUMN_SLACK: usize = 2;

pub const MIN_COLUMNS: usize = 17;

pub const HEADERS: [&str; 8] = [
    "ndaa_year",
    "ndaa_section",
    "paragraph",
    "section_title",
    "status",
    "case_number",
    "frn_citation",
    "fr_date",
];

const YEAR_SENTINELS: &[&str] = &["NDAA Year", "Column 1", "Column1", ""];
const SECTION_SENTINELS: &[&str] = &["NDAA Section", "Column2", ""];
const CITATION_SENTINELS: &[&str] = &["FRN Citation", "Column15", "Final Rule"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerRow {
    pub ndaa_year: String,
    pub ndaa_section: String,
    pub paragraph: String,
    pub section_title: String,
    pub status: String,
    pub case_number: String,
    pub frn_citation: String,
    pub fr_date: String,
}

/// Anything that can hand back the tracker's table rows, page by page.
pub trait TableSource {
    fn rows(&self) -> Result<Vec<Vec<String>>>;
}

/// Table rows recovered from `pdftotext -layout` output, see
/// [`split_layout_text`].
pub struct PdfTextTable {
    pdf: PathBuf,
    bin: String,
}

impl PdfTextTable {
    pub fn new(pdf: &Path, bin: &str) -> Self {
        PdfTextTable {
            pdf: pdf.to_path_buf(),
            bin: bin.to_string(),
        }
    }
}

impl TableSource for PdfTextTable {
    fn rows(&self) -> Result<Vec<Vec<String>>> {
        let output = Command::new(&self.bin)
            .arg("-layout")
            .arg(&self.pdf)
            .arg("-")
            .output()
            .with_context(|| format!("Failed to run {} on {:?}", self.bin, self.pdf))?;
        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.bin,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let rows = split_layout_text(&text);
        info!(pdf = ?self.pdf, rows = rows.len(), "extracted table rows");
        Ok(rows)
    }
}

/// Text fragments of a layout line with their character offsets.
fn fragments(line: &str) -> Vec<(usize, &str)> {
    FRAGMENT_RE
        .find_iter(line)
        .map(|m| (line[..m.start()].chars().count(), m.as_str()))
        .collect()
}

/// Column start offsets, taken from the table's header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutColumns {
    starts: Vec<usize>,
}

impl LayoutColumns {
    /// A header line has a label in every column and no fiscal year up front.
    pub fn from_header(line: &str) -> Option<Self> {
        let frags = fragments(line);
        if frags.len() < MIN_COLUMNS || frags[0].1.starts_with("FY") {
            return None;
        }
        Some(LayoutColumns {
            starts: frags.iter().map(|(start, _)| *start).collect(),
        })
    }

    fn column_of(&self, offset: usize) -> usize {
        self.starts
            .iter()
            .rposition(|&start| start <= offset + COLUMN_SLACK)
            .unwrap_or(0)
    }

    /// One cell per column; blank columns stay empty.
    pub fn place(&self, line: &str) -> Vec<String> {
        let mut cells = vec![String::new(); self.starts.len()];
        for (offset, text) in fragments(line) {
            let cell = &mut cells[self.column_of(offset)];
            if !cell.is_empty() {
                cell.push(' ');
            }
            cell.push_str(text);
        }
        cells
    }
}

fn append_cells(row: &mut [String], cells: Vec<String>) {
    for (cell, more) in row.iter_mut().zip(cells) {
        if more.is_empty() {
            continue;
        }
        if !cell.is_empty() {
            cell.push('\n');
        }
        cell.push_str(&more);
    }
}

/// Rebuild table rows from `pdftotext -layout` text.
///
/// Column positions come from a page's header line and carry over to pages
/// without one. A line with text in the first column starts a row; any other
/// line continues the row above, joining wrapped cell text with `\n`. Blank
/// lines and page breaks close the open row. Lines before the first header
/// are dropped.
pub fn split_layout_text(text: &str) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut columns: Option<LayoutColumns> = None;

    for (page_num, page) in text.split('\x0c').enumerate() {
        let before = rows.len();
        let mut open = false;
        let mut dropped = 0usize;

        for line in page.lines() {
            let line = line.trim_end();
            if line.trim().is_empty() {
                open = false;
                continue;
            }
            if let Some(header) = LayoutColumns::from_header(line) {
                columns = Some(header);
            }
            let Some(cols) = &columns else {
                dropped += 1;
                continue;
            };

            let cells = cols.place(line);
            if !cells[0].is_empty() {
                rows.push(cells);
                open = true;
            } else if open {
                if let Some(row) = rows.last_mut() {
                    append_cells(row, cells);
                }
            } else {
                dropped += 1;
            }
        }
        debug!(page = page_num + 1, rows = rows.len() - before, dropped, "page split");
    }

    if columns.is_none() {
        warn!("no table header line found in layout text");
    }
    rows
}

/// Map one raw table row to a tracker row. `None` for short rows, repeated
/// headers, and rows without a final-rule citation.
pub fn row_from_cells(cells: &[String]) -> Option<TrackerRow> {
    if cells.len() < MIN_COLUMNS {
        return None;
    }
    let cell = |idx: usize| cells[idx].trim().to_string();
    let one_line = |idx: usize| cell(idx).replace('\n', " ");

    let ndaa_year = one_line(0).replace("FY ", "FY");
    let ndaa_section = one_line(1);
    let frn_citation = cell(14);

    if YEAR_SENTINELS.contains(&ndaa_year.as_str())
        || SECTION_SENTINELS.contains(&ndaa_section.as_str())
        || CITATION_SENTINELS.contains(&frn_citation.as_str())
    {
        return None;
    }
    if frn_citation.is_empty() {
        return None;
    }

    Some(TrackerRow {
        ndaa_year,
        ndaa_section,
        paragraph: cell(2),
        section_title: one_line(3),
        status: cell(4),
        case_number: cell(9),
        frn_citation,
        fr_date: cell(15),
    })
}

pub fn extract_final_rule_citations(source: &dyn TableSource) -> Result<Vec<TrackerRow>> {
    let rows = source.rows()?;
    Ok(rows.iter().filter_map(|r| row_from_cells(r)).collect())
}

pub fn print_summary(rows: &[TrackerRow]) {
    println!("Found {} NDAA sections with Final Rule FRN Citations\n", rows.len());
    println!(
        "{:<10} {:<10} {:<15} {:<20} {:<12} {}",
        "NDAA Year", "Section", "Case Number", "FRN Citation", "Date", "Title"
    );
    println!("{}", "-".repeat(120));
    for r in rows {
        println!(
            "{:<10} {:<10} {:<15} {:<20} {:<12} {}",
            r.ndaa_year,
            r.ndaa_section,
            r.case_number,
            r.frn_citation,
            r.fr_date,
            truncate(&r.section_title, 50)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(year: &str, section: &str, citation: &str) -> Vec<String> {
        let mut cells = vec![String::new(); MIN_COLUMNS];
        cells[0] = year.to_string();
        cells[1] = section.to_string();
        cells[2] = "(a)".to_string();
        cells[3] = "Prohibition on\ncertain contracts".to_string();
        cells[4] = "Closed".to_string();
        cells[9] = "2024-D008".to_string();
        cells[14] = citation.to_string();
        cells[15] = "12/26/23".to_string();
        cells
    }

    struct Fixed(Vec<Vec<String>>);

    impl TableSource for Fixed {
        fn rows(&self) -> Result<Vec<Vec<String>>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn maps_columns_and_normalizes_year() {
        let r = row_from_cells(&row("FY 24", "831", " 88 FR 73238 ")).unwrap();
        assert_eq!(r.ndaa_year, "FY24");
        assert_eq!(r.section_title, "Prohibition on certain contracts");
        assert_eq!(r.case_number, "2024-D008");
        assert_eq!(r.frn_citation, "88 FR 73238");
        assert_eq!(r.fr_date, "12/26/23");
    }

    #[test]
    fn skips_headers_short_rows_and_uncited() {
        assert!(row_from_cells(&row("NDAA Year", "831", "88 FR 1")).is_none());
        assert!(row_from_cells(&row("FY24", "Column2", "88 FR 1")).is_none());
        assert!(row_from_cells(&row("FY24", "831", "FRN Citation")).is_none());
        assert!(row_from_cells(&row("FY24", "831", "")).is_none());
        assert!(row_from_cells(&row("FY24", "831", "88 FR 1")[..16]).is_none());
    }

    #[test]
    fn keeps_only_cited_rows() {
        let source = Fixed(vec![
            row("NDAA Year", "NDAA Section", "FRN Citation"),
            row("FY24", "831", "88 FR 73238"),
            row("FY23", "812", ""),
            vec!["continuation".to_string()],
        ]);
        let rows = extract_final_rule_citations(&source).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ndaa_section, "831");
    }

    const WIDTH: usize = 16;

    /// A layout line with each cell padded to a fixed column width.
    fn layout(cells: &[&str]) -> String {
        cells
            .iter()
            .map(|c| format!("{:<width$}", c, width = WIDTH))
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    fn header() -> String {
        let labels: Vec<String> = (1..=MIN_COLUMNS).map(|i| format!("Column{}", i)).collect();
        let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
        layout(&refs)
    }

    fn cited_row() -> String {
        layout(&[
            "FY 24", "831", "(a)", "Mentor-protege", "Closed", "", "", "", "", "2024-D001", "", "", "", "",
            "88 FR 73238", "12/26/23", "Done",
        ])
    }

    fn continuation() -> String {
        layout(&[
            "", "", "", "program", "", "", "", "", "", "", "", "", "", "", "89 FR 1000", "01/05/24",
        ])
    }

    #[test]
    fn blank_columns_keep_their_place() {
        let text = format!("{}\n{}\n", header(), cited_row());
        let rows = split_layout_text(&text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].len(), MIN_COLUMNS);
        assert_eq!(rows[1][5], "");
        assert_eq!(rows[1][9], "2024-D001");
        assert_eq!(rows[1][14], "88 FR 73238");

        let r = row_from_cells(&rows[1]).unwrap();
        assert_eq!(r.case_number, "2024-D001");
        assert_eq!(r.fr_date, "12/26/23");
    }

    #[test]
    fn wrapped_cells_join_the_row_above() {
        let text = format!(
            "DFARS NDAA Implementation Tracker\n\n{}\n{}\n{}\n\n{}\n",
            header(),
            cited_row(),
            continuation(),
            layout(&["FY 23", "812", "", "Other", "Open"]),
        );
        let rows = split_layout_text(&text);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][14], "88 FR 73238\n89 FR 1000");

        let cited: Vec<TrackerRow> = rows.iter().filter_map(|r| row_from_cells(r)).collect();
        assert_eq!(cited.len(), 1);
        assert_eq!(cited[0].section_title, "Mentor-protege program");
        assert_eq!(cited[0].frn_citation, "88 FR 73238\n89 FR 1000");
        assert_eq!(cited[0].fr_date, "12/26/23\n01/05/24");
    }

    #[test]
    fn continuation_after_blank_line_is_dropped() {
        let text = format!("{}\n{}\n\n{}\n", header(), cited_row(), continuation());
        let rows = split_layout_text(&text);
        assert_eq!(rows[1][14], "88 FR 73238");
    }

    #[test]
    fn columns_carry_over_to_next_page() {
        let text = format!("{}\n{}\x0c{}\n", header(), cited_row(), cited_row());
        let rows = split_layout_text(&text);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2][14], "88 FR 73238");
    }

    #[test]
    fn text_slightly_left_of_header_stays_in_column() {
        let cols = LayoutColumns::from_header(&header()).unwrap();
        let line = format!("{}2024-D001", " ".repeat(WIDTH * 9 - 1));
        let cells = cols.place(&line);
        assert_eq!(cells[9], "2024-D001");
        assert!(cells[..9].iter().all(String::is_empty));
    }

    #[test]
    fn data_rows_are_not_headers() {
        assert!(LayoutColumns::from_header(&cited_row()).is_none());
        let full: Vec<&str> = vec!["FY 24"; MIN_COLUMNS];
        assert!(LayoutColumns::from_header(&layout(&full)).is_none());
    }

    #[test]
    fn no_header_no_rows() {
        assert!(split_layout_text(&cited_row()).is_empty());
    }
}
