//! Small parsing helpers shared across stages.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use url::Url;

static FY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^FY(\d+)").unwrap());
static LEADING_NUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)").unwrap());

/// Parse `MM/DD/YY` or `MM/DD/YYYY` into `YYYY-MM-DD`.
pub fn parse_fr_date(date: &str) -> Option<String> {
    let date = date.trim();
    ["%m/%d/%y", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date, fmt).ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
}

/// `FY24` -> 2024, `FY10` -> 2010, `FY2024` -> 2024.
pub fn parse_fy(fy: &str) -> Option<i32> {
    let caps = FY_RE.captures(fy)?;
    let num: i32 = caps.get(1)?.as_str().parse().ok()?;
    if num < 100 {
        Some(2000 + num)
    } else {
        Some(num)
    }
}

/// `831(a)(2)` -> `831.`, `2881` -> `2881.`
pub fn parse_section_enum(section: &str) -> Option<String> {
    let caps = LEADING_NUM_RE.captures(section)?;
    Some(format!("{}.", caps.get(1)?.as_str()))
}

/// Last path segment of a URL, e.g. `2024-13863.html`.
pub fn url_to_filename(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let name = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Document id used to key the HTML cache: filename minus `.html`.
pub fn document_id_from_url(url: &str) -> Option<String> {
    let name = url_to_filename(url)?;
    let id = name.strip_suffix(".html").unwrap_or(&name);
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Split a multi-value cell on newlines, dropping blanks.
pub fn split_lines(cell: &str) -> Vec<String> {
    cell.split('\n')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
