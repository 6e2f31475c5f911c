//! Stage 1: tracker PDF -> rows with a final-rule FRN citation.

use anyhow::{bail, Result};
use ndaa_dfars::table::write_records;
use ndaa_dfars::tracker::{self, PdfTextTable, HEADERS};
use ndaa_dfars::Settings;
use tracing::info;

fn main() -> Result<()> {
    ndaa_dfars::init_tracing();
    let settings = Settings::load();
    info!(settings = ?settings, "Starting tracker parser");

    if !settings.tracker_pdf.exists() {
        bail!("Tracker PDF not found: {:?}", settings.tracker_pdf);
    }

    let source = PdfTextTable::new(&settings.tracker_pdf, &settings.pdftotext_bin);
    let rows = tracker::extract_final_rule_citations(&source)?;
    tracker::print_summary(&rows);

    if !rows.is_empty() {
        let out = settings.tracker_csv();
        write_records(&out, &HEADERS, &rows)?;
        println!("\nResults saved to {}", out.display());
    }
    Ok(())
}
