//! Stage 4: affected DFARS sections per tracker row, plus a per-section
//! detail table.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use ndaa_dfars::sections::{self, DETAIL_HEADERS, SUMMARY_COLUMN};
use ndaa_dfars::table::{write_records, Table};
use ndaa_dfars::Settings;
use tracing::info;

fn main() -> Result<()> {
    ndaa_dfars::init_tracing();
    let settings = Settings::load();
    info!(settings = ?settings, "Starting section extraction");

    let csv_path = settings.rationale_csv();
    let mut table = Table::read(&csv_path)?;
    println!("Found {} rows in {}\n", table.len(), csv_path.display());

    let pb = ProgressBar::new(table.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("#>-"),
    );
    pb.set_message("Extracting DFARS sections");
    let report = sections::extract_table(&table, &settings.html_dir, &pb);
    pb.finish_and_clear();

    table.set_column(SUMMARY_COLUMN, report.summary);
    let output = settings.sections_csv();
    table.write(&output)?;
    println!("Wrote {} with '{}' column.", output.display(), SUMMARY_COLUMN);

    let detail = settings.changes_csv();
    write_records(&detail, &DETAIL_HEADERS, &report.details)?;
    println!("Wrote {} rows to {}", report.details.len(), detail.display());

    println!("\n   Processed: {} / {} rows with data", report.processed, table.len());
    if !report.skipped.is_empty() {
        println!("   Skipped {} document IDs:", report.skipped.len());
        for s in &report.skipped {
            println!("     - {}", s);
        }
    }
    Ok(())
}
