//! Stage 5: attach NDAA section text to the detail table, in place.

use anyhow::Result;
use ndaa_dfars::statute::{self, StatuteLookup};
use ndaa_dfars::table::Table;
use ndaa_dfars::Settings;
use tracing::info;

fn main() -> Result<()> {
    ndaa_dfars::init_tracing();
    let settings = Settings::load();
    info!(settings = ?settings, "Starting NDAA text join");

    let path = settings.changes_csv();
    let mut table = Table::read(&path)?;
    println!("Read {} rows from {}", table.len(), path.display());

    let mut lookup = StatuteLookup::new(&settings.ndaa_dir);
    let report = statute::join_statute_text(&mut table, &mut lookup);
    println!(
        "\nResults: {} found, {} not found out of {} unique pairs",
        report.found, report.not_found, report.pairs
    );

    table.write(&path)?;
    println!("\nWrote {} rows to {}", table.len(), path.display());
    Ok(())
}
