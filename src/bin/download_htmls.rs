//! Stage 3: download every resolved document's HTML once.

use std::fs;

use anyhow::{Context, Result};
use ndaa_dfars::fetch::{self, plan_downloads};
use ndaa_dfars::http::{self, Pacer};
use ndaa_dfars::table::Table;
use ndaa_dfars::Settings;
use tracing::info;

fn main() -> Result<()> {
    ndaa_dfars::init_tracing();
    let settings = Settings::load();
    info!(settings = ?settings, "Starting HTML download");

    let table = Table::read(&settings.rationale_csv())?;
    fs::create_dir_all(&settings.html_dir)
        .with_context(|| format!("Failed to create {:?}", settings.html_dir))?;

    let plan = plan_downloads(table.column("fr_body_html_url"), &settings.html_dir);
    println!(
        "Downloading {} unique HTML files to {}/\n",
        plan.len(),
        settings.html_dir.display()
    );

    let client = http::client(&settings)?;
    let stats = fetch::download_all(&client, &plan, Pacer::new(settings.request_delay_ms));
    info!(skipped = stats.skipped, "cached files reused");
    println!("\nDone! {} downloaded, {} failed.", stats.success, stats.failed);
    Ok(())
}
