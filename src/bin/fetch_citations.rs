//! Stage 2: resolve each FRN citation to a Federal Register document.

use anyhow::Result;
use ndaa_dfars::citations::{FederalRegisterClient, Resolver};
use ndaa_dfars::http::{self, Pacer};
use ndaa_dfars::table::Table;
use ndaa_dfars::Settings;
use tracing::info;

fn main() -> Result<()> {
    ndaa_dfars::init_tracing();
    let settings = Settings::load();
    info!(settings = ?settings, "Starting citation lookup");

    let mut table = Table::read(&settings.tracker_csv())?;
    let search = FederalRegisterClient::new(http::client(&settings)?, &settings.fr_api_url);
    let resolver = Resolver::new(&search, &settings, Pacer::new(settings.request_delay_ms));

    let total = table.len();
    println!("Starting lookup for {} rows...\n", total);

    let mut titles = Vec::with_capacity(total);
    let mut urls = Vec::with_capacity(total);
    for idx in 0..total {
        let label = format!("[{}/{}]", idx + 1, total);
        let (title, url) = resolver.resolve_cell(
            table.value(idx, "frn_citation"),
            table.value(idx, "fr_date"),
            &label,
        );
        titles.push(title);
        urls.push(url);
    }

    table.set_column("fr_title", titles);
    table.set_column("fr_body_html_url", urls);

    let out = settings.rationale_csv();
    table.write(&out)?;
    println!("\nDone! Results saved to {}", out.display());
    Ok(())
}
