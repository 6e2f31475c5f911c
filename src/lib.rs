//! NDAA / DFARS amendment pipeline.
//!
//! Five batch stages, each its own binary, chained through CSV files:
//!   1. `parse_tracker`    tracker PDF -> final-rule citations
//!   2. `fetch_citations`  citations -> Federal Register documents
//!   3. `download_htmls`   document URLs -> local HTML cache
//!   4. `extract_sections` cached HTML -> affected DFARS sections
//!   5. `add_ndaa_text`    (year, section) -> NDAA statute text

pub mod citations;
pub mod fetch;
pub mod http;
pub mod sections;
pub mod settings;
pub mod statute;
pub mod table;
pub mod tracker;
pub mod utils;

pub use settings::Settings;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .try_init();
}
