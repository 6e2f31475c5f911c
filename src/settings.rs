use std::path::PathBuf;

use config::{Config, Environment};
use serde::Deserialize;
use tracing::warn;

pub const TRACKER_CSV: &str = "ndaa_final_rule_citations.csv";
pub const RATIONALE_CSV: &str = "ndaa_final_rule_with_rationale.csv";
pub const SECTIONS_CSV: &str = "ndaa_final_rule_with_dfars_sections.csv";
pub const CHANGES_CSV: &str = "ndaa_final_rule_dfars_changes.csv";

/// Paths and knobs for every stage. Defaults match the working-directory
/// layout; any field can be overridden with `NDAA_<FIELD>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub tracker_pdf: PathBuf,
    pub html_dir: PathBuf,
    pub ndaa_dir: PathBuf,
    pub pdftotext_bin: String,
    pub fr_api_url: String,
    pub primary_agency: String,
    pub fallback_agency: String,
    pub request_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            data_dir: PathBuf::from("./data"),
            tracker_pdf: PathBuf::from("./DFARS_NDAA_Implementation_Tracker.pdf"),
            html_dir: PathBuf::from("./data/fr_cases/html_from_tracker"),
            ndaa_dir: PathBuf::from("./ndaa"),
            pdftotext_bin: "pdftotext".to_string(),
            fr_api_url: "https://www.federalregister.gov/api/v1/documents.json".to_string(),
            primary_agency: "defense-acquisition-regulations-system".to_string(),
            fallback_agency: "defense-department".to_string(),
            request_delay_ms: 500,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn load() -> Self {
        Config::builder()
            .add_source(Environment::with_prefix("NDAA").try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize::<Settings>())
            .unwrap_or_else(|err| {
                warn!(error = %err, "invalid settings, falling back to defaults");
                Settings::default()
            })
    }

    pub fn tracker_csv(&self) -> PathBuf {
        self.data_dir.join(TRACKER_CSV)
    }

    pub fn rationale_csv(&self) -> PathBuf {
        self.data_dir.join(RATIONALE_CSV)
    }

    pub fn sections_csv(&self) -> PathBuf {
        self.data_dir.join(SECTIONS_CSV)
    }

    pub fn changes_csv(&self) -> PathBuf {
        self.data_dir.join(CHANGES_CSV)
    }
}
