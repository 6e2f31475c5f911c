//! Blocking HTTP client shared by the network stages.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;

use crate::Settings;

const USER_AGENT: &str = concat!("ndaa_dfars/", env!("CARGO_PKG_VERSION"));

pub fn client(settings: &Settings) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to create HTTP client")
}

/// Fixed client-side pacing between requests.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    delay: Duration,
}

impl Pacer {
    pub fn new(delay_ms: u64) -> Self {
        Pacer {
            delay: Duration::from_millis(delay_ms),
        }
    }

    pub fn none() -> Self {
        Pacer::new(0)
    }

    pub fn wait(&self) {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }
}
