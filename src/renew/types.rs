///! Data types for the renewal workflow.

use chrono::NaiveDate;
use thiserror::Error;

use crate::session::SessionError;

/// A dynamic-DNS hostname entry discovered on the provider console.
/// Created fresh each run; insertion order is page display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    /// Provider-visible hostname, unique within a run.
    pub name: String,
    /// Remaining validity in days, once the rescrape phase has read it.
    pub expiration_days: Option<u32>,
}

impl Host {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expiration_days: None,
        }
    }
}

/// Result of one complete renewal run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub renewed_count: usize,
    pub next_run_date: Option<NaiveDate>,
    pub succeeded: bool,
}

/// Failures that abort a renewal run.
#[derive(Debug, Error)]
pub enum RenewError {
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Zero host rows on the management page is a scraping failure, not an
    /// empty account.
    #[error("no hosts or host table rows not found")]
    EmptyHostList,

    /// An expiration label was present but carried no integer token.
    #[error("expiration days label does not match the expected pattern in iteration {iteration}")]
    ScrapeFormat { iteration: usize },

    #[error("could not decode the account password")]
    BadCredentials(#[source] anyhow::Error),

    #[error("no expiration data collected")]
    NoExpirations,
}
