///! Structural queries and text parsing for the hostname management pages.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::session::{ElementHandle, Locator, SessionError, WebSession};

use super::types::RenewError;

/// Substituted when a host's expiration label cannot be found; the provider
/// drops the label inside the final week.
const DEFAULT_EXPIRATION_LABEL: &str = "Expires in 7 days";

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("digit pattern"));

fn host_rows() -> Locator {
    Locator::xpath("//td[@scope='row'][contains(@class, 'overflow-wrap')]")
}

fn modify_control(host_name: &str) -> Locator {
    Locator::xpath(format!(
        "//td[contains(text(), '{host_name}')]/following-sibling::td/a[contains(text(), 'Modify')]"
    ))
}

fn expiration_label(host_name: &str) -> Locator {
    Locator::xpath(format!(
        "//a[contains(text(), '{host_name}')]/parent::td[@data-title='Host']//a[contains(@class, 'no-link-style')]"
    ))
}

/// The confirmation control shown after a host's Modify page opens.
pub fn confirm_control() -> Locator {
    Locator::css("input[value='Update Hostname']")
}

/// Page-state-dependent lookups for managed hostnames.
///
/// Element handles are only valid for the page load they were found on, so
/// every method re-queries the current page.
pub struct HostScraper<'a, S: WebSession + ?Sized> {
    session: &'a S,
}

impl<'a, S: WebSession + ?Sized> HostScraper<'a, S> {
    pub fn new(session: &'a S) -> Self {
        Self { session }
    }

    /// Display names of all host rows, in page order.
    pub fn host_names(&self) -> Result<Vec<String>, RenewError> {
        let rows = self.session.find_all(&host_rows())?;
        if rows.is_empty() {
            return Err(RenewError::EmptyHostList);
        }
        let mut names = Vec::with_capacity(rows.len());
        for row in &rows {
            names.push(self.session.text(row)?.trim().to_string());
        }
        Ok(names)
    }

    /// The "Modify" control adjacent to the named host's row.
    pub fn modify_control(&self, host_name: &str) -> Result<ElementHandle, SessionError> {
        self.session.find_one(&modify_control(host_name))
    }

    /// Remaining validity for the named host, read from the overview page.
    ///
    /// A missing label falls back to the provider's final-week default; a
    /// label without any integer token is a hard failure tagged with the
    /// iteration index.
    pub fn expiration_days(&self, host_name: &str, iteration: usize) -> Result<u32, RenewError> {
        let label = match self.session.find_one(&expiration_label(host_name)) {
            Ok(element) => self
                .session
                .text(&element)
                .unwrap_or_else(|_| DEFAULT_EXPIRATION_LABEL.to_string()),
            Err(_) => DEFAULT_EXPIRATION_LABEL.to_string(),
        };
        parse_expiration_days(&label, iteration)
    }
}

/// Extract the first integer token from a "days remaining" label.
pub fn parse_expiration_days(label: &str, iteration: usize) -> Result<u32, RenewError> {
    let digits = DIGITS
        .find(label)
        .ok_or(RenewError::ScrapeFormat { iteration })?;
    digits
        .as_str()
        .parse::<u32>()
        .map_err(|_| RenewError::ScrapeFormat { iteration })
}
