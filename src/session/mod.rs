///! Abstract web session over the browser-automation driver.
///!
///! The renewal workflow needs a handful of capabilities: open a URL, find
///! and drive elements, read their display text, and capture best-effort
///! diagnostic snapshots. Keeping them behind a trait lets the state machine
///! run against a scripted fake in tests.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

pub mod chrome;

pub use chrome::ChromeSession;

/// Structural query for locating elements on the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(query: impl Into<String>) -> Self {
        Self::Css(query.into())
    }

    pub fn xpath(query: impl Into<String>) -> Self {
        Self::XPath(query.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(query) => write!(f, "css:{query}"),
            Locator::XPath(query) => write!(f, "xpath:{query}"),
        }
    }
}

/// Opaque handle to a located element. Valid until the next navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHandle(pub(crate) u32);

#[derive(Debug, Error)]
pub enum SessionError {
    /// The page did not finish loading within the driver timeout.
    /// Recoverable by policy: if the page truly never loaded, the next
    /// element lookup surfaces the real failure.
    #[error("page load timed out for {url}")]
    NavigationTimeout { url: String },

    #[error("failed to open {url}")]
    Navigation {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("element not found: {locator}")]
    ElementNotFound {
        locator: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("browser command failed: {0}")]
    Driver(#[source] anyhow::Error),
}

#[async_trait]
pub trait WebSession {
    /// Navigate the session tab to `url` and wait for the page to load.
    async fn open(&self, url: &str) -> Result<(), SessionError>;

    fn find_one(&self, locator: &Locator) -> Result<ElementHandle, SessionError>;

    /// All elements matching `locator`, in document order. May be empty.
    fn find_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, SessionError>;

    fn click(&self, element: &ElementHandle) -> Result<(), SessionError>;

    fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), SessionError>;

    /// Rendered display text of the element.
    fn text(&self, element: &ElementHandle) -> Result<String, SessionError>;

    /// Best-effort diagnostic capture; failures are logged and swallowed.
    async fn snapshot(&self, label: &str);
}
