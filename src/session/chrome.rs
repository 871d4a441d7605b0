///! Production web session backed by headless Chrome.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};

use super::{ElementHandle, Locator, SessionError, WebSession};
use crate::config::Settings;

pub struct ChromeSession {
    tab: Arc<Tab>,
    /// Owns the browser process; dropping it tears the session down.
    _browser: Browser,
    snapshot_dir: PathBuf,
}

impl ChromeSession {
    /// Launch headless Chrome configured for the provider console.
    ///
    /// An optional proxy is taken from the `https_proxy` environment
    /// variable once at construction; absence is not an error.
    pub fn launch(settings: &Settings) -> anyhow::Result<Self> {
        let proxy = std::env::var("https_proxy").ok();
        if let Some(proxy) = &proxy {
            tracing::debug!("Using proxy server {proxy}");
        }

        let launch_options = LaunchOptions {
            headless: true,
            sandbox: false, // needed when run in docker
            window_size: Some((1200, 800)),
            proxy_server: proxy.as_deref(),
            // The compositor workaround keeps rendering alive on
            // single-board hosts.
            args: vec![OsStr::new("--disable-features=VizDisplayCompositor")],
            ..Default::default()
        };

        let browser = Browser::new(launch_options).context("Failed to launch headless browser")?;
        let tab = browser.new_tab().context("Failed to create new tab")?;
        tab.set_user_agent(&settings.user_agent, None, None)
            .context("Failed to set user agent")?;
        tab.set_default_timeout(Duration::from_secs(settings.page_load_timeout_secs));

        Ok(Self {
            tab,
            _browser: browser,
            snapshot_dir: settings.snapshot_dir.clone(),
        })
    }

    /// Element handles are node ids; the driver element is rebuilt on every
    /// interaction because it borrows the tab.
    fn element(&self, handle: &ElementHandle) -> Result<Element<'_>, SessionError> {
        Element::new(&self.tab, handle.0).map_err(SessionError::Driver)
    }
}

#[async_trait]
impl WebSession for ChromeSession {
    async fn open(&self, url: &str) -> Result<(), SessionError> {
        tracing::info!("Opening {url}...");
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(|e| {
                if e.downcast_ref::<headless_chrome::util::Timeout>().is_some() {
                    SessionError::NavigationTimeout {
                        url: url.to_string(),
                    }
                } else {
                    SessionError::Navigation {
                        url: url.to_string(),
                        source: e,
                    }
                }
            })
    }

    fn find_one(&self, locator: &Locator) -> Result<ElementHandle, SessionError> {
        let found = match locator {
            Locator::Css(query) => self.tab.find_element(query),
            Locator::XPath(query) => self.tab.find_element_by_xpath(query),
        };
        found
            .map(|element| ElementHandle(element.node_id))
            .map_err(|e| SessionError::ElementNotFound {
                locator: locator.to_string(),
                source: e,
            })
    }

    fn find_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, SessionError> {
        let found = match locator {
            Locator::Css(query) => self.tab.find_elements(query),
            Locator::XPath(query) => self.tab.find_elements_by_xpath(query),
        };
        found
            .map(|elements| {
                elements
                    .into_iter()
                    .map(|element| ElementHandle(element.node_id))
                    .collect()
            })
            .map_err(|e| SessionError::ElementNotFound {
                locator: locator.to_string(),
                source: e,
            })
    }

    fn click(&self, element: &ElementHandle) -> Result<(), SessionError> {
        self.element(element)?
            .click()
            .map(|_| ())
            .map_err(SessionError::Driver)
    }

    fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), SessionError> {
        self.element(element)?
            .type_into(text)
            .map(|_| ())
            .map_err(SessionError::Driver)
    }

    fn text(&self, element: &ElementHandle) -> Result<String, SessionError> {
        self.element(element)?
            .get_inner_text()
            .map_err(SessionError::Driver)
    }

    async fn snapshot(&self, label: &str) {
        let path = self.snapshot_dir.join(format!("{label}.png"));
        match self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
        {
            Ok(data) => {
                if let Err(e) = tokio::fs::write(&path, &data).await {
                    tracing::warn!("Failed to write snapshot {:?}: {}", path, e);
                } else {
                    tracing::debug!("Saved snapshot to {:?} ({} bytes)", path, data.len());
                }
            }
            Err(e) => {
                tracing::warn!("Failed to capture snapshot {label}: {e}");
            }
        }
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        tracing::debug!("Closing browser session");
    }
}
