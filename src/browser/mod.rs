pub mod webdriver;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

pub use webdriver::WebDriver;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },
    #[error("no element matches {0}")]
    NoSuchElement(String),
    #[error("result #{index} is gone (only {count} rendered)")]
    StaleIndex { index: usize, count: usize },
    #[error("webdriver error {status}: {message}")]
    Protocol { status: u16, message: String },
    #[error("unexpected script result: {0}")]
    Script(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type BrowserResult<T> = Result<T, BrowserError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(s: impl Into<String>) -> Self {
        Locator::Css(s.into())
    }

    pub fn xpath(s: impl Into<String>) -> Self {
        Locator::XPath(s.into())
    }

    pub fn query(&self) -> &str {
        match self {
            Locator::Css(q) | Locator::XPath(q) => q,
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(q) => write!(f, "css `{q}`"),
            Locator::XPath(q) => write!(f, "xpath `{q}`"),
        }
    }
}

/// Scroll geometry of a container, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollMetrics {
    pub scroll_top: u64,
    pub scroll_height: u64,
    pub client_height: u64,
}

impl ScrollMetrics {
    pub fn reached_bottom(&self) -> bool {
        self.scroll_top + self.client_height >= self.scroll_height
    }
}

/// What the pipeline needs from a browser engine.
///
/// Element indices are positional and resolved on every call; nothing here
/// holds on to a live element across calls.
pub trait Browser {
    fn goto(&self, url: &str) -> impl Future<Output = BrowserResult<()>> + Send;

    fn wait_visible(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> impl Future<Output = BrowserResult<()>> + Send;

    /// Click the first match, clear it and type `text`.
    fn fill(&self, locator: &Locator, text: &str) -> impl Future<Output = BrowserResult<()>> + Send;

    fn press_enter(&self, locator: &Locator) -> impl Future<Output = BrowserResult<()>> + Send;

    fn count(&self, locator: &Locator) -> impl Future<Output = BrowserResult<usize>> + Send;

    fn click_nth(&self, locator: &Locator, index: usize) -> impl Future<Output = BrowserResult<()>> + Send;

    /// Visible text of every match, in document order.
    fn texts(&self, locator: &Locator) -> impl Future<Output = BrowserResult<Vec<String>>> + Send;

    /// Text of the first match, or `None` when it is absent or hidden.
    fn visible_text(&self, locator: &Locator) -> impl Future<Output = BrowserResult<Option<String>>> + Send;

    fn scroll_metrics(&self, container: &str) -> impl Future<Output = BrowserResult<ScrollMetrics>> + Send;

    fn scroll_by(&self, container: &str, step: u32) -> impl Future<Output = BrowserResult<()>> + Send;
}
