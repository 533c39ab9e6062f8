use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::browser::{Browser, BrowserResult, ScrollMetrics};
use crate::config::Timings;

/// A scrollable list that renders more items as it is scrolled.
pub trait ScrollContainer {
    fn measure(&self) -> impl Future<Output = BrowserResult<ScrollMetrics>> + Send;
    fn advance(&self, step: u32) -> impl Future<Output = BrowserResult<()>> + Send;
}

/// The map results list, addressed by CSS selector through a browser.
pub struct ResultsList<'a, B> {
    browser: &'a B,
    selector: &'a str,
}

impl<'a, B: Browser> ResultsList<'a, B> {
    pub fn new(browser: &'a B, selector: &'a str) -> Self {
        Self { browser, selector }
    }
}

impl<B: Browser + Sync> ScrollContainer for ResultsList<'_, B> {
    async fn measure(&self) -> BrowserResult<ScrollMetrics> {
        self.browser.scroll_metrics(self.selector).await
    }

    async fn advance(&self, step: u32) -> BrowserResult<()> {
        self.browser.scroll_by(self.selector, step).await
    }
}

#[derive(Debug, Clone)]
pub struct LoadPolicy {
    pub step: u32,
    /// New items render asynchronously; heights read sooner are stale.
    pub delay: Duration,
    pub max_steps: usize,
    pub max_duration: Duration,
}

impl From<&Timings> for LoadPolicy {
    fn from(t: &Timings) -> Self {
        Self {
            step: t.scroll_step,
            delay: t.scroll_delay,
            max_steps: t.max_scroll_steps,
            max_duration: t.max_scroll_duration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    pub advances: usize,
    /// False when a safety bound stopped the loop before `is_loaded` held.
    pub complete: bool,
}

/// Scroll `container` until `is_loaded` holds or a bound of `policy` is hit.
pub async fn load_all<C, P>(container: &C, policy: &LoadPolicy, is_loaded: P) -> BrowserResult<LoadOutcome>
where
    C: ScrollContainer + Sync,
    P: Fn(&ScrollMetrics) -> bool + Send,
{
    let start = Instant::now();
    let mut advances = 0usize;

    loop {
        let metrics = container.measure().await?;
        debug!(?metrics, advances, "results list measured");

        if is_loaded(&metrics) {
            info!("Results list fully loaded after {} scroll steps", advances);
            return Ok(LoadOutcome { advances, complete: true });
        }

        if advances >= policy.max_steps || start.elapsed() >= policy.max_duration {
            warn!(
                "Results list still growing after {} steps ({:.1}s), enumerating what is loaded",
                advances,
                start.elapsed().as_secs_f64()
            );
            return Ok(LoadOutcome { advances, complete: false });
        }

        container.advance(policy.step).await?;
        advances += 1;
        tokio::time::sleep(policy.delay).await;
    }
}
