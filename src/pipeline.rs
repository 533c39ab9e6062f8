use std::fmt;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::browser::{Browser, BrowserError, ScrollMetrics};
use crate::config::{Settings, MAX_ATTEMPTS};
use crate::extract::{self, AddressRule, DetailPanel, FirstFragment};
use crate::loader::{self, LoadPolicy, ResultsList};
use crate::model::SearchQuery;
use crate::store::{upsert_remote, LocalOutcome, RemoteOutcome, RemoteStore, Sinks};

/// Where a search attempt was when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Navigating,
    Searching,
    WaitingResults,
    Loading,
    /// Reading the result count; per-result failures never reach the retry loop.
    Counting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Navigating => "navigating",
            Stage::Searching => "searching",
            Stage::WaitingResults => "waiting for results",
            Stage::Loading => "loading results",
            Stage::Counting => "counting results",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    pub source: BrowserError,
}

fn at(stage: Stage) -> impl FnOnce(BrowserError) -> StageError {
    move |source| StageError { stage, source }
}

/// Counters for one run over the search list.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub queries: usize,
    pub abandoned: usize,
    /// Retry waits taken across all queries.
    pub retries: usize,
    pub partial_loads: usize,
    pub results: usize,
    pub saved: usize,
    pub updated: usize,
    pub no_phone: usize,
    pub failed: usize,
    pub remote_created: usize,
    pub remote_skipped: usize,
    pub remote_errors: usize,
}

impl RunStats {
    pub fn print(&self) {
        println!(
            "Searched {} queries ({} abandoned, {} retries), {} results seen.",
            self.queries, self.abandoned, self.retries, self.results,
        );
        println!(
            "Saved {} contacts ({} updated), {} without phone, {} errors.",
            self.saved, self.updated, self.no_phone, self.failed,
        );
        if self.remote_created + self.remote_skipped + self.remote_errors > 0 {
            println!(
                "Remote: {} added, {} already present, {} errors.",
                self.remote_created, self.remote_skipped, self.remote_errors,
            );
        }
    }
}

enum RemoteStatus {
    Disabled,
    Done(RemoteOutcome),
    Failed,
}

enum ResultOutcome {
    NoPhone(Option<String>),
    Saved { local: LocalOutcome, remote: RemoteStatus },
}

/// Drives the browser through every query and reconciles what it finds into the sinks.
pub struct Pipeline<'a, B, R, A = FirstFragment> {
    browser: &'a B,
    sinks: &'a Sinks<R>,
    settings: &'a Settings,
    rule: A,
}

impl<'a, B, R> Pipeline<'a, B, R>
where
    B: Browser + Sync,
    R: RemoteStore + Sync,
{
    pub fn new(browser: &'a B, sinks: &'a Sinks<R>, settings: &'a Settings) -> Self {
        Self {
            browser,
            sinks,
            settings,
            rule: FirstFragment,
        }
    }
}

impl<'a, B, R, A> Pipeline<'a, B, R, A>
where
    B: Browser + Sync,
    R: RemoteStore + Sync,
    A: AddressRule + Sync,
{
    pub fn with_address_rule<A2: AddressRule + Sync>(self, rule: A2) -> Pipeline<'a, B, R, A2> {
        Pipeline {
            browser: self.browser,
            sinks: self.sinks,
            settings: self.settings,
            rule,
        }
    }

    /// Process every query in order. Failures never escape a single query.
    pub async fn run(&self, queries: &[SearchQuery]) -> RunStats {
        let mut stats = RunStats::default();
        if queries.is_empty() {
            info!("Search list is empty, nothing to do");
            return stats;
        }

        for (i, query) in queries.iter().enumerate() {
            info!("[{}/{}] Searching '{}'", i + 1, queries.len(), query.search_text());
            self.run_query(query, &mut stats).await;
            stats.queries += 1;
        }

        info!("Scraping finished");
        stats
    }

    async fn run_query(&self, query: &SearchQuery, stats: &mut RunStats) {
        let text = query.search_text();
        let mut attempt = 0;

        let count = loop {
            attempt += 1;
            info!("Attempt {}/{}: searching '{}'", attempt, MAX_ATTEMPTS, text);
            match self.open_results(&text, stats).await {
                Ok(count) => break count,
                Err(e) => {
                    warn!("Attempt {}/{} for '{}': {}", attempt, MAX_ATTEMPTS, text, e);
                    if attempt >= MAX_ATTEMPTS {
                        error!(
                            "Failed to load search results after {} attempts for '{}', skipping to next search",
                            MAX_ATTEMPTS, text
                        );
                        stats.abandoned += 1;
                        return;
                    }
                    stats.retries += 1;
                    tokio::time::sleep(self.settings.timings.retry_delay).await;
                }
            }
        };

        info!("Collecting details for '{}': {} results", text, count);
        self.enumerate(query, count, stats).await;
    }

    /// Navigate, search, wait for the list and load it fully. Returns the result count.
    async fn open_results(&self, text: &str, stats: &mut RunStats) -> Result<usize, StageError> {
        let s = &self.settings.selectors;
        let t = &self.settings.timings;

        self.browser
            .goto(&self.settings.maps_url)
            .await
            .map_err(at(Stage::Navigating))?;

        self.browser
            .wait_visible(&s.search_box, t.element_timeout)
            .await
            .map_err(at(Stage::Searching))?;
        self.browser.fill(&s.search_box, text).await.map_err(at(Stage::Searching))?;
        self.browser.press_enter(&s.search_box).await.map_err(at(Stage::Searching))?;
        tokio::time::sleep(t.search_settle).await;

        self.browser
            .wait_visible(&s.results_marker, t.element_timeout)
            .await
            .map_err(at(Stage::WaitingResults))?;

        let list = ResultsList::new(self.browser, &s.results_container);
        let loaded = loader::load_all(&list, &LoadPolicy::from(t), ScrollMetrics::reached_bottom)
            .await
            .map_err(at(Stage::Loading))?;
        if !loaded.complete {
            stats.partial_loads += 1;
        }

        self.browser
            .count(&s.result_card)
            .await
            .map_err(at(Stage::Counting))
    }

    async fn enumerate(&self, query: &SearchQuery, count: usize, stats: &mut RunStats) {
        let pb = ProgressBar::new(count as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        pb.set_message(query.location.clone());

        // Positions are re-resolved on every click; the list may have re-rendered.
        for index in 0..count {
            stats.results += 1;
            match self.process_result(query, index).await {
                Ok(ResultOutcome::NoPhone(name)) => {
                    stats.no_phone += 1;
                    info!(
                        "Result {}: '{}' - no valid phone number found",
                        index + 1,
                        name.as_deref().unwrap_or(extract::NAME_PLACEHOLDER)
                    );
                }
                Ok(ResultOutcome::Saved { local, remote }) => {
                    stats.saved += 1;
                    if local == LocalOutcome::Updated {
                        stats.updated += 1;
                    }
                    match remote {
                        RemoteStatus::Done(RemoteOutcome::Created) => stats.remote_created += 1,
                        RemoteStatus::Done(RemoteOutcome::Skipped) => stats.remote_skipped += 1,
                        RemoteStatus::Failed => stats.remote_errors += 1,
                        RemoteStatus::Disabled => {}
                    }
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!("Error processing result {}: {:#}", index + 1, e);
                }
            }
            pb.inc(1);
        }

        pb.finish_and_clear();
    }

    async fn process_result(&self, query: &SearchQuery, index: usize) -> Result<ResultOutcome> {
        let s = &self.settings.selectors;

        self.browser
            .click_nth(&s.result_card, index)
            .await
            .context("Failed to open result")?;
        tokio::time::sleep(self.settings.timings.detail_settle).await;

        let panel = self.read_panel().await.context("Failed to read details panel")?;
        let Some(record) = extract::extract_contact(&panel, &query.category, &self.rule) else {
            return Ok(ResultOutcome::NoPhone(panel.name));
        };

        let local = self.sinks.local.upsert(&record)?;

        let remote = match &self.sinks.remote {
            None => RemoteStatus::Disabled,
            Some(store) => match upsert_remote(store, &record).await {
                Ok(outcome) => RemoteStatus::Done(outcome),
                Err(e) => {
                    warn!("Error saving key {} to remote store: {}", record.key, e);
                    RemoteStatus::Failed
                }
            },
        };

        Ok(ResultOutcome::Saved { local, remote })
    }

    async fn read_panel(&self) -> Result<DetailPanel, BrowserError> {
        let s = &self.settings.selectors;
        Ok(DetailPanel {
            fragments: self.browser.texts(&s.detail_fragments).await?,
            name: self.browser.visible_text(&s.name_heading).await?,
            category: self.browser.visible_text(&s.category_button).await?,
        })
    }
}
