use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::browser::WebDriver;
use crate::config::Settings;
use crate::input::{self, SearchList};
use crate::pipeline::{Pipeline, RunStats};
use crate::store::{Firestore, JsonFileStore, Sinks};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerStatus {
    Done,
    /// The request itself was unusable; nothing was run.
    Invalid,
    Failed,
}

#[derive(Debug, Clone)]
pub struct TriggerOutcome {
    pub status: TriggerStatus,
    pub message: String,
}

impl TriggerOutcome {
    fn new(status: TriggerStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn ok(&self) -> bool {
        self.status == TriggerStatus::Done
    }
}

/// Scrape everything in the configured search list.
///
/// The browser session and the remote client live exactly as long as the run.
pub async fn run_job(settings: &Settings) -> Result<RunStats> {
    let queries = input::load_queries(&settings.input);
    if queries.is_empty() {
        info!("No searches in {}, nothing to scrape", settings.input.display());
        return Ok(RunStats::default());
    }

    let remote = match &settings.firestore_project {
        Some(project) => {
            info!("Remote sink: Firestore project {}", project);
            Some(Firestore::new(project, settings.firestore_token.clone())?)
        }
        None => {
            info!("No Firestore project configured, remote sink disabled");
            None
        }
    };
    let sinks = Sinks::new(JsonFileStore::new(&settings.output), remote);

    let browser = WebDriver::connect(&settings.webdriver_url, settings.headless)
        .await
        .with_context(|| format!("Failed to start a browser session at {}", settings.webdriver_url))?;

    let stats = Pipeline::new(&browser, &sinks, settings).run(&queries).await;

    if let Err(e) = browser.close().await {
        warn!("Failed to close browser session: {}", e);
    }
    Ok(stats)
}

/// Validate a trigger request and write it out as the search list.
/// Returns the number of locations written.
pub fn prepare(category: &str, locations: &[String], settings: &Settings) -> Result<usize, TriggerOutcome> {
    let category = category.trim();
    let locations: Vec<String> = locations
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    if category.is_empty() || locations.is_empty() {
        return Err(TriggerOutcome::new(
            TriggerStatus::Invalid,
            "Category and at least one location are required.",
        ));
    }

    let list = SearchList::for_locations(category, &locations);
    input::write_search_list(&settings.input, &list).map_err(|e| {
        TriggerOutcome::new(TriggerStatus::Failed, format!("Could not write search list: {e:#}"))
    })?;
    info!("Search list written: '{}' in {} locations", category, locations.len());
    Ok(locations.len())
}

/// Write the search list for `category` × `locations`, then run it to completion.
pub async fn start(category: &str, locations: &[String], settings: &Settings) -> TriggerOutcome {
    let count = match prepare(category, locations, settings) {
        Ok(n) => n,
        Err(outcome) => return outcome,
    };
    let category = category.trim();

    match run_job(settings).await {
        Ok(stats) => TriggerOutcome::new(
            TriggerStatus::Done,
            format!(
                "Search for '{}' in {} locations finished: {} contacts saved, {} searches abandoned.",
                category, count, stats.saved, stats.abandoned
            ),
        ),
        Err(e) => TriggerOutcome::new(
            TriggerStatus::Failed,
            format!("Search configured, but scraping failed: {e:#}"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SearchQuery;
    use crate::store::local::tests::temp_dir;

    fn settings_in(tag: &str) -> Settings {
        let dir = temp_dir(tag);
        Settings {
            input: dir.join("inputs/search_list.json"),
            output: dir.join("output/contacts.json"),
            ..Settings::default()
        }
    }

    #[test]
    fn blank_requests_are_rejected_without_writing() {
        let settings = settings_in("trigger_blank");
        let err = prepare("  ", &["Curitiba".into()], &settings).unwrap_err();
        assert_eq!(err.status, TriggerStatus::Invalid);
        let err = prepare("Padaria", &["   ".into()], &settings).unwrap_err();
        assert_eq!(err.status, TriggerStatus::Invalid);
        assert!(!settings.input.exists());
    }

    #[test]
    fn prepare_writes_trimmed_search_list() {
        let settings = settings_in("trigger_write");
        let n = prepare(" Padaria ", &["Curitiba, PR".into(), "".into(), " Ivaí ".into()], &settings).unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            input::load_queries(&settings.input),
            vec![SearchQuery::new("Padaria", "Curitiba, PR"), SearchQuery::new("Padaria", "Ivaí")]
        );
    }

    #[tokio::test]
    async fn start_writes_search_list_then_reports_run_failure() {
        let settings = Settings {
            webdriver_url: "http://127.0.0.1:1".into(),
            ..settings_in("trigger_no_driver")
        };
        let outcome = start("Padaria", &["Curitiba".into()], &settings).await;

        assert_eq!(outcome.status, TriggerStatus::Failed);
        assert!(!outcome.ok());
        assert!(outcome.message.starts_with("Search configured, but scraping failed"));
        assert!(outcome.message.contains("http://127.0.0.1:1"));
        assert_eq!(input::load_queries(&settings.input), vec![SearchQuery::new("Padaria", "Curitiba")]);
    }

    #[tokio::test]
    async fn empty_search_list_runs_without_a_browser() {
        // No WebDriver is listening in tests; an empty list must not need one.
        let settings = settings_in("trigger_noop");
        let stats = run_job(&settings).await.unwrap();
        assert_eq!(stats, RunStats::default());
    }
}
