use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::browser::Locator;

pub const INPUT_FILE: &str = "inputs/search_list.json";
pub const OUTPUT_FILE: &str = "output/contacts.json";
pub const MAPS_URL: &str = "https://www.google.com/maps";
pub const WEBDRIVER_URL: &str = "http://localhost:9515";
pub const COLLECTION: &str = "contacts";
pub const MAX_ATTEMPTS: u32 = 3;

const RESULTS_CONTAINER: &str = "#QA0Szd > div > div > div.w6VYqd > div.bJzME.tTVLSc > div > div.e07Vkf.kA9KIf > div > div > div.m6QErb.DxyBCb.kA9KIf.dS8AEf.XiKgde.ecceSd > div.m6QErb.DxyBCb.kA9KIf.dS8AEf.XiKgde.ecceSd";

/// Fixed waits standing in for readiness signals on the map page.
#[derive(Debug, Clone)]
pub struct Timings {
    /// Pause after submitting the search.
    pub search_settle: Duration,
    /// Pause after opening a result's details panel.
    pub detail_settle: Duration,
    /// Wait before retrying a failed navigation.
    pub retry_delay: Duration,
    /// Upper bound for element visibility waits.
    pub element_timeout: Duration,
    pub scroll_step: u32,
    pub scroll_delay: Duration,
    pub max_scroll_steps: usize,
    pub max_scroll_duration: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            search_settle: Duration::from_secs(4),
            detail_settle: Duration::from_secs(3),
            retry_delay: Duration::from_secs(5),
            element_timeout: Duration::from_secs(10),
            scroll_step: 800,
            scroll_delay: Duration::from_millis(5000),
            max_scroll_steps: 200,
            max_scroll_duration: Duration::from_secs(600),
        }
    }
}

impl Timings {
    /// No waits at all; used by tests driving scripted browsers.
    #[cfg(test)]
    pub fn instant() -> Self {
        Self {
            search_settle: Duration::ZERO,
            detail_settle: Duration::ZERO,
            retry_delay: Duration::ZERO,
            element_timeout: Duration::ZERO,
            scroll_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Where things live on the map-search page.
#[derive(Debug, Clone)]
pub struct Selectors {
    pub search_box: Locator,
    pub results_marker: Locator,
    pub result_card: Locator,
    pub detail_fragments: Locator,
    pub name_heading: Locator,
    pub category_button: Locator,
    /// CSS selector of the scrollable results list (queried from script).
    pub results_container: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            search_box: Locator::css("#searchboxinput"),
            results_marker: Locator::css(".hfpxzc"),
            result_card: Locator::xpath("//div[contains(@class,'Nv2PK')]"),
            detail_fragments: Locator::xpath(
                "//div[contains(@class, 'm6QErb')]//div[contains(@class, 'AeaXub')]/div[contains(@class, 'rogA2c')]/div[contains(@class, 'Io6YTe')]",
            ),
            name_heading: Locator::xpath("//div[contains(@class, 'm6QErb')]//h1[contains(@class, 'lfPIob')]"),
            category_button: Locator::xpath("//div[contains(@class, 'm6QErb')]//button[contains(@class, 'DkEaL')]"),
            results_container: RESULTS_CONTAINER.to_string(),
        }
    }
}

/// Global command-line options, shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct SettingsArgs {
    /// Search list read by `run` and written by `search`
    #[arg(long, global = true, env = "MAPS_INPUT", default_value = INPUT_FILE)]
    pub input: PathBuf,
    /// Contacts JSON file
    #[arg(long, global = true, env = "MAPS_OUTPUT", default_value = OUTPUT_FILE)]
    pub output: PathBuf,
    /// WebDriver endpoint (chromedriver, geckodriver)
    #[arg(long, global = true, env = "WEBDRIVER_URL", default_value = WEBDRIVER_URL)]
    pub webdriver: String,
    /// Show the browser window
    #[arg(long, global = true)]
    pub headful: bool,
    /// Firestore project id; the remote sink is off when unset
    #[arg(long, global = true, env = "FIRESTORE_PROJECT")]
    pub firestore_project: Option<String>,
    /// OAuth bearer token for Firestore, e.g. from `gcloud auth print-access-token`
    #[arg(long, global = true, env = "FIRESTORE_TOKEN", hide_env_values = true)]
    pub firestore_token: Option<String>,
    /// Safety bound on results-list scroll steps
    #[arg(long, global = true, default_value = "200")]
    pub max_scroll_steps: usize,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub input: PathBuf,
    pub output: PathBuf,
    pub webdriver_url: String,
    pub headless: bool,
    pub maps_url: String,
    pub firestore_project: Option<String>,
    pub firestore_token: Option<String>,
    pub timings: Timings,
    pub selectors: Selectors,
}

impl Settings {
    pub fn from_args(args: &SettingsArgs) -> Self {
        let timings = Timings {
            max_scroll_steps: args.max_scroll_steps,
            ..Timings::default()
        };
        Self {
            input: args.input.clone(),
            output: args.output.clone(),
            webdriver_url: args.webdriver.clone(),
            headless: !args.headful,
            maps_url: MAPS_URL.to_string(),
            firestore_project: args.firestore_project.clone().filter(|p| !p.trim().is_empty()),
            firestore_token: args.firestore_token.clone().filter(|t| !t.trim().is_empty()),
            timings,
            selectors: Selectors::default(),
        }
    }

    /// CSV export lands next to the contacts file.
    pub fn csv_path(&self) -> PathBuf {
        self.output.with_extension("csv")
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input: PathBuf::from(INPUT_FILE),
            output: PathBuf::from(OUTPUT_FILE),
            webdriver_url: WEBDRIVER_URL.to_string(),
            headless: true,
            maps_url: MAPS_URL.to_string(),
            firestore_project: None,
            firestore_token: None,
            timings: Timings::default(),
            selectors: Selectors::default(),
        }
    }
}
