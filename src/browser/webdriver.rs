use std::time::{Duration, Instant};

use reqwest::{Method, RequestBuilder};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{Browser, BrowserError, BrowserResult, Locator, ScrollMetrics};

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735a2e3b2a";
const ENTER_KEY: &str = "\u{E007}";
const POLL_INTERVAL: Duration = Duration::from_millis(250);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const SCROLL_METRICS_JS: &str = "const el = document.querySelector(arguments[0]);
return el ? [el.scrollTop, el.scrollHeight, el.clientHeight] : null;";
const SCROLL_BY_JS: &str = "const el = document.querySelector(arguments[0]);
if (!el) return false;
el.scrollTop += arguments[1];
return true;";

/// W3C WebDriver session (chromedriver, geckodriver, selenium).
pub struct WebDriver {
    client: reqwest::Client,
    session_url: String,
}

impl WebDriver {
    /// Open a new Chrome session on the driver at `endpoint`.
    pub async fn connect(endpoint: &str, headless: bool) -> BrowserResult<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let endpoint = endpoint.trim_end_matches('/');

        let mut args = vec!["--window-size=1280,900", "--lang=pt-BR"];
        if headless {
            args.push("--headless=new");
        }
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        });

        let value = send(client.post(format!("{endpoint}/session")).json(&capabilities)).await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Script("new session response has no sessionId".into()))?;

        info!("WebDriver session {} opened on {}", session_id, endpoint);
        Ok(Self {
            session_url: format!("{endpoint}/session/{session_id}"),
            client,
        })
    }

    /// End the session and close the browser window.
    pub async fn close(self) -> BrowserResult<()> {
        send(self.client.delete(&self.session_url)).await?;
        info!("WebDriver session closed");
        Ok(())
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> BrowserResult<Value> {
        let url = format!("{}{}", self.session_url, path);
        debug!("{} {}", method, url);
        let req = self.client.request(method, url);
        // POST commands need a JSON body even when it is empty
        let req = match body {
            Some(b) => req.json(&b),
            None => req,
        };
        send(req).await
    }

    async fn find_all(&self, locator: &Locator) -> BrowserResult<Vec<String>> {
        let value = self
            .command(Method::POST, "/elements", Some(locator_json(locator)))
            .await?;
        let ids = value
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|e| e.get(ELEMENT_KEY).and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    async fn find_first(&self, locator: &Locator) -> BrowserResult<String> {
        self.find_all(locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BrowserError::NoSuchElement(locator.to_string()))
    }

    async fn is_displayed(&self, element: &str) -> BrowserResult<bool> {
        let value = self
            .command(Method::GET, &format!("/element/{element}/displayed"), None)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn element_text(&self, element: &str) -> BrowserResult<String> {
        let value = self
            .command(Method::GET, &format!("/element/{element}/text"), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn click(&self, element: &str) -> BrowserResult<()> {
        self.command(Method::POST, &format!("/element/{element}/click"), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn send_keys(&self, element: &str, text: &str) -> BrowserResult<()> {
        self.command(
            Method::POST,
            &format!("/element/{element}/value"),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn execute(&self, script: &str, args: Value) -> BrowserResult<Value> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }
}

impl Browser for WebDriver {
    async fn goto(&self, url: &str) -> BrowserResult<()> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn wait_visible(&self, locator: &Locator, timeout: Duration) -> BrowserResult<()> {
        let start = Instant::now();
        loop {
            if let Some(el) = self.find_all(locator).await?.first() {
                if self.is_displayed(el).await? {
                    return Ok(());
                }
            }
            if start.elapsed() >= timeout {
                return Err(BrowserError::Timeout {
                    what: locator.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn fill(&self, locator: &Locator, text: &str) -> BrowserResult<()> {
        let el = self.find_first(locator).await?;
        self.click(&el).await?;
        self.command(Method::POST, &format!("/element/{el}/clear"), Some(json!({})))
            .await?;
        self.send_keys(&el, text).await
    }

    async fn press_enter(&self, locator: &Locator) -> BrowserResult<()> {
        let el = self.find_first(locator).await?;
        self.send_keys(&el, ENTER_KEY).await
    }

    async fn count(&self, locator: &Locator) -> BrowserResult<usize> {
        Ok(self.find_all(locator).await?.len())
    }

    async fn click_nth(&self, locator: &Locator, index: usize) -> BrowserResult<()> {
        let elements = self.find_all(locator).await?;
        let el = elements.get(index).ok_or(BrowserError::StaleIndex {
            index,
            count: elements.len(),
        })?;
        self.click(el).await
    }

    async fn texts(&self, locator: &Locator) -> BrowserResult<Vec<String>> {
        let mut out = Vec::new();
        for el in self.find_all(locator).await? {
            out.push(self.element_text(&el).await?);
        }
        Ok(out)
    }

    async fn visible_text(&self, locator: &Locator) -> BrowserResult<Option<String>> {
        let Some(el) = self.find_all(locator).await?.into_iter().next() else {
            return Ok(None);
        };
        if !self.is_displayed(&el).await? {
            return Ok(None);
        }
        Ok(Some(self.element_text(&el).await?))
    }

    async fn scroll_metrics(&self, container: &str) -> BrowserResult<ScrollMetrics> {
        let value = self.execute(SCROLL_METRICS_JS, json!([container])).await?;
        if value.is_null() {
            return Err(BrowserError::NoSuchElement(format!("css `{container}`")));
        }
        parse_metrics(&value)
    }

    async fn scroll_by(&self, container: &str, step: u32) -> BrowserResult<()> {
        let value = self.execute(SCROLL_BY_JS, json!([container, step])).await?;
        match value.as_bool() {
            Some(true) => Ok(()),
            _ => Err(BrowserError::NoSuchElement(format!("css `{container}`"))),
        }
    }
}

/// Send a WebDriver command and unwrap the `value` member of the response.
async fn send(req: RequestBuilder) -> BrowserResult<Value> {
    let resp = req.send().await?;
    let status = resp.status();
    let mut body: Value = resp.json().await?;
    let value = body.get_mut("value").map(Value::take).unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(value);
    }

    let error = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
    let message = value.get("message").and_then(Value::as_str).unwrap_or_default();
    Err(BrowserError::Protocol {
        status: status.as_u16(),
        message: format!("{error}: {message}"),
    })
}

fn locator_json(locator: &Locator) -> Value {
    let using = match locator {
        Locator::Css(_) => "css selector",
        Locator::XPath(_) => "xpath",
    };
    json!({ "using": using, "value": locator.query() })
}

/// Script results are JS numbers; scrollTop may be fractional.
fn parse_metrics(value: &Value) -> BrowserResult<ScrollMetrics> {
    let nums: Vec<u64> = value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_f64)
                .map(|n| n.max(0.0).round() as u64)
                .collect()
        })
        .unwrap_or_default();

    match nums.as_slice() {
        [top, height, client] => Ok(ScrollMetrics {
            scroll_top: *top,
            scroll_height: *height,
            client_height: *client,
        }),
        _ => Err(BrowserError::Script(format!("expected 3 numbers, got {value}"))),
    }
}
