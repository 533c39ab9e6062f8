use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::Settings;
use crate::job::{self, TriggerStatus};
use crate::store::export;
use crate::store::JsonFileStore;

const INDEX_HTML: &str = include_str!("../web/index.html");

#[derive(Clone)]
struct AppState {
    settings: Arc<Settings>,
    /// Held for the whole scrape; the contacts file is read-modify-write.
    job: Arc<Mutex<()>>,
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    #[serde(default, alias = "segmento")]
    category: String,
    #[serde(default, alias = "locais")]
    locations: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    status: &'static str,
    message: String,
}

fn message(code: StatusCode, message: impl Into<String>) -> Response {
    let status = if code.is_success() { "success" } else { "error" };
    (code, Json(ApiMessage { status, message: message.into() })).into_response()
}

pub fn router(settings: Settings) -> Router {
    let state = AppState {
        settings: Arc::new(settings),
        job: Arc::new(Mutex::new(())),
    };
    Router::new()
        .route("/", get(index))
        .route("/api/start_scraping", post(start_scraping))
        .route("/api/contacts", get(contacts))
        .route("/api/download_csv", get(download_csv))
        .with_state(state)
}

pub async fn serve(settings: Settings, bind: SocketAddr) -> Result<()> {
    let app = router(settings);
    info!("Web UI listening on http://{}", bind);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Runs the scrape on its own task; one job at a time.
///
/// The task owns the job lock and runs to completion even if the client goes away.
async fn start_scraping(State(state): State<AppState>, Json(req): Json<StartRequest>) -> Response {
    let Ok(guard) = state.job.clone().try_lock_owned() else {
        return message(StatusCode::CONFLICT, "A scraping job is already running.");
    };

    let settings = state.settings.clone();
    let task = tokio::spawn(async move {
        let outcome = job::start(&req.category, &req.locations, &settings).await;
        drop(guard);
        outcome
    });

    let outcome = match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Scraping task panicked: {}", e);
            return message(StatusCode::INTERNAL_SERVER_ERROR, "Scraping job crashed.");
        }
    };
    let code = match outcome.status {
        TriggerStatus::Done => StatusCode::OK,
        TriggerStatus::Invalid => StatusCode::BAD_REQUEST,
        TriggerStatus::Failed => {
            error!("Scraping job failed: {}", outcome.message);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    message(code, outcome.message)
}

/// The contacts file exactly as stored, or `[]` before the first run.
async fn contacts(State(state): State<AppState>) -> Response {
    match tokio::fs::read(&state.settings.output).await {
        Ok(raw) => ([(header::CONTENT_TYPE, "application/json")], raw).into_response(),
        Err(e) if e.kind() == ErrorKind::NotFound => Json(Vec::<serde_json::Value>::new()).into_response(),
        Err(e) => message(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Could not read {}: {}", state.settings.output.display(), e),
        ),
    }
}

async fn download_csv(State(state): State<AppState>) -> Response {
    let records = JsonFileStore::new(&state.settings.output).load();
    if records.is_empty() {
        return message(StatusCode::NOT_FOUND, "No data to export.");
    }
    match export::to_csv(&records) {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"contacts.csv\""),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => message(StatusCode::INTERNAL_SERVER_ERROR, format!("CSV export failed: {e:#}")),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use axum::body::to_bytes;

    use super::*;
    use crate::store::local::tests::temp_dir;

    fn state(tag: &str) -> AppState {
        let dir = temp_dir(tag);
        AppState {
            settings: Arc::new(Settings {
                input: dir.join("inputs/search_list.json"),
                output: dir.join("output/contacts.json"),
                ..Settings::default()
            }),
            job: Arc::new(Mutex::new(())),
        }
    }

    async fn body(resp: Response) -> Vec<u8> {
        to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    const SAMPLE: &str = r#"[
    {
        "key": "11912345678",
        "name": "Padaria Central",
        "address": "Rua A, 123",
        "phone": "(11) 91234-5678",
        "category": "Padaria"
    }
]"#;

    #[tokio::test]
    async fn contacts_before_first_run_is_empty_list() {
        let resp = contacts(State(state("srv_empty"))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(resp).await, b"[]");
    }

    #[tokio::test]
    async fn contacts_are_served_as_stored() {
        let st = state("srv_raw");
        fs::create_dir_all(st.settings.output.parent().unwrap()).unwrap();
        fs::write(&st.settings.output, SAMPLE).unwrap();

        let resp = contacts(State(st)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(resp).await, SAMPLE.as_bytes());
    }

    #[tokio::test]
    async fn csv_download() {
        let st = state("srv_csv");
        let resp = download_csv(State(st.clone())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        fs::create_dir_all(st.settings.output.parent().unwrap()).unwrap();
        fs::write(&st.settings.output, SAMPLE).unwrap();
        let resp = download_csv(State(st)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/csv; charset=utf-8");
        let text = String::from_utf8(body(resp).await).unwrap();
        assert!(text.contains("key,name,address,phone,category"));
        assert!(text.contains("11912345678,Padaria Central"));
    }

    #[tokio::test]
    async fn invalid_start_request_is_bad_request() {
        let req: StartRequest = serde_json::from_str(r#"{"segmento": "Padaria", "locais": []}"#).unwrap();
        let resp = start_scraping(State(state("srv_bad")), Json(req)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn dropped_request_still_finishes_the_job() {
        let st = state("srv_dropped");
        let settings = Settings {
            webdriver_url: "http://127.0.0.1:1".into(),
            ..(*st.settings).clone()
        };
        let st = AppState { settings: Arc::new(settings), ..st };
        let req = StartRequest { category: "Padaria".into(), locations: vec!["Curitiba".into()] };

        // Polled once, long enough to take the lock and spawn the job, then dropped.
        let handler = start_scraping(State(st.clone()), Json(req));
        tokio::select! {
            biased;
            _ = handler => panic!("handler returned before the job ran"),
            _ = std::future::ready(()) => {}
        }
        assert!(st.job.try_lock().is_err());

        let released = tokio::time::timeout(Duration::from_secs(10), async {
            while st.job.try_lock().is_err() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(released.is_ok(), "job lock was never released");
        assert!(st.settings.input.exists());
    }

    #[tokio::test]
    async fn second_job_is_rejected_while_one_runs() {
        let st = state("srv_busy");
        let _running = st.job.clone().try_lock_owned().unwrap();
        let req = StartRequest { category: "Padaria".into(), locations: vec!["Curitiba".into()] };

        let resp = start_scraping(State(st.clone()), Json(req)).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert!(!st.settings.input.exists());
    }
}
