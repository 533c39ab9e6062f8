use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

use crate::config::COLLECTION;
use crate::model::{ContactDocument, ContactRecord};

const FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("document {0} already exists")]
    AlreadyExists(String),
    #[error("remote store rejected credentials ({0})")]
    Unauthorized(StatusCode),
    #[error("remote store returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    Created,
    /// A document already existed; nothing was written.
    Skipped,
}

/// Keyed document collection. Documents are never overwritten.
pub trait RemoteStore {
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, RemoteError>> + Send;

    /// Create a document; fails with `AlreadyExists` when the key is taken.
    fn create(
        &self,
        key: &str,
        doc: &ContactDocument,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

/// First write wins: an existing document is left untouched.
pub async fn upsert_remote<R: RemoteStore + Sync>(
    store: &R,
    record: &ContactRecord,
) -> Result<RemoteOutcome, RemoteError> {
    if store.exists(&record.key).await? {
        info!("Remote: data for key {} already exists (skipping update)", record.key);
        return Ok(RemoteOutcome::Skipped);
    }

    match store.create(&record.key, &record.document()).await {
        Ok(()) => {
            info!("Remote: data for key {} added", record.key);
            Ok(RemoteOutcome::Created)
        }
        Err(RemoteError::AlreadyExists(_)) => {
            info!("Remote: key {} was created concurrently (skipping update)", record.key);
            Ok(RemoteOutcome::Skipped)
        }
        Err(e) => Err(e),
    }
}

/// Firestore over its REST API.
pub struct Firestore {
    client: reqwest::Client,
    documents_url: String,
    collection: String,
    token: Option<String>,
}

impl Firestore {
    pub fn new(project: &str, token: Option<String>) -> Result<Self, RemoteError> {
        // The emulator speaks plain HTTP and ignores auth
        let base = match std::env::var("FIRESTORE_EMULATOR_HOST") {
            Ok(host) if !host.is_empty() => format!("http://{host}/v1"),
            _ => FIRESTORE_URL.to_string(),
        };
        Self::with_base_url(&base, project, token)
    }

    pub fn with_base_url(base: &str, project: &str, token: Option<String>) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            documents_url: format!(
                "{}/projects/{}/databases/(default)/documents",
                base.trim_end_matches('/'),
                project
            ),
            collection: COLLECTION.to_string(),
            token,
        })
    }

    fn document_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.documents_url, self.collection, key)
    }

    fn create_url(&self, key: &str) -> String {
        format!("{}/{}?documentId={}", self.documents_url, self.collection, key)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }
}

impl RemoteStore for Firestore {
    async fn exists(&self, key: &str) -> Result<bool, RemoteError> {
        let resp = self.authorize(self.client.get(self.document_url(key))).send().await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(status_error(s, resp).await),
        }
    }

    async fn create(&self, key: &str, doc: &ContactDocument) -> Result<(), RemoteError> {
        let resp = self
            .authorize(self.client.post(self.create_url(key)))
            .json(&firestore_fields(doc))
            .send()
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(RemoteError::AlreadyExists(key.to_string())),
            s => Err(status_error(s, resp).await),
        }
    }
}

async fn status_error(status: StatusCode, resp: reqwest::Response) -> RemoteError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return RemoteError::Unauthorized(status);
    }
    let body = resp.text().await.unwrap_or_default();
    RemoteError::Status { status, body }
}

/// Firestore wire format: every field is a typed value.
fn firestore_fields(doc: &ContactDocument) -> Value {
    json!({
        "fields": {
            "name": { "stringValue": doc.name },
            "address": { "stringValue": doc.address },
            "phone": { "stringValue": doc.phone },
            "category": { "stringValue": doc.category },
        }
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;

    /// In-process collection; `fail` makes every call error out.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub docs: Mutex<BTreeMap<String, ContactDocument>>,
        pub fail: bool,
    }

    impl MemoryStore {
        pub(crate) fn failing() -> Self {
            Self { fail: true, ..Default::default() }
        }

        fn check(&self) -> Result<(), RemoteError> {
            if self.fail {
                return Err(RemoteError::Unauthorized(StatusCode::FORBIDDEN));
            }
            Ok(())
        }
    }

    impl RemoteStore for MemoryStore {
        async fn exists(&self, key: &str) -> Result<bool, RemoteError> {
            self.check()?;
            Ok(self.docs.lock().unwrap().contains_key(key))
        }

        async fn create(&self, key: &str, doc: &ContactDocument) -> Result<(), RemoteError> {
            self.check()?;
            let mut docs = self.docs.lock().unwrap();
            if docs.contains_key(key) {
                return Err(RemoteError::AlreadyExists(key.to_string()));
            }
            docs.insert(key.to_string(), doc.clone());
            Ok(())
        }
    }

    fn record(name: &str) -> ContactRecord {
        ContactRecord {
            key: "11912345678".into(),
            name: name.into(),
            address: "Rua A, 123".into(),
            phone: "(11) 91234-5678".into(),
            category: "Padaria".into(),
        }
    }

    #[tokio::test]
    async fn first_write_wins() {
        let store = MemoryStore::default();
        assert_eq!(upsert_remote(&store, &record("First")).await.unwrap(), RemoteOutcome::Created);
        assert_eq!(upsert_remote(&store, &record("Second")).await.unwrap(), RemoteOutcome::Skipped);

        let docs = store.docs.lock().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs["11912345678"].name, "First");
    }

    #[tokio::test]
    async fn failures_surface_to_caller() {
        let err = upsert_remote(&MemoryStore::failing(), &record("x")).await;
        assert!(matches!(err, Err(RemoteError::Unauthorized(_))));
    }

    /// Another writer creates the document between `exists` and `create`.
    struct RacedStore;

    impl RemoteStore for RacedStore {
        async fn exists(&self, _key: &str) -> Result<bool, RemoteError> {
            Ok(false)
        }

        async fn create(&self, key: &str, _doc: &ContactDocument) -> Result<(), RemoteError> {
            Err(RemoteError::AlreadyExists(key.to_string()))
        }
    }

    #[tokio::test]
    async fn create_conflict_counts_as_skipped() {
        let out = upsert_remote(&RacedStore, &record("Late")).await.unwrap();
        assert_eq!(out, RemoteOutcome::Skipped);
    }

    #[test]
    fn firestore_urls() {
        let fs = Firestore::with_base_url("http://localhost:8080/v1/", "demo", None).unwrap();
        assert_eq!(
            fs.document_url("119"),
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents/contacts/119"
        );
        assert!(fs.create_url("119").ends_with("/documents/contacts?documentId=119"));
    }

    #[test]
    fn document_body_has_no_key() {
        let body = firestore_fields(&record("Padaria Central").document());
        assert_eq!(body["fields"]["name"]["stringValue"], "Padaria Central");
        assert_eq!(body["fields"]["phone"]["stringValue"], "(11) 91234-5678");
        assert!(body["fields"].get("key").is_none());
    }
}
