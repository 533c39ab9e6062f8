pub mod export;
pub mod local;
pub mod remote;

pub use local::{JsonFileStore, LocalOutcome};
pub use remote::{upsert_remote, Firestore, RemoteOutcome, RemoteStore};

/// Both destinations of an extracted record. The remote sink is optional:
/// without a configured project only the local file is written.
pub struct Sinks<R> {
    pub local: JsonFileStore,
    pub remote: Option<R>,
}

impl<R: RemoteStore> Sinks<R> {
    pub fn new(local: JsonFileStore, remote: Option<R>) -> Self {
        Self { local, remote }
    }
}
