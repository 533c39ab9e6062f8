use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::{info, warn};

use crate::model::ContactRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalOutcome {
    Added,
    Updated,
}

/// Contacts kept as one JSON array on disk, one entry per key.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents; a missing or unreadable file is an empty collection.
    pub fn load(&self) -> Vec<ContactRecord> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Could not read {}: {}, starting empty", self.path.display(), e);
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!("{} is not a contacts array ({}), starting empty", self.path.display(), e);
                Vec::new()
            }
        }
    }

    /// Last write wins: an existing key has its fields replaced in place,
    /// a new key is appended.
    pub fn upsert(&self, record: &ContactRecord) -> Result<LocalOutcome> {
        let mut records = self.load();

        let outcome = match records.iter_mut().find(|r| r.key == record.key) {
            Some(existing) => {
                *existing = record.clone();
                LocalOutcome::Updated
            }
            None => {
                records.push(record.clone());
                LocalOutcome::Added
            }
        };

        self.save(&records)?;
        match outcome {
            LocalOutcome::Updated => info!("Local: data for key {} updated", record.key),
            LocalOutcome::Added => info!("Local: data for key {} added", record.key),
        }
        Ok(outcome)
    }

    /// Replace the file atomically: readers see the old or the new array, never half of one.
    fn save(&self, records: &[ContactRecord]) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let body = to_pretty_json(records)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

/// Pretty JSON with 4-space indent; non-ASCII is written as-is.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    Ok(buf)
}
