use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::SearchQuery;
use crate::store::local::to_pretty_json;

/// `inputs/search_list.json`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SearchList {
    #[serde(default)]
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Category label
    pub name: String,
    /// Free-text location appended to the search
    pub city: String,
}

impl SearchList {
    /// One segment per location, all with the same category.
    pub fn for_locations(category: &str, locations: &[String]) -> Self {
        Self {
            segments: locations
                .iter()
                .map(|city| Segment {
                    name: category.to_string(),
                    city: city.clone(),
                })
                .collect(),
        }
    }

    pub fn queries(&self) -> Vec<SearchQuery> {
        self.segments
            .iter()
            .map(|s| SearchQuery::new(s.name.clone(), s.city.clone()))
            .collect()
    }
}

/// Queries of the search list; missing or malformed files yield none.
pub fn load_queries(path: &Path) -> Vec<SearchQuery> {
    info!("Loading search list from {}", path.display());
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Input file {} not readable: {}", path.display(), e);
            return Vec::new();
        }
    };
    match serde_json::from_str::<SearchList>(&raw) {
        Ok(list) => list.queries(),
        Err(e) => {
            warn!("Could not decode {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

pub fn write_search_list(path: &Path, list: &SearchList) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    fs::write(path, to_pretty_json(list)?).with_context(|| format!("Failed to write {}", path.display()))
}
