use serde::{Deserialize, Serialize};

/// Canonical contact persisted to both sinks. `key` is the digits of `phone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub category: String,
}

/// Remote document body: the record minus its key (the key is the document id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDocument {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub category: String,
}

impl ContactRecord {
    pub fn document(&self) -> ContactDocument {
        ContactDocument {
            name: self.name.clone(),
            address: self.address.clone(),
            phone: self.phone.clone(),
            category: self.category.clone(),
        }
    }
}

/// One (category, location) pair driving one search cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub category: String,
    pub location: String,
}

impl SearchQuery {
    pub fn new(category: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            location: location.into(),
        }
    }

    /// Text typed into the map search box.
    pub fn search_text(&self) -> String {
        format!("{} em {}", self.category, self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_text_joins_category_and_location() {
        let q = SearchQuery::new("Padaria", "Sao Paulo");
        assert_eq!(q.search_text(), "Padaria em Sao Paulo");
    }

    #[test]
    fn record_tolerates_missing_fields() {
        let r: ContactRecord = serde_json::from_str(r#"{"key":"123"}"#).unwrap();
        assert_eq!(r.key, "123");
        assert!(r.name.is_empty());
    }
}
