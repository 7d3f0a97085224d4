//! Feed configuration.

use crate::error::{FeedError, Result};
use crate::types::Record;
use serde::{Deserialize, Serialize};

/// Default number of records exposed per page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Default minimum strict match count before the city constraint is relaxed.
pub const DEFAULT_RELAX_THRESHOLD: usize = 3;

/// Feed configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedConfig {
    /// Records added to the window per `load_more`.
    /// Default: 20
    pub page_size: usize,

    /// Field the remote collection orders by.
    /// Default: "createdAt"
    pub sort_field: String,

    /// Strict matches below this count trigger city relaxation.
    /// Default: 3
    pub relax_threshold: usize,

    /// Keep merging remote changes after the first snapshot.
    /// Default: true
    pub real_time: bool,

    /// Which record fields each filter dimension reads.
    pub fields: FieldMapping,

    /// Records failing this rule are kept out of the feed (None = keep all).
    pub status: Option<StatusRule>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            sort_field: "createdAt".to_string(),
            relax_threshold: DEFAULT_RELAX_THRESHOLD,
            real_time: true,
            fields: FieldMapping::default(),
            status: Some(StatusRule::default()),
        }
    }
}

impl FeedConfig {
    /// Parse a JSON config document; missing keys take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: FeedConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(FeedError::InvalidConfig("page_size must be at least 1".into()));
        }
        if self.sort_field.is_empty() {
            return Err(FeedError::InvalidConfig("sort_field must not be empty".into()));
        }
        Ok(())
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_relax_threshold(mut self, threshold: usize) -> Self {
        self.relax_threshold = threshold;
        self
    }

    pub fn with_real_time(mut self, real_time: bool) -> Self {
        self.real_time = real_time;
        self
    }

    pub fn without_status_rule(mut self) -> Self {
        self.status = None;
        self
    }

    /// Whether a record may appear in the feed at all.
    pub fn admits(&self, record: &Record) -> bool {
        self.status.as_ref().map_or(true, |rule| rule.admits(record))
    }
}

/// Record field names used by the filter engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldMapping {
    pub category: String,
    pub sub_category: String,
    pub city: String,
    /// Fields scanned for the free-text search term.
    pub searchable: Vec<String>,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            category: "category".to_string(),
            sub_category: "subCategory".to_string(),
            city: "location".to_string(),
            searchable: vec![
                "title".to_string(),
                "description".to_string(),
                "company".to_string(),
            ],
        }
    }
}

/// Publication status gate.
///
/// A record whose status field is absent is admitted; one whose status is
/// present and differs from `active` is not.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusRule {
    pub field: String,
    pub active: String,
}

impl Default for StatusRule {
    fn default() -> Self {
        Self {
            field: "status".to_string(),
            active: "active".to_string(),
        }
    }
}

impl StatusRule {
    pub fn admits(&self, record: &Record) -> bool {
        match record.field(&self.field) {
            None => true,
            Some(value) => value.as_str() == Some(self.active.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawRecord;
    use serde_json::json;

    fn record(data: serde_json::Value) -> Record {
        Record::from_raw(RawRecord::new("r", data), "createdAt").unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = FeedConfig::default();
        assert_eq!(config.page_size, 20);
        assert_eq!(config.relax_threshold, 3);
        assert_eq!(config.fields.city, "location");
        assert!(config.real_time);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = FeedConfig::from_json_str(r#"{"pageSize": 5, "fields": {"city": "city"}}"#)
            .unwrap();
        assert_eq!(config.page_size, 5);
        assert_eq!(config.fields.city, "city");
        assert_eq!(config.fields.category, "category");
        assert_eq!(config.sort_field, "createdAt");
    }

    #[test]
    fn test_from_json_rejects_zero_page() {
        let result = FeedConfig::from_json_str(r#"{"pageSize": 0}"#);
        assert!(matches!(result, Err(FeedError::InvalidConfig(_))));

        let result = FeedConfig::from_json_str("not json");
        assert!(matches!(result, Err(FeedError::Deserialization(_))));
    }

    #[test]
    fn test_status_rule() {
        let rule = StatusRule::default();
        assert!(rule.admits(&record(json!({"createdAt": 1}))));
        assert!(rule.admits(&record(json!({"createdAt": 1, "status": "active"}))));
        assert!(!rule.admits(&record(json!({"createdAt": 1, "status": "inactive"}))));
        assert!(!rule.admits(&record(json!({"createdAt": 1, "status": 3}))));

        let config = FeedConfig::default().without_status_rule();
        assert!(config.admits(&record(json!({"createdAt": 1, "status": "inactive"}))));
    }
}
