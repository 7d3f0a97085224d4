//! Filter specification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value meaning "no constraint" for any field.
pub const ALL: &str = "all";

/// A filterable dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterField {
    Category,
    SubCategory,
    City,
    SearchTerm,
}

impl FilterField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterField::Category => "category",
            FilterField::SubCategory => "subCategory",
            FilterField::City => "city",
            FilterField::SearchTerm => "searchTerm",
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constraints a consumer places on the visible feed.
///
/// Empty strings and `"all"` are treated the same as an absent field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterSpec {
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub city: Option<String>,
    pub search_term: Option<String>,
}

impl FilterSpec {
    /// No constraints.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_sub_category(mut self, sub_category: impl Into<String>) -> Self {
        self.sub_category = Some(sub_category.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn with_search_term(mut self, term: impl Into<String>) -> Self {
        self.search_term = Some(term.into());
        self
    }

    /// The effective constraint for a field, if any.
    pub fn constraint(&self, field: FilterField) -> Option<&str> {
        let raw = match field {
            FilterField::Category => self.category.as_deref(),
            FilterField::SubCategory => self.sub_category.as_deref(),
            FilterField::City => self.city.as_deref(),
            FilterField::SearchTerm => self.search_term.as_deref(),
        };
        raw.map(str::trim)
            .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(ALL))
    }

    /// At least one field constrains the feed.
    pub fn is_active(&self) -> bool {
        [
            FilterField::Category,
            FilterField::SubCategory,
            FilterField::City,
            FilterField::SearchTerm,
        ]
        .iter()
        .any(|&f| self.constraint(f).is_some())
    }

    /// Copy with one field cleared.
    pub fn without(&self, field: FilterField) -> Self {
        let mut spec = self.clone();
        match field {
            FilterField::Category => spec.category = None,
            FilterField::SubCategory => spec.sub_category = None,
            FilterField::City => spec.city = None,
            FilterField::SearchTerm => spec.search_term = None,
        }
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_and_blank_mean_unconstrained() {
        let spec = FilterSpec::new()
            .with_category("all")
            .with_city("   ")
            .with_sub_category("ALL");
        assert!(!spec.is_active());
        assert_eq!(spec.constraint(FilterField::Category), None);
        assert_eq!(spec.constraint(FilterField::City), None);
    }

    #[test]
    fn test_constraint_trims() {
        let spec = FilterSpec::new().with_city(" Ankara ");
        assert_eq!(spec.constraint(FilterField::City), Some("Ankara"));
        assert!(spec.is_active());
        assert!(!spec.without(FilterField::City).is_active());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let spec: FilterSpec =
            serde_json::from_str(r#"{"subCategory": "waiter", "searchTerm": "night"}"#).unwrap();
        assert_eq!(spec.constraint(FilterField::SubCategory), Some("waiter"));
        assert_eq!(spec.constraint(FilterField::SearchTerm), Some("night"));
        assert_eq!(FilterField::City.to_string(), "city");
    }
}
