//! Filter evaluation with city relaxation.

use crate::config::{FeedConfig, FieldMapping, DEFAULT_RELAX_THRESHOLD};
use crate::filter::spec::{FilterField, FilterSpec};
use crate::types::Record;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Records that passed a filter, in feed order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterResult {
    pub items: Vec<Record>,
    /// The items do not fully satisfy the requested spec.
    pub relaxed: bool,
    /// Which constraint was dropped.
    pub relaxed_on: Option<FilterField>,
}

impl FilterResult {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|r| r.id.as_str()).collect()
    }
}

/// One distinct value of a field and how many records carry it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    pub value: String,
    pub count: usize,
}

/// Lowercased constraints, computed once per evaluation.
struct Needles {
    category: Option<String>,
    sub_category: Option<String>,
    city: Option<String>,
    search_term: Option<String>,
}

impl Needles {
    fn from_spec(spec: &FilterSpec) -> Self {
        let lower = |f| spec.constraint(f).map(str::to_lowercase);
        Self {
            category: lower(FilterField::Category),
            sub_category: lower(FilterField::SubCategory),
            city: lower(FilterField::City),
            search_term: lower(FilterField::SearchTerm),
        }
    }
}

/// Evaluates a [`FilterSpec`] against records.
///
/// A strict pass keeps records matching every set constraint. When a city
/// is set and the strict pass finds fewer than `relax_threshold` records,
/// the city is dropped and the rest are re-applied. Output order is always
/// the input order.
#[derive(Clone, Debug)]
pub struct FilterEngine {
    fields: FieldMapping,
    relax_threshold: usize,
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self {
            fields: FieldMapping::default(),
            relax_threshold: DEFAULT_RELAX_THRESHOLD,
        }
    }
}

impl FilterEngine {
    pub fn new(fields: FieldMapping, relax_threshold: usize) -> Self {
        Self {
            fields,
            relax_threshold,
        }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(config.fields.clone(), config.relax_threshold)
    }

    pub fn relax_threshold(&self) -> usize {
        self.relax_threshold
    }

    pub fn evaluate(&self, items: &[Record], spec: &FilterSpec) -> FilterResult {
        let needles = Needles::from_spec(spec);
        let strict = self.select(items, &needles);

        if needles.city.is_none() || strict.len() >= self.relax_threshold {
            return FilterResult {
                items: strict,
                relaxed: false,
                relaxed_on: None,
            };
        }

        let widened = Needles::from_spec(&spec.without(FilterField::City));
        let relaxed = self.select(items, &widened);
        debug!(
            strict = strict.len(),
            relaxed = relaxed.len(),
            threshold = self.relax_threshold,
            "relaxed city constraint"
        );

        FilterResult {
            items: relaxed,
            relaxed: true,
            relaxed_on: Some(FilterField::City),
        }
    }

    /// Whether a record satisfies every constraint of `spec`.
    pub fn matches(&self, record: &Record, spec: &FilterSpec) -> bool {
        self.matches_needles(record, &Needles::from_spec(spec))
    }

    /// Distinct values of `field` over `items`, in order of first appearance.
    pub fn facet(&self, items: &[Record], field: FilterField) -> Vec<Facet> {
        let name = match field {
            FilterField::Category => &self.fields.category,
            FilterField::SubCategory => &self.fields.sub_category,
            FilterField::City => &self.fields.city,
            FilterField::SearchTerm => return Vec::new(),
        };

        let mut facets: Vec<Facet> = Vec::new();
        let mut slots: HashMap<&str, usize> = HashMap::new();
        for value in items.iter().filter_map(|r| r.field_str(name)) {
            if value.is_empty() {
                continue;
            }
            match slots.get(value) {
                Some(&slot) => facets[slot].count += 1,
                None => {
                    slots.insert(value, facets.len());
                    facets.push(Facet {
                        value: value.to_string(),
                        count: 1,
                    });
                }
            }
        }
        facets
    }

    fn select(&self, items: &[Record], needles: &Needles) -> Vec<Record> {
        items
            .iter()
            .filter(|r| self.matches_needles(r, needles))
            .cloned()
            .collect()
    }

    fn matches_needles(&self, record: &Record, needles: &Needles) -> bool {
        if let Some(ref category) = needles.category {
            if !field_equals(record, &self.fields.category, category) {
                return false;
            }
        }
        if let Some(ref sub_category) = needles.sub_category {
            if !field_equals(record, &self.fields.sub_category, sub_category) {
                return false;
            }
        }
        if let Some(ref city) = needles.city {
            if !field_contains(record, &self.fields.city, city) {
                return false;
            }
        }
        if let Some(ref term) = needles.search_term {
            let hit = self
                .fields
                .searchable
                .iter()
                .any(|name| field_contains(record, name, term));
            if !hit {
                return false;
            }
        }
        true
    }
}

fn field_equals(record: &Record, name: &str, needle: &str) -> bool {
    record
        .field_str(name)
        .map_or(false, |v| v.trim().to_lowercase() == needle)
}

fn field_contains(record: &Record, name: &str, needle: &str) -> bool {
    record
        .field_str(name)
        .map_or(false, |v| v.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawRecord;
    use serde_json::json;

    fn job(id: &str, ts: i64, category: &str, location: &str) -> Record {
        let raw = RawRecord::new(
            id,
            json!({
                "createdAt": ts,
                "title": format!("{} position", category),
                "description": "Full time",
                "company": "Acme",
                "category": category,
                "location": location,
            }),
        );
        Record::from_raw(raw, "createdAt").unwrap()
    }

    /// 10 records: one in city X with category Y, four more Y elsewhere,
    /// five Z elsewhere.
    fn sample() -> Vec<Record> {
        let mut items = vec![job("x1", 100, "Y", "X")];
        for i in 0..4 {
            items.push(job(&format!("y{}", i), 90 - i, "Y", "Elsewhere"));
        }
        for i in 0..5 {
            items.push(job(&format!("z{}", i), 80 - i, "Z", "Elsewhere"));
        }
        items
    }

    #[test]
    fn test_empty_spec_keeps_all() {
        let engine = FilterEngine::default();
        let items = sample();
        let result = engine.evaluate(&items, &FilterSpec::new());
        assert_eq!(result.len(), 10);
        assert!(!result.relaxed);
    }

    #[test]
    fn test_relaxes_city_below_threshold() {
        let engine = FilterEngine::default();
        let items = sample();
        let spec = FilterSpec::new().with_city("X").with_category("Y");

        let result = engine.evaluate(&items, &spec);
        assert_eq!(result.ids(), vec!["x1", "y0", "y1", "y2", "y3"]);
        assert!(result.relaxed);
        assert_eq!(result.relaxed_on, Some(FilterField::City));
    }

    #[test]
    fn test_no_relaxation_at_threshold() {
        let engine = FilterEngine::new(FieldMapping::default(), 1);
        let items = sample();
        let spec = FilterSpec::new().with_city("X").with_category("Y");

        let result = engine.evaluate(&items, &spec);
        assert_eq!(result.ids(), vec!["x1"]);
        assert!(!result.relaxed);
        assert_eq!(result.relaxed_on, None);
    }

    #[test]
    fn test_no_relaxation_without_city() {
        let engine = FilterEngine::default();
        let items = sample();
        let result = engine.evaluate(&items, &FilterSpec::new().with_category("missing"));
        assert!(result.is_empty());
        assert!(!result.relaxed);
    }

    #[test]
    fn test_relaxed_empty_still_flagged() {
        let engine = FilterEngine::default();
        let items = sample();
        let spec = FilterSpec::new().with_city("X").with_category("missing");
        let result = engine.evaluate(&items, &spec);
        assert!(result.is_empty());
        assert!(result.relaxed);
        assert_eq!(result.relaxed_on, Some(FilterField::City));
    }

    #[test]
    fn test_case_insensitive_and_city_substring() {
        let items = vec![
            job("a", 3, "Driver", "Kadıköy, Istanbul"),
            job("b", 2, "driver", "Besiktas, Istanbul"),
            job("c", 1, "DRIVER", "Cankaya, Ankara"),
        ];

        let engine = FilterEngine::new(FieldMapping::default(), 1);
        let result = engine.evaluate(
            &items,
            &FilterSpec::new().with_category("dRiVeR").with_city("ISTANBUL"),
        );
        assert_eq!(result.ids(), vec!["a", "b"]);
        assert!(!result.relaxed);

        let result = engine.evaluate(&items, &FilterSpec::new().with_city("kadıköy"));
        assert_eq!(result.ids(), vec!["a"]);

        let engine = FilterEngine::default();
        let result = engine.evaluate(&items, &FilterSpec::new().with_city("Ankara"));
        assert_eq!(result.ids(), vec!["a", "b", "c"]);
        assert!(result.relaxed);
    }

    #[test]
    fn test_search_term_scans_searchable_fields() {
        let engine = FilterEngine::default();
        let mut items = sample();
        items[3].fields.insert("company".into(), json!("Night Shift Logistics"));

        let result = engine.evaluate(&items, &FilterSpec::new().with_search_term("night shift"));
        assert_eq!(result.ids(), vec!["y2"]);

        let result = engine.evaluate(&items, &FilterSpec::new().with_search_term("z position"));
        assert_eq!(result.len(), 5);
    }

    #[test]
    fn test_missing_field_never_matches() {
        let engine = FilterEngine::default();
        let raw = RawRecord::new("bare", json!({"createdAt": 1}));
        let record = Record::from_raw(raw, "createdAt").unwrap();
        assert!(!engine.matches(&record, &FilterSpec::new().with_category("Y")));
        assert!(engine.matches(&record, &FilterSpec::new()));
    }

    #[test]
    fn test_evaluate_is_pure() {
        let engine = FilterEngine::default();
        let items = sample();
        let spec = FilterSpec::new().with_city("X").with_category("Y");
        assert_eq!(engine.evaluate(&items, &spec), engine.evaluate(&items, &spec));
    }

    #[test]
    fn test_facet_first_appearance() {
        let engine = FilterEngine::default();
        let facets = engine.facet(&sample(), FilterField::Category);
        assert_eq!(
            facets,
            vec![
                Facet { value: "Y".into(), count: 5 },
                Facet { value: "Z".into(), count: 5 },
            ]
        );
        assert!(engine.facet(&sample(), FilterField::SearchTerm).is_empty());
    }
}
