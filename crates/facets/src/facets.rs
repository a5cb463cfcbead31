//! High-level facet computation over a Vitrine [`Database`].
//!
//! Every visualization component (list, table, timeline, map) asks the
//! same questions: which values does a property take across the currently
//! visible items, how many items carry each value, and what are the bounds
//! of a numeric property. This crate answers them once, on top of the core
//! query surface, so view code never touches the indices directly.
//!
//! # Usage
//!
//! ```
//! use serde_json::json;
//! use vitrine::Database;
//! use vitrine_facets::{value_facet, Browser};
//!
//! let mut database = Database::new();
//! database.load_data(
//!     &json!({
//!         "items": [
//!             { "label": "Paris", "type": "City", "country": "France" },
//!             { "label": "Lyon", "type": "City", "country": "France" },
//!             { "label": "Lagos", "type": "City", "country": "Nigeria" }
//!         ]
//!     }),
//!     "http://example.org/",
//! );
//!
//! let countries = value_facet(&database, "country", None);
//! assert_eq!(countries[0].value, "France");
//! assert_eq!(countries[0].count, 2);
//!
//! let mut browser = Browser::new(database);
//! browser.add_value_filter("country", "France");
//! assert_eq!(browser.visible_items().len(), 2);
//! ```

use vitrine::{Database, Set};

/// One row of a value facet: a distinct object value and how many items in
/// the pool carry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetValue {
    pub value: String,
    pub count: usize,
}

/// Bounds of a numeric/date facet over the current pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeFacet {
    /// Smallest indexed value across all items.
    pub min: f64,
    /// Largest indexed value across all items.
    pub max: f64,
    /// Items in the pool whose value falls inside `[min, max]`.
    pub count: usize,
}

/// Distinct values of `property` across the item pool, with per-item counts,
/// sorted by descending count then value.
///
/// `restriction` narrows the pool ("items already matching the other
/// facets"); `None` means the whole database.
pub fn value_facet(
    database: &Database,
    property: &str,
    restriction: Option<&Set>,
) -> Vec<FacetValue> {
    let pool = match restriction {
        Some(set) => set.clone(),
        None => database.get_all_items(),
    };
    let values = database.get_objects_union(&pool, property, None);

    let mut facet = Vec::with_capacity(values.len());
    values.visit(|value| {
        let count = database.count_distinct_subjects(value, property, Some(&pool));
        facet.push(FacetValue {
            value: value.to_string(),
            count,
        });
    });
    facet.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    facet
}

/// Bounds and population of a numeric/date property. `None` when the
/// property is unknown or its range index is empty (text-valued properties,
/// including auto-created ones, have empty indices by contract).
pub fn range_facet(
    database: &Database,
    property: &str,
    restriction: Option<&Set>,
) -> Option<RangeFacet> {
    let index = database.range_index(property)?;
    if index.is_empty() {
        return None;
    }
    let min = index.min();
    let max = index.max();
    let matching = database.get_subjects_in_range(property, min, max, true, restriction);
    Some(RangeFacet {
        min,
        max,
        count: matching.len(),
    })
}

/// Items in `pool` whose `property` includes `value`.
pub fn apply_value_filter(database: &Database, property: &str, value: &str, pool: &Set) -> Set {
    database.get_subjects(value, property, Some(pool))
}

/// Items in `pool` whose `property` value falls in `[min, max)`, or
/// `[min, max]` when `inclusive`.
pub fn apply_range_filter(
    database: &Database,
    property: &str,
    min: f64,
    max: f64,
    inclusive: bool,
    pool: &Set,
) -> Set {
    database.get_subjects_in_range(property, min, max, inclusive, Some(pool))
}

#[derive(Debug, Clone)]
enum Filter {
    Value {
        property: String,
        value: String,
    },
    Range {
        property: String,
        min: f64,
        max: f64,
        inclusive: bool,
    },
}

/// A browsing session: a database plus an ordered stack of applied facet
/// filters.
///
/// The visible item set is recomputed on demand by successive restriction
/// from the full item set, in filter application order: each filter sees
/// only the items that survived the previous ones.
pub struct Browser {
    database: Database,
    filters: Vec<Filter>,
}

impl Browser {
    pub fn new(database: Database) -> Self {
        Self {
            database,
            filters: Vec::new(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Mutable access for loading more data mid-session.
    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.database
    }

    pub fn add_value_filter(&mut self, property: &str, value: &str) {
        self.filters.push(Filter::Value {
            property: property.to_string(),
            value: value.to_string(),
        });
    }

    pub fn add_range_filter(&mut self, property: &str, min: f64, max: f64, inclusive: bool) {
        self.filters.push(Filter::Range {
            property: property.to_string(),
            min,
            max,
            inclusive,
        });
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    /// Items surviving every applied filter, in range/insertion order of the
    /// last restriction.
    pub fn visible_items(&self) -> Set {
        let mut visible = self.database.get_all_items();
        for filter in &self.filters {
            visible = match filter {
                Filter::Value { property, value } => {
                    apply_value_filter(&self.database, property, value, &visible)
                }
                Filter::Range {
                    property,
                    min,
                    max,
                    inclusive,
                } => apply_range_filter(&self.database, property, *min, *max, *inclusive, &visible),
            };
            if visible.is_empty() {
                break;
            }
        }
        visible
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn city_db() -> Database {
        let mut db = Database::new();
        db.load_data(
            &json!({
                "properties": {
                    "population": { "valueType": "number" }
                },
                "items": [
                    { "label": "Paris", "type": "City", "country": "France",
                      "population": 2148000 },
                    { "label": "Lyon", "type": "City", "country": "France",
                      "population": 513000 },
                    { "label": "Lagos", "type": "City", "country": "Nigeria",
                      "population": 14862000 }
                ]
            }),
            "http://example.org/",
        );
        db
    }

    #[test]
    fn value_facet_counts_and_sorts() {
        let db = city_db();
        let countries = value_facet(&db, "country", None);
        assert_eq!(
            countries,
            vec![
                FacetValue { value: "France".to_string(), count: 2 },
                FacetValue { value: "Nigeria".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn value_facet_respects_restriction() {
        let db = city_db();
        let pool: Set = ["Lagos", "Lyon"].into_iter().collect();
        let countries = value_facet(&db, "country", Some(&pool));
        assert_eq!(
            countries,
            vec![
                FacetValue { value: "France".to_string(), count: 1 },
                FacetValue { value: "Nigeria".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn range_facet_bounds_and_count() {
        let db = city_db();
        let facet = range_facet(&db, "population", None).unwrap();
        assert_eq!(facet.min, 513000.0);
        assert_eq!(facet.max, 14862000.0);
        assert_eq!(facet.count, 3);

        let pool: Set = ["Paris"].into_iter().collect();
        let restricted = range_facet(&db, "population", Some(&pool)).unwrap();
        assert_eq!(restricted.count, 1);
        assert_eq!(restricted.min, 513000.0, "bounds stay global");
    }

    #[test]
    fn range_facet_is_none_for_text_properties() {
        let db = city_db();
        assert!(range_facet(&db, "country", None).is_none());
        assert!(range_facet(&db, "no-such-property", None).is_none());
    }

    #[test]
    fn browser_applies_filters_in_order() {
        let mut browser = Browser::new(city_db());
        browser.add_value_filter("country", "France");
        assert_eq!(browser.visible_items().to_vec(), vec!["Paris", "Lyon"]);

        browser.add_range_filter("population", 1_000_000.0, f64::INFINITY, false);
        assert_eq!(browser.visible_items().to_vec(), vec!["Paris"]);

        browser.clear_filters();
        assert_eq!(browser.visible_items().len(), 3);
    }

    #[test]
    fn contradictory_filters_yield_empty_not_error() {
        let mut browser = Browser::new(city_db());
        browser.add_value_filter("country", "France");
        browser.add_value_filter("country", "Nigeria");
        assert!(browser.visible_items().is_empty());
    }
}
