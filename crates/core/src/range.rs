//! Sorted per-property range index.
//!
//! A [`RangeIndex`] is a sorted projection of `(value, item)` pairs for one
//! numeric- or date-valued property. It answers min/max, count-in-range, and
//! ordered visitation in logarithmic-plus-output time, which is what keeps
//! timeline and slider facets responsive as the corpus grows.
//!
//! Indices are built lazily and discarded wholesale when new item data
//! arrives for the property: a load always forces a full rebuild on the
//! next read, trading rebuild cost for load-time simplicity.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone)]
struct RangePair {
    value: f64,
    item: String,
}

/// Immutable sorted array of `(value, item)` pairs for one property.
///
/// Pairs are ordered ascending by value, ties broken by item identifier, so
/// enumeration order is deterministic regardless of insertion order.
#[derive(Debug)]
pub struct RangeIndex {
    pairs: Vec<RangePair>,
}

impl RangeIndex {
    pub(crate) fn build(entries: Vec<(String, f64)>) -> Self {
        let mut pairs: Vec<RangePair> = entries
            .into_iter()
            .map(|(item, value)| RangePair { value, item })
            .collect();
        pairs.sort_by(|a, b| a.value.total_cmp(&b.value).then_with(|| a.item.cmp(&b.item)));
        Self { pairs }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Smallest indexed value, or `+inf` when the index is empty: the
    /// min of an empty domain is unbounded in the "exclude everything"
    /// direction.
    pub fn min(&self) -> f64 {
        self.pairs.first().map_or(f64::INFINITY, |p| p.value)
    }

    /// Largest indexed value, or `-inf` when the index is empty.
    pub fn max(&self) -> f64 {
        self.pairs.last().map_or(f64::NEG_INFINITY, |p| p.value)
    }

    /// Visit, in `(value, item)` order, every item whose value falls in
    /// `[min, max)`, or `[min, max]` when `inclusive`.
    ///
    /// Bisects to the first entry `>= min`, then walks forward until the
    /// bound is violated; the array is sorted, so early exit is valid.
    pub fn visit_range<F: FnMut(&str)>(&self, mut visitor: F, min: f64, max: f64, inclusive: bool) {
        let start = self.index_of(min);
        for pair in &self.pairs[start..] {
            if pair.value < max || (inclusive && pair.value == max) {
                visitor(&pair.item);
            } else {
                break;
            }
        }
    }

    /// Count entries in `[min, max)` (or `[min, max]` when `inclusive`)
    /// without visiting them.
    pub fn count_range(&self, min: f64, max: f64, inclusive: bool) -> usize {
        let start = self.index_of(min);
        let mut end = self.index_of(max);
        if inclusive {
            // Advance past the run of entries exactly equal to max.
            while end < self.pairs.len() && self.pairs[end].value == max {
                end += 1;
            }
        }
        end.saturating_sub(start)
    }

    /// Lower bound: smallest index `i` such that `pairs[i].value >= v`.
    fn index_of(&self, v: f64) -> usize {
        self.pairs.partition_point(|p| p.value < v)
    }
}

// ---------------------------------------------------------------------------
// Value coercion
// ---------------------------------------------------------------------------

/// Parse an object value as a float. Non-numeric and NaN results are dropped
/// from the index.
pub(crate) fn coerce_number(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    if value.is_nan() {
        return None;
    }
    Some(value)
}

/// Parse an object value as an ISO-8601 date or datetime, yielding epoch
/// milliseconds. Accepts RFC 3339 (`2024-01-01T00:00:00Z`, with offset),
/// offset-free datetimes, and bare dates (midnight UTC).
pub(crate) fn coerce_date(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis() as f64);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc().timestamp_millis() as f64);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        return Some(midnight.and_utc().timestamp_millis() as f64);
    }
    None
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Lazily-built range indices keyed by property id.
///
/// An entry is only ever whole: the database inserts a fully-built index on
/// first read and [`invalidate`]s the key whenever item data for the
/// property arrives, so a cached index always reflects all fact-index data
/// at its build time.
///
/// [`invalidate`]: RangeIndexCache::invalidate
#[derive(Debug, Default)]
pub(crate) struct RangeIndexCache {
    built: HashMap<String, Rc<RangeIndex>>,
}

impl RangeIndexCache {
    pub(crate) fn get(&self, property: &str) -> Option<Rc<RangeIndex>> {
        self.built.get(property).cloned()
    }

    pub(crate) fn insert(&mut self, property: &str, index: Rc<RangeIndex>) {
        self.built.insert(property.to_string(), index);
    }

    pub(crate) fn invalidate(&mut self, property: &str) {
        self.built.remove(property);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn letters_index() -> RangeIndex {
        // Values [1, 5, 3, 3, 9] assigned to items A..E.
        RangeIndex::build(vec![
            ("A".to_string(), 1.0),
            ("B".to_string(), 5.0),
            ("C".to_string(), 3.0),
            ("D".to_string(), 3.0),
            ("E".to_string(), 9.0),
        ])
    }

    fn visited(index: &RangeIndex, min: f64, max: f64, inclusive: bool) -> Vec<String> {
        let mut out = Vec::new();
        index.visit_range(|item| out.push(item.to_string()), min, max, inclusive);
        out
    }

    #[test]
    fn visit_range_inclusive_spans_value_then_id_order() {
        let index = letters_index();
        assert_eq!(visited(&index, 3.0, 5.0, true), vec!["C", "D", "B"]);
    }

    #[test]
    fn visit_range_exclusive_drops_upper_bound() {
        let index = letters_index();
        assert_eq!(visited(&index, 3.0, 5.0, false), vec!["C", "D"]);
    }

    #[test]
    fn count_range_matches_visitation() {
        let index = letters_index();
        assert_eq!(index.count_range(3.0, 5.0, true), 3);
        assert_eq!(index.count_range(3.0, 5.0, false), 2);
        assert_eq!(index.count_range(0.0, 100.0, false), 5);
        assert_eq!(index.count_range(6.0, 8.0, true), 0);
    }

    #[test]
    fn count_range_inclusive_walks_past_duplicate_max_run() {
        let index = RangeIndex::build(vec![
            ("a".to_string(), 1.0),
            ("b".to_string(), 2.0),
            ("c".to_string(), 2.0),
            ("d".to_string(), 2.0),
        ]);
        assert_eq!(index.count_range(1.0, 2.0, true), 4);
        assert_eq!(index.count_range(1.0, 2.0, false), 1);
    }

    #[test]
    fn min_max_on_empty_index_are_unbounded_sentinels() {
        let index = RangeIndex::build(Vec::new());
        assert_eq!(index.min(), f64::INFINITY);
        assert_eq!(index.max(), f64::NEG_INFINITY);
        assert_eq!(index.count_range(f64::NEG_INFINITY, f64::INFINITY, true), 0);
        assert!(visited(&index, 0.0, 1.0, true).is_empty());
    }

    #[test]
    fn ties_are_broken_by_item_id_regardless_of_build_order() {
        let forward = RangeIndex::build(vec![
            ("x".to_string(), 2.0),
            ("y".to_string(), 2.0),
        ]);
        let backward = RangeIndex::build(vec![
            ("y".to_string(), 2.0),
            ("x".to_string(), 2.0),
        ]);
        assert_eq!(visited(&forward, 2.0, 2.0, true), vec!["x", "y"]);
        assert_eq!(visited(&backward, 2.0, 2.0, true), vec!["x", "y"]);
    }

    #[test]
    fn coerce_number_accepts_floats_and_drops_garbage() {
        assert_eq!(coerce_number("2148000"), Some(2148000.0));
        assert_eq!(coerce_number(" 3.25 "), Some(3.25));
        assert_eq!(coerce_number("-12"), Some(-12.0));
        assert_eq!(coerce_number("unknown"), None);
        assert_eq!(coerce_number(""), None);
        assert_eq!(coerce_number("NaN"), None);
    }

    #[test]
    fn coerce_date_accepts_iso_8601_variants() {
        let midnight = coerce_date("2024-03-01").unwrap();
        let explicit = coerce_date("2024-03-01T00:00:00Z").unwrap();
        let offset_free = coerce_date("2024-03-01T00:00:00").unwrap();
        assert_eq!(midnight, explicit);
        assert_eq!(midnight, offset_free);

        let later = coerce_date("2024-03-01T12:30:00Z").unwrap();
        assert!(later > midnight);

        assert_eq!(coerce_date("last Tuesday"), None);
    }

    #[test]
    fn cache_invalidation_discards_only_the_named_property() {
        let mut cache = RangeIndexCache::default();
        cache.insert("population", Rc::new(RangeIndex::build(Vec::new())));
        cache.insert("founded", Rc::new(RangeIndex::build(Vec::new())));

        cache.invalidate("population");
        assert!(cache.get("population").is_none());
        assert!(cache.get("founded").is_some());
    }
}
