//! The fact index: one direction of the symmetric triple store.
//!
//! A [`TripleIndex`] maps `x -> y -> [z]`. The database owns two of them,
//! subject→property→objects and object→property→subjects, and writes every
//! triple through both, which is what makes reverse lookup a hash probe
//! instead of a scan over all facts.

use crate::set::Set;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub(crate) struct TripleIndex {
    map: HashMap<String, HashMap<String, Vec<String>>>,
}

impl TripleIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record `z` under `(x, y)`, skipping if already present.
    ///
    /// The duplicate check is a linear scan of the bucket. Buckets are small
    /// relative to corpus size; a known scaling limit of this layout.
    pub(crate) fn put(&mut self, x: &str, y: &str, z: &str) {
        let bucket = self
            .map
            .entry(x.to_string())
            .or_default()
            .entry(y.to_string())
            .or_default();
        if bucket.iter().any(|existing| existing == z) {
            return;
        }
        bucket.push(z.to_string());
    }

    pub(crate) fn bucket(&self, x: &str, y: &str) -> Option<&[String]> {
        self.map.get(x).and_then(|h| h.get(y)).map(Vec::as_slice)
    }

    /// Add every bucket member under `(x, y)` to `out`, intersecting with
    /// `filter` on the fly when one is supplied.
    pub(crate) fn fill_set(&self, x: &str, y: &str, out: &mut Set, filter: Option<&Set>) {
        let Some(bucket) = self.bucket(x, y) else {
            return;
        };
        for z in bucket {
            if filter.is_none_or(|f| f.contains(z)) {
                out.add(z);
            }
        }
    }

    /// Count bucket members under `(x, y)` without materializing a set.
    pub(crate) fn count_distinct(&self, x: &str, y: &str, filter: Option<&Set>) -> usize {
        let Some(bucket) = self.bucket(x, y) else {
            return 0;
        };
        match filter {
            Some(f) => bucket.iter().filter(|z| f.contains(z)).count(),
            None => bucket.len(),
        }
    }

    /// First-inserted member of the `(x, y)` bucket, if any.
    pub(crate) fn first(&self, x: &str, y: &str) -> Option<&str> {
        self.bucket(x, y).and_then(|b| b.first()).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TripleIndex {
        let mut index = TripleIndex::new();
        index.put("paris", "country", "France");
        index.put("paris", "landmark", "Eiffel Tower");
        index.put("paris", "landmark", "Louvre");
        index
    }

    #[test]
    fn put_skips_duplicate_bucket_entries() {
        let mut index = sample();
        index.put("paris", "landmark", "Louvre");

        assert_eq!(
            index.bucket("paris", "landmark").unwrap().to_vec(),
            vec!["Eiffel Tower", "Louvre"],
            "duplicate insert must not grow the bucket"
        );
    }

    #[test]
    fn fill_set_collects_in_insertion_order() {
        let index = sample();
        let mut out = Set::new();
        index.fill_set("paris", "landmark", &mut out, None);
        assert_eq!(out.to_vec(), vec!["Eiffel Tower", "Louvre"]);
    }

    #[test]
    fn fill_set_with_filter_intersects() {
        let index = sample();
        let filter: Set = ["Louvre", "Not A Landmark"].into_iter().collect();

        let mut out = Set::new();
        index.fill_set("paris", "landmark", &mut out, Some(&filter));
        assert_eq!(out.to_vec(), vec!["Louvre"]);
    }

    #[test]
    fn count_distinct_matches_fill_set() {
        let index = sample();
        assert_eq!(index.count_distinct("paris", "landmark", None), 2);

        let filter: Set = ["Eiffel Tower"].into_iter().collect();
        assert_eq!(index.count_distinct("paris", "landmark", Some(&filter)), 1);
    }

    #[test]
    fn first_returns_first_inserted() {
        let index = sample();
        assert_eq!(index.first("paris", "landmark"), Some("Eiffel Tower"));
    }

    #[test]
    fn missing_keys_yield_empty_results() {
        let index = sample();
        let mut out = Set::new();
        index.fill_set("london", "landmark", &mut out, None);
        assert!(out.is_empty());
        assert_eq!(index.count_distinct("paris", "mayor", None), 0);
        assert_eq!(index.first("london", "landmark"), None);
    }
}
