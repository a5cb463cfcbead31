//! Vitrine — embedded in-memory triple store for faceted data browsing.
//!
//! The core primitive is a triple: an `(item, property, value)` fact. Every
//! fact is indexed twice, subject→property→objects and
//! object→property→subjects, so both lookup directions are hash probes, and
//! numeric/date-valued properties carry a lazily-built sorted [`RangeIndex`]
//! so range filters and min/max facets avoid linear scans.
//!
//! The store is schema-flexible: types and properties may be declared up
//! front, but any identifier first met in item data is auto-created with
//! derived defaults. Loading never fails a batch for a bad record: records
//! that cannot be addressed are logged and skipped, and everything already
//! applied stays applied.
//!
//! # Quick start
//!
//! ```
//! use serde_json::json;
//! use vitrine::Database;
//!
//! let mut database = Database::new();
//! database.load_data(
//!     &json!({
//!         "properties": {
//!             "population": { "valueType": "number" }
//!         },
//!         "items": [
//!             { "label": "Paris", "type": "City", "population": 2148000 },
//!             { "label": "Lagos", "type": "City", "population": 14862000 }
//!         ]
//!     }),
//!     "http://example.org/",
//! );
//!
//! // Forward lookup: objects of (subject, property).
//! assert!(database.get_objects("Paris", "type", None).contains("City"));
//! // Reverse lookup: subjects of (object, property).
//! assert_eq!(database.get_subjects("City", "type", None).len(), 2);
//! // Range query over a numeric property.
//! let big = database.get_subjects_in_range("population", 10_000_000.0, f64::INFINITY, false, None);
//! assert!(big.contains("Lagos") && !big.contains("Paris"));
//! ```

mod index;
mod range;
mod schema;
mod set;

pub use range::RangeIndex;
pub use schema::{Namespaces, Property, PropertySpec, QName, Schema, Type, TypeSpec, ValueType};
pub use set::Set;

use crate::index::TripleIndex;
use crate::range::{coerce_date, coerce_number, RangeIndexCache};
use crate::schema::{encode_uri_component, normalize_base_uri};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// An item record that cannot be addressed (no label, no known id).
    /// Raised per record, caught at the batch loop, logged, never escapes a
    /// load.
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    /// A [`DataSource`] failed while loading. The remaining sources in the
    /// batch are still attempted.
    #[error("data source {description} failed: {message}")]
    ImporterFailure { description: String, message: String },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// Load-lifecycle notifications.
///
/// Fired synchronously, in registration order, before and after each load
/// phase, even when every record inside the batch is skipped. This is the
/// sole extension point for view components that must react to new data.
/// A listener must not trigger another load from inside a notification.
pub trait DatabaseListener {
    fn on_before_loading_types(&self) {}
    fn on_after_loading_types(&self) {}
    fn on_before_loading_properties(&self) {}
    fn on_after_loading_properties(&self) {}
    fn on_before_loading_items(&self) {}
    fn on_after_loading_items(&self) {}
}

// ---------------------------------------------------------------------------
// Data sources
// ---------------------------------------------------------------------------

/// An external data-source adapter.
///
/// Concrete file-format importers live outside the core; they normalize
/// their input into the [`Database::load_data`] shape and hand it over here.
pub trait DataSource {
    /// Short human-readable description, used in load diagnostics.
    fn describe(&self) -> &str;
    fn load(&self, database: &mut Database) -> Result<()>;
}

/// A data source holding raw JSON text in the `load_data` shape.
pub struct JsonSource {
    text: String,
    base_uri: String,
}

impl JsonSource {
    pub fn new(text: impl Into<String>, base_uri: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            base_uri: base_uri.into(),
        }
    }
}

impl DataSource for JsonSource {
    fn describe(&self) -> &str {
        &self.base_uri
    }

    fn load(&self, database: &mut Database) -> Result<()> {
        let data: Value = serde_json::from_str(&self.text)?;
        database.load_data(&data, &self.base_uri);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// In-memory triple store backing faceted browsing.
///
/// Single-owner and synchronous: loads take `&mut self`, queries take
/// `&self`, and every operation runs to completion on the caller's thread.
/// Multiple independent databases are fully isolated; there is no shared
/// static state.
pub struct Database {
    schema: Schema,
    /// subject → property → objects
    spo: TripleIndex,
    /// object → property → subjects
    ops: TripleIndex,
    items: Set,
    listeners: Vec<Rc<dyn DatabaseListener>>,
    /// Lazily-built range indices. `RefCell` so read paths can populate the
    /// cache; invalidated during item loads.
    range_indexes: RefCell<RangeIndexCache>,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    pub fn new() -> Self {
        Self {
            schema: Schema::new(),
            spo: TripleIndex::new(),
            ops: TripleIndex::new(),
            items: Set::new(),
            listeners: Vec::new(),
            range_indexes: RefCell::new(RangeIndexCache::default()),
        }
    }

    /// The type/property registry.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    // -- listeners ----------------------------------------------------------

    pub fn add_listener(&mut self, listener: Rc<dyn DatabaseListener>) {
        self.listeners.push(listener);
    }

    /// Remove a previously added listener, by identity.
    pub fn remove_listener(&mut self, listener: &Rc<dyn DatabaseListener>) {
        self.listeners
            .retain(|existing| !Rc::ptr_eq(existing, listener));
    }

    fn notify<F: Fn(&dyn DatabaseListener)>(&self, event: F) {
        for listener in &self.listeners {
            event(listener.as_ref());
        }
    }

    // -- loading ------------------------------------------------------------

    /// Load a composite data object: `types`, then `properties`, then
    /// `items`, each section optional.
    pub fn load_data(&mut self, data: &Value, base_uri: &str) {
        let Some(root) = data.as_object() else {
            warn!("load_data root is not a JSON object; nothing loaded");
            return;
        };
        if let Some(types) = root.get("types") {
            match types.as_object() {
                Some(entries) => self.load_types(entries, base_uri),
                None => warn!("types section is not an object; skipped"),
            }
        }
        if let Some(properties) = root.get("properties") {
            match properties.as_object() {
                Some(entries) => self.load_properties(entries, base_uri),
                None => warn!("properties section is not an object; skipped"),
            }
        }
        if let Some(items) = root.get("items") {
            match items.as_array() {
                Some(entries) => self.load_items(entries, base_uri),
                None => warn!("items section is not an array; skipped"),
            }
        }
    }

    /// Load type declarations, keyed by type id.
    pub fn load_types(&mut self, entries: &Map<String, Value>, base_uri: &str) {
        self.notify(|l| l.on_before_loading_types());
        for (id, entry) in entries {
            match serde_json::from_value::<TypeSpec>(entry.clone()) {
                Ok(spec) => self.schema.register_type(id, spec, base_uri),
                Err(e) => {
                    warn!(type_id = id.as_str(), error = %e, "skipping unreadable type declaration");
                }
            }
        }
        self.notify(|l| l.on_after_loading_types());
    }

    /// Load property declarations, keyed by property id.
    pub fn load_properties(&mut self, entries: &Map<String, Value>, base_uri: &str) {
        self.notify(|l| l.on_before_loading_properties());
        for (id, entry) in entries {
            match serde_json::from_value::<PropertySpec>(entry.clone()) {
                Ok(spec) => self.schema.register_property(id, spec, base_uri),
                Err(e) => {
                    warn!(property_id = id.as_str(), error = %e, "skipping unreadable property declaration");
                }
            }
        }
        self.notify(|l| l.on_after_loading_properties());
    }

    /// Load item records. Malformed records are logged and skipped; records
    /// already applied stay applied.
    pub fn load_items(&mut self, entries: &[Value], base_uri: &str) {
        self.notify(|l| l.on_before_loading_items());
        let base = normalize_base_uri(base_uri);
        for entry in entries {
            let Some(record) = entry.as_object() else {
                warn!("skipping non-object item entry");
                continue;
            };
            if let Err(e) = self.load_item(record, &base) {
                warn!(error = %e, "skipping item record");
            }
        }
        self.notify(|l| l.on_after_loading_items());
    }

    /// Apply each source best-effort: a failing source is logged and the
    /// remaining sources still load.
    pub fn load_sources(&mut self, sources: &[&dyn DataSource]) {
        for source in sources {
            if let Err(e) = source.load(self) {
                warn!(source = source.describe(), error = %e, "data source failed; continuing with remaining sources");
            }
        }
    }

    fn load_item(&mut self, record: &Map<String, Value>, base: &str) -> Result<()> {
        let label = record.get("label").and_then(json_scalar);
        let declared_id = record.get("id").and_then(json_scalar);

        let id = match (label, declared_id) {
            (None, None) => {
                return Err(DatabaseError::MalformedRecord(
                    "item record has neither label nor id".to_string(),
                ));
            }
            // id-only records may only augment an item that already exists.
            (None, Some(id)) => {
                if !self.items.contains(&id) {
                    return Err(DatabaseError::MalformedRecord(format!(
                        "item record for unknown id {id:?} has no label"
                    )));
                }
                id
            }
            (Some(label), declared_id) => {
                let id = declared_id.unwrap_or_else(|| label.clone());
                let uri = record
                    .get("uri")
                    .and_then(json_scalar)
                    .unwrap_or_else(|| format!("{base}item#{}", encode_uri_component(&id)));
                let type_id = record
                    .get("type")
                    .and_then(json_scalar)
                    .unwrap_or_else(|| "Item".to_string());

                self.items.add(&id);
                self.index_triple(&id, "uri", &uri);
                self.index_triple(&id, "label", &label);
                self.index_triple(&id, "type", &type_id);
                self.schema.ensure_type_exists(&type_id, base);
                id
            }
        };

        for (key, value) in record {
            if matches!(key.as_str(), "uri" | "label" | "id" | "type") {
                continue;
            }
            self.schema.ensure_property_exists(key, base);
            // New data for this property: the cached range index no longer
            // reflects all fact-index data, so discard it wholesale.
            self.range_indexes.borrow_mut().invalidate(key);

            match value {
                Value::Array(elements) => {
                    for element in elements {
                        match json_scalar(element) {
                            Some(object) => self.index_triple(&id, key, &object),
                            None => warn!(
                                item = id.as_str(),
                                property = key.as_str(),
                                "skipping non-scalar array element"
                            ),
                        }
                    }
                }
                other => match json_scalar(other) {
                    Some(object) => self.index_triple(&id, key, &object),
                    None => warn!(
                        item = id.as_str(),
                        property = key.as_str(),
                        "skipping non-scalar value"
                    ),
                },
            }
        }
        Ok(())
    }

    fn index_triple(&mut self, s: &str, p: &str, o: &str) {
        self.spo.put(s, p, o);
        self.ops.put(o, p, s);
    }

    // -- item membership ----------------------------------------------------

    /// A copy of the global item set.
    pub fn get_all_items(&self) -> Set {
        self.items.clone()
    }

    pub fn get_all_items_count(&self) -> usize {
        self.items.len()
    }

    pub fn contains_item(&self, id: &str) -> bool {
        self.items.contains(id)
    }

    // -- fact queries -------------------------------------------------------

    /// Objects of `(s, p)`. With a `filter`, only objects also present in
    /// the filter set are included. Unknown keys yield an empty set.
    pub fn get_objects(&self, s: &str, p: &str, filter: Option<&Set>) -> Set {
        let mut out = Set::new();
        self.spo.fill_set(s, p, &mut out, filter);
        out
    }

    /// Subjects of `(o, p)`, the reverse direction.
    pub fn get_subjects(&self, o: &str, p: &str, filter: Option<&Set>) -> Set {
        let mut out = Set::new();
        self.ops.fill_set(o, p, &mut out, filter);
        out
    }

    /// Union of `get_objects(s, p)` over every `s` in `subjects`.
    pub fn get_objects_union(&self, subjects: &Set, p: &str, filter: Option<&Set>) -> Set {
        let mut out = Set::new();
        subjects.visit(|s| self.spo.fill_set(s, p, &mut out, filter));
        out
    }

    /// Union of `get_subjects(o, p)` over every `o` in `objects`.
    pub fn get_subjects_union(&self, objects: &Set, p: &str, filter: Option<&Set>) -> Set {
        let mut out = Set::new();
        objects.visit(|o| self.ops.fill_set(o, p, &mut out, filter));
        out
    }

    /// Count of `get_objects(s, p)` without materializing a set.
    pub fn count_distinct_objects(&self, s: &str, p: &str, filter: Option<&Set>) -> usize {
        self.spo.count_distinct(s, p, filter)
    }

    pub fn count_distinct_subjects(&self, o: &str, p: &str, filter: Option<&Set>) -> usize {
        self.ops.count_distinct(o, p, filter)
    }

    pub fn count_distinct_objects_union(
        &self,
        subjects: &Set,
        p: &str,
        filter: Option<&Set>,
    ) -> usize {
        let mut count = 0;
        subjects.visit(|s| count += self.spo.count_distinct(s, p, filter));
        count
    }

    pub fn count_distinct_subjects_union(
        &self,
        objects: &Set,
        p: &str,
        filter: Option<&Set>,
    ) -> usize {
        let mut count = 0;
        objects.visit(|o| count += self.ops.count_distinct(o, p, filter));
        count
    }

    /// An arbitrary single object of `(s, p)` (the first inserted) for
    /// callers that only need an existential witness.
    pub fn get_object(&self, s: &str, p: &str) -> Option<&str> {
        self.spo.first(s, p)
    }

    pub fn get_subject(&self, o: &str, p: &str) -> Option<&str> {
        self.ops.first(o, p)
    }

    // -- range queries ------------------------------------------------------

    /// The range index for a property, rebuilt on first read after
    /// invalidation. `None` when the property is unknown; an empty index
    /// when the property is not numeric/date-valued.
    pub fn range_index(&self, property_id: &str) -> Option<Rc<RangeIndex>> {
        let property = self.schema.get_property(property_id)?;
        if let Some(cached) = self.range_indexes.borrow().get(property_id) {
            return Some(cached);
        }
        let built = Rc::new(self.build_range_index(property));
        debug!(
            property = property_id,
            pairs = built.len(),
            "rebuilt range index"
        );
        self.range_indexes
            .borrow_mut()
            .insert(property_id, Rc::clone(&built));
        Some(built)
    }

    /// Items whose value for `property_id` falls in `[min, max)` (or
    /// `[min, max]` when `inclusive`), optionally restricted to `filter`.
    pub fn get_subjects_in_range(
        &self,
        property_id: &str,
        min: f64,
        max: f64,
        inclusive: bool,
        filter: Option<&Set>,
    ) -> Set {
        let mut out = Set::new();
        if let Some(index) = self.range_index(property_id) {
            index.visit_range(
                |item| {
                    if filter.is_none_or(|f| f.contains(item)) {
                        out.add(item);
                    }
                },
                min,
                max,
                inclusive,
            );
        }
        out
    }

    fn build_range_index(&self, property: &Property) -> RangeIndex {
        let coerce: fn(&str) -> Option<f64> = match property.value_type {
            ValueType::Number => coerce_number,
            ValueType::Date => coerce_date,
            _ => return RangeIndex::build(Vec::new()),
        };
        let mut entries = Vec::new();
        self.items.visit(|item| {
            if let Some(bucket) = self.spo.bucket(item, &property.id) {
                for object in bucket {
                    if let Some(value) = coerce(object) {
                        entries.push((item.to_string(), value));
                    }
                }
            }
        });
        RangeIndex::build(entries)
    }

    // -- schema queries -----------------------------------------------------

    pub fn get_type(&self, id: &str) -> Option<&Type> {
        self.schema.get_type(id)
    }

    pub fn get_property(&self, id: &str) -> Option<&Property> {
        self.schema.get_property(id)
    }

    /// All property ids, declared-then-discovered order.
    pub fn get_all_properties(&self) -> Vec<String> {
        self.schema.property_ids()
    }

    /// Singular and plural labels of every type appearing among the given
    /// items' `type` objects. Unregistered type ids are omitted.
    pub fn get_type_labels(&self, items: &Set) -> (Vec<String>, Vec<String>) {
        let type_ids = self.get_objects_union(items, "type", None);
        let mut labels = Vec::new();
        let mut plural_labels = Vec::new();
        type_ids.visit(|type_id| {
            if let Some(ty) = self.schema.get_type(type_id) {
                labels.push(ty.label.clone());
                plural_labels.push(ty.plural_label.clone());
            }
        });
        (labels, plural_labels)
    }

    /// Namespace assignment over registered property URIs, for exporters.
    pub fn get_namespaces(&self) -> Namespaces {
        self.schema.namespaces()
    }
}

/// Normalize a JSON scalar into the string form triples are stored in.
/// Nested arrays/objects and nulls have no scalar form.
fn json_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
