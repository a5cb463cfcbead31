//! Schema registry: types, properties, and identifier derivation.
//!
//! The registry is deliberately permissive: item data referencing an
//! undeclared type or property auto-creates it with derived defaults, so a
//! dataset never fails to load for lack of a schema. Explicit declarations
//! overwrite the whole record: partial re-declaration does not preserve old
//! fields.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};

/// The kind of value a property holds. Drives range-index coercion: only
/// `Number` and `Date` properties get a populated range index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    #[default]
    Text,
    Number,
    Date,
    Boolean,
    Item,
    Url,
}

impl ValueType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "text" => Some(ValueType::Text),
            "number" => Some(ValueType::Number),
            "date" => Some(ValueType::Date),
            "boolean" => Some(ValueType::Boolean),
            "item" => Some(ValueType::Item),
            "url" => Some(ValueType::Url),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            ValueType::Text => "text",
            ValueType::Number => "number",
            ValueType::Date => "date",
            ValueType::Boolean => "boolean",
            ValueType::Item => "item",
            ValueType::Url => "url",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl Serialize for ValueType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_tag())
    }
}

impl<'de> Deserialize<'de> for ValueType {
    /// Lenient: an unknown tag folds to `text` rather than failing the
    /// declaration, matching how the engine treats undeclared properties.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(ValueType::from_tag(&tag).unwrap_or_else(|| {
            tracing::warn!(tag = tag.as_str(), "unknown valueType tag, treating as text");
            ValueType::Text
        }))
    }
}

/// A registered item type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Type {
    pub id: String,
    pub uri: String,
    pub label: String,
    pub plural_label: String,
    #[serde(rename = "superTypeID", skip_serializing_if = "Option::is_none")]
    pub super_type_id: Option<String>,
}

/// A registered property.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: String,
    pub uri: String,
    pub value_type: ValueType,
    pub label: String,
    pub plural_label: String,
    pub reverse_label: String,
    pub reverse_plural_label: String,
    pub grouping_label: String,
    pub reverse_grouping_label: String,
}

/// Optional-field type declaration, as it arrives from a data file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSpec {
    pub uri: Option<String>,
    pub label: Option<String>,
    pub plural_label: Option<String>,
    #[serde(rename = "superTypeID")]
    pub super_type_id: Option<String>,
}

/// Optional-field property declaration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySpec {
    pub uri: Option<String>,
    pub value_type: Option<ValueType>,
    pub label: Option<String>,
    pub plural_label: Option<String>,
    pub reverse_label: Option<String>,
    pub reverse_plural_label: Option<String>,
    pub grouping_label: Option<String>,
    pub reverse_grouping_label: Option<String>,
}

/// A property URI split into namespace base and local name, with an assigned
/// short prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub prefix: String,
    pub base: String,
    pub local_name: String,
}

/// Namespace assignment over all registered property URIs, for exporters.
#[derive(Debug, Default)]
pub struct Namespaces {
    pub id_to_qname: HashMap<String, QName>,
    pub prefix_to_base: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

const ITEM_TYPE_URI: &str = "http://vitrine.dev/ns#Item";
const URI_PROPERTY_URI: &str = "http://vitrine.dev/ns#uri";
const LABEL_PROPERTY_URI: &str = "http://www.w3.org/2000/01/rdf-schema#label";
const TYPE_PROPERTY_URI: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Mapping from identifier to [`Type`] and [`Property`] records.
///
/// Property ids additionally keep their first-registration order, which is
/// the order `property_ids` reports: declared properties first, then
/// discovered ones, as they appeared.
#[derive(Debug)]
pub struct Schema {
    types: HashMap<String, Type>,
    properties: HashMap<String, Property>,
    property_order: Vec<String>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    /// A fresh registry holding the predefined `Item` type and the `label`,
    /// `type`, and `uri` properties.
    pub fn new() -> Self {
        let mut schema = Self {
            types: HashMap::new(),
            properties: HashMap::new(),
            property_order: Vec::new(),
        };

        schema.types.insert(
            "Item".to_string(),
            Type {
                id: "Item".to_string(),
                uri: ITEM_TYPE_URI.to_string(),
                label: "Item".to_string(),
                plural_label: "Items".to_string(),
                super_type_id: None,
            },
        );

        schema.install_builtin(Property {
            id: "label".to_string(),
            uri: LABEL_PROPERTY_URI.to_string(),
            value_type: ValueType::Text,
            label: "label".to_string(),
            plural_label: "labels".to_string(),
            reverse_label: "label of".to_string(),
            reverse_plural_label: "labels of".to_string(),
            grouping_label: "labels".to_string(),
            reverse_grouping_label: "things with these labels".to_string(),
        });
        schema.install_builtin(Property {
            id: "type".to_string(),
            uri: TYPE_PROPERTY_URI.to_string(),
            value_type: ValueType::Text,
            label: "type".to_string(),
            plural_label: "types".to_string(),
            reverse_label: "type of".to_string(),
            reverse_plural_label: "types of".to_string(),
            grouping_label: "types".to_string(),
            reverse_grouping_label: "things of these types".to_string(),
        });
        schema.install_builtin(Property {
            id: "uri".to_string(),
            uri: URI_PROPERTY_URI.to_string(),
            value_type: ValueType::Url,
            label: "URI".to_string(),
            plural_label: "URIs".to_string(),
            reverse_label: "URI of".to_string(),
            reverse_plural_label: "URIs of".to_string(),
            grouping_label: "URIs".to_string(),
            reverse_grouping_label: "things named by these URIs".to_string(),
        });

        schema
    }

    fn install_builtin(&mut self, property: Property) {
        self.property_order.push(property.id.clone());
        self.properties.insert(property.id.clone(), property);
    }

    /// Register (or overwrite) a type declaration. Omitted fields fall back
    /// through the defaulting cascade; a re-declaration must resupply every
    /// field it wants preserved.
    pub fn register_type(&mut self, id: &str, spec: TypeSpec, base_uri: &str) {
        let base = normalize_base_uri(base_uri);
        let label = spec.label.unwrap_or_else(|| id.to_string());
        let ty = Type {
            id: id.to_string(),
            uri: spec
                .uri
                .unwrap_or_else(|| format!("{base}type#{}", encode_uri_component(id))),
            plural_label: spec.plural_label.unwrap_or_else(|| label.clone()),
            label,
            super_type_id: spec.super_type_id,
        };
        self.types.insert(id.to_string(), ty);
    }

    /// Register (or overwrite) a property declaration.
    ///
    /// Cascade: `label` defaults to the id; `pluralLabel` to `label`;
    /// `reverseLabel` to `"!" + label` (inverse marker); `reversePluralLabel`
    /// to `"!" + pluralLabel`; `groupingLabel` to `label`;
    /// `reverseGroupingLabel` to `reverseLabel`.
    pub fn register_property(&mut self, id: &str, spec: PropertySpec, base_uri: &str) {
        let base = normalize_base_uri(base_uri);
        let label = spec.label.unwrap_or_else(|| id.to_string());
        let plural_label = spec.plural_label.unwrap_or_else(|| label.clone());
        let reverse_label = spec.reverse_label.unwrap_or_else(|| format!("!{label}"));
        let reverse_plural_label = spec
            .reverse_plural_label
            .unwrap_or_else(|| format!("!{plural_label}"));
        let grouping_label = spec.grouping_label.unwrap_or_else(|| label.clone());
        let reverse_grouping_label = spec
            .reverse_grouping_label
            .unwrap_or_else(|| reverse_label.clone());

        let property = Property {
            id: id.to_string(),
            uri: spec
                .uri
                .unwrap_or_else(|| format!("{base}property#{}", encode_uri_component(id))),
            value_type: spec.value_type.unwrap_or_default(),
            label,
            plural_label,
            reverse_label,
            reverse_plural_label,
            grouping_label,
            reverse_grouping_label,
        };

        if !self.properties.contains_key(id) {
            self.property_order.push(id.to_string());
        }
        self.properties.insert(id.to_string(), property);
    }

    pub fn get_type(&self, id: &str) -> Option<&Type> {
        self.types.get(id)
    }

    pub fn get_property(&self, id: &str) -> Option<&Property> {
        self.properties.get(id)
    }

    /// All property ids in first-registration order.
    pub fn property_ids(&self) -> Vec<String> {
        self.property_order.clone()
    }

    /// Create the type with derived defaults if it is not registered yet.
    pub fn ensure_type_exists(&mut self, id: &str, base_uri: &str) {
        if self.types.contains_key(id) {
            return;
        }
        let base = normalize_base_uri(base_uri);
        self.types.insert(
            id.to_string(),
            Type {
                id: id.to_string(),
                uri: format!("{base}type#{}", encode_uri_component(id)),
                label: id.to_string(),
                plural_label: id.to_string(),
                super_type_id: None,
            },
        );
    }

    /// Create the property with derived defaults if it is not registered
    /// yet. Auto-created properties are always `text`-valued; only an
    /// explicit re-declaration can upgrade them to a range-indexable type.
    pub fn ensure_property_exists(&mut self, id: &str, base_uri: &str) -> &Property {
        if !self.properties.contains_key(id) {
            let base = normalize_base_uri(base_uri);
            let label = id.to_string();
            let property = Property {
                id: id.to_string(),
                uri: format!("{base}property#{}", encode_uri_component(id)),
                value_type: ValueType::Text,
                plural_label: label.clone(),
                reverse_label: format!("reverse of {label}"),
                reverse_plural_label: format!("reverse of {label}"),
                grouping_label: label.clone(),
                reverse_grouping_label: format!("reverse of {label}"),
                label,
            };
            self.property_order.push(id.to_string());
            self.properties.insert(id.to_string(), property);
        }
        &self.properties[id]
    }

    /// Split every property URI into namespace base + local name and assign
    /// short prefixes to the bases in first-seen property order.
    pub fn namespaces(&self) -> Namespaces {
        let mut bases_in_order: Vec<String> = Vec::new();
        let mut seen_bases: HashSet<String> = HashSet::new();
        let mut splits: Vec<(String, String, String)> = Vec::new();

        for id in &self.property_order {
            let Some(property) = self.properties.get(id) else {
                continue;
            };
            let Some((base, local_name)) = split_uri(&property.uri) else {
                continue;
            };
            if seen_bases.insert(base.to_string()) {
                bases_in_order.push(base.to_string());
            }
            splits.push((id.clone(), base.to_string(), local_name.to_string()));
        }

        let mut base_to_prefix: HashMap<String, String> = HashMap::new();
        let mut namespaces = Namespaces::default();
        for (i, base) in bases_in_order.iter().enumerate() {
            let prefix = if i < 26 {
                ((b'a' + i as u8) as char).to_string()
            } else {
                format!("ns{i}")
            };
            namespaces
                .prefix_to_base
                .insert(prefix.clone(), base.clone());
            base_to_prefix.insert(base.clone(), prefix);
        }

        for (id, base, local_name) in splits {
            let prefix = base_to_prefix[&base].clone();
            namespaces.id_to_qname.insert(
                id,
                QName {
                    prefix,
                    base,
                    local_name,
                },
            );
        }

        namespaces
    }
}

// ---------------------------------------------------------------------------
// Identifier derivation
// ---------------------------------------------------------------------------

/// Normalize a base URI so derived identifiers concatenate cleanly: a
/// trailing `#` becomes `/`, and anything not ending in `/` or `:` gets a
/// `/` appended.
pub(crate) fn normalize_base_uri(base_uri: &str) -> String {
    match base_uri.chars().last() {
        Some('#') => format!("{}/", &base_uri[..base_uri.len() - 1]),
        Some('/') | Some(':') => base_uri.to_string(),
        _ => format!("{base_uri}/"),
    }
}

/// Percent-encode an identifier for embedding in a derived URI. Same
/// unreserved set as JS `encodeURIComponent`.
pub(crate) fn encode_uri_component(raw: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        let c = byte as char;
        if c.is_ascii_alphanumeric() || "-_.!~*'()".contains(c) {
            out.push(c);
        } else {
            out.push('%');
            out.push(HEX[(byte >> 4) as usize] as char);
            out.push(HEX[(byte & 0x0F) as usize] as char);
        }
    }
    out
}

/// Split a URI at the first `#` (else the last `/`) into base + local name.
fn split_uri(uri: &str) -> Option<(&str, &str)> {
    if let Some(hash) = uri.find('#') {
        if hash > 0 {
            return Some((&uri[..hash + 1], &uri[hash + 1..]));
        }
    }
    if let Some(slash) = uri.rfind('/') {
        if slash > 0 {
            return Some((&uri[..slash + 1], &uri[slash + 1..]));
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_present() {
        let schema = Schema::new();
        assert!(schema.get_type("Item").is_some());
        assert_eq!(schema.property_ids(), vec!["label", "type", "uri"]);
        assert_eq!(
            schema.get_property("uri").unwrap().value_type,
            ValueType::Url
        );
    }

    #[test]
    fn declared_property_uses_bang_reverse_cascade() {
        let mut schema = Schema::new();
        schema.register_property(
            "population",
            PropertySpec {
                value_type: Some(ValueType::Number),
                label: Some("population".to_string()),
                ..Default::default()
            },
            "http://example.org/",
        );

        let property = schema.get_property("population").unwrap();
        assert_eq!(property.value_type, ValueType::Number);
        assert_eq!(property.plural_label, "population");
        assert_eq!(property.reverse_label, "!population");
        assert_eq!(property.reverse_plural_label, "!population");
        assert_eq!(property.grouping_label, "population");
        assert_eq!(property.reverse_grouping_label, "!population");
        assert_eq!(property.uri, "http://example.org/property#population");
    }

    #[test]
    fn auto_created_property_uses_reverse_of_cascade() {
        let mut schema = Schema::new();
        schema.ensure_property_exists("mayor", "http://example.org/");

        let property = schema.get_property("mayor").unwrap();
        assert_eq!(property.value_type, ValueType::Text);
        assert_eq!(property.label, "mayor");
        assert_eq!(property.reverse_label, "reverse of mayor");
        assert_eq!(property.grouping_label, "mayor");
        assert_eq!(property.reverse_grouping_label, "reverse of mayor");
    }

    #[test]
    fn ensure_is_idempotent_and_keeps_order() {
        let mut schema = Schema::new();
        schema.ensure_property_exists("mayor", "http://example.org/");
        schema.ensure_property_exists("mayor", "http://example.org/");
        schema.ensure_type_exists("City", "http://example.org/");
        schema.ensure_type_exists("City", "http://example.org/");

        assert_eq!(
            schema.property_ids(),
            vec!["label", "type", "uri", "mayor"],
            "re-encountering an id must not duplicate the entry"
        );
    }

    #[test]
    fn redeclaration_overwrites_the_whole_record() {
        let mut schema = Schema::new();
        schema.register_property(
            "population",
            PropertySpec {
                value_type: Some(ValueType::Number),
                label: Some("population".to_string()),
                plural_label: Some("populations".to_string()),
                ..Default::default()
            },
            "http://example.org/",
        );
        // Re-declare with only a label: every other field falls back to the
        // cascade, including valueType.
        schema.register_property(
            "population",
            PropertySpec {
                label: Some("head count".to_string()),
                ..Default::default()
            },
            "http://example.org/",
        );

        let property = schema.get_property("population").unwrap();
        assert_eq!(property.label, "head count");
        assert_eq!(property.value_type, ValueType::Text, "valueType not preserved");
        assert_eq!(property.plural_label, "head count");
        assert_eq!(schema.property_ids().len(), 4, "overwrite keeps one entry");
    }

    #[test]
    fn base_uri_normalization() {
        assert_eq!(normalize_base_uri("http://e.org/"), "http://e.org/");
        assert_eq!(normalize_base_uri("http://e.org"), "http://e.org/");
        assert_eq!(normalize_base_uri("http://e.org/ns#"), "http://e.org/ns/");
        assert_eq!(normalize_base_uri("urn:cities:"), "urn:cities:");
    }

    #[test]
    fn encode_uri_component_matches_js_unreserved_set() {
        assert_eq!(encode_uri_component("Paris"), "Paris");
        assert_eq!(encode_uri_component("New York"), "New%20York");
        assert_eq!(encode_uri_component("a/b?c"), "a%2Fb%3Fc");
        assert_eq!(encode_uri_component("it's-ok.!~*()"), "it's-ok.!~*()");
        assert_eq!(encode_uri_component("café"), "caf%C3%A9");
    }

    #[test]
    fn unknown_value_type_tag_folds_to_text() {
        let spec: PropertySpec =
            serde_json::from_value(serde_json::json!({ "valueType": "geolocation" })).unwrap();
        assert_eq!(spec.value_type, Some(ValueType::Text));
    }

    #[test]
    fn type_spec_accepts_super_type_id_key() {
        let spec: TypeSpec = serde_json::from_value(serde_json::json!({
            "label": "Capital",
            "superTypeID": "City"
        }))
        .unwrap();
        let mut schema = Schema::new();
        schema.register_type("Capital", spec, "http://example.org/");
        assert_eq!(
            schema.get_type("Capital").unwrap().super_type_id.as_deref(),
            Some("City")
        );
    }

    #[test]
    fn namespaces_split_hash_and_slash_uris() {
        let mut schema = Schema::new();
        schema.register_property(
            "population",
            PropertySpec {
                uri: Some("http://example.org/stats/population".to_string()),
                ..Default::default()
            },
            "http://example.org/",
        );

        let namespaces = schema.namespaces();

        let label = &namespaces.id_to_qname["label"];
        assert_eq!(label.base, "http://www.w3.org/2000/01/rdf-schema#");
        assert_eq!(label.local_name, "label");
        assert_eq!(label.prefix, "a", "first base discovered gets 'a'");

        let population = &namespaces.id_to_qname["population"];
        assert_eq!(population.base, "http://example.org/stats/");
        assert_eq!(population.local_name, "population");

        assert_eq!(
            namespaces.prefix_to_base[&label.prefix],
            label.base,
            "prefix map inverts the assignment"
        );
    }
}
