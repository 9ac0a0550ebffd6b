//! Schema Documents and Nodes
//!
//! The input-side data model. A [`SchemaDocument`] is one parsed file,
//! immutable after load and shared behind `Rc`. A [`SchemaNode`] is the
//! recursive schema entity with every recognized keyword parsed out;
//! each node is stamped with its JSON pointer so that `(document URI,
//! pointer)` is a stable identity for memoization.
//!
//! `$ref` values are kept verbatim here. Dereferencing is the resolver's
//! job, never the parser's.

pub mod loader;
pub mod resolver;

pub use loader::Loader;
pub use resolver::{Resolved, Resolver};

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde_json::Value;
use url::Url;

use crate::error::{GenerateError, Result};

/// Stable identity of a schema node across the run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    /// Canonical URI of the owning document
    pub document: String,
    /// JSON pointer of the node within the document
    pub pointer: String,
}

impl NodeId {
    pub fn new(document: impl Into<String>, pointer: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            pointer: pointer.into(),
        }
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.document, self.pointer)
    }
}

/// The `type` keyword values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SimpleType {
    Object,
    Array,
    String,
    Integer,
    Number,
    Boolean,
    Null,
}

impl SimpleType {
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
        }
    }
}

/// The `additionalProperties` keyword
#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<SchemaNode>),
}

/// One schema object, with children owned inline.
///
/// Multiple mechanisms may co-occur on a single node (`$ref` next to
/// `description`, `type` next to `enum`); normalization happens in the
/// synthesizer, not here.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaNode {
    /// JSON pointer of this node within its document
    pub pointer: String,
    /// Set when the schema is the literal `true` or `false`
    pub boolean: Option<bool>,
    pub types: Vec<SimpleType>,
    pub reference: Option<String>,
    pub all_of: Vec<SchemaNode>,
    pub any_of: Vec<SchemaNode>,
    pub one_of: Vec<SchemaNode>,
    pub enum_values: Vec<Value>,
    pub const_value: Option<Value>,
    pub properties: BTreeMap<String, SchemaNode>,
    pub required: Vec<String>,
    pub additional: Option<AdditionalProperties>,
    pub items: Option<Box<SchemaNode>>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub pattern: Option<String>,
    pub format: Option<String>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub default: Option<Value>,
    pub description: Option<String>,
    pub title: Option<String>,
    /// `$defs` and legacy `definitions`, folded together
    pub defs: BTreeMap<String, SchemaNode>,
    /// Keywords we recognize but cannot ignore safely (`if`, `not`, ...)
    pub unsupported_keywords: Vec<String>,
    /// Keywords we do not recognize at all
    pub unknown_keywords: Vec<String>,
}

/// Keywords that are consumed structurally or deliberately ignored.
const KNOWN_KEYWORDS: &[&str] = &[
    "$id",
    "$schema",
    "$comment",
    "$anchor",
    "$ref",
    "$defs",
    "definitions",
    "type",
    "allOf",
    "anyOf",
    "oneOf",
    "enum",
    "const",
    "properties",
    "required",
    "additionalProperties",
    "items",
    "minItems",
    "maxItems",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "pattern",
    "format",
    "minLength",
    "maxLength",
    "default",
    "description",
    "title",
    "examples",
    "deprecated",
    "readOnly",
    "writeOnly",
    "uniqueItems",
];

/// Keywords whose silent ignore would change the meaning of generated code.
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "if",
    "then",
    "else",
    "not",
    "dependentSchemas",
    "dependentRequired",
    "dependencies",
    "patternProperties",
    "propertyNames",
    "unevaluatedProperties",
    "unevaluatedItems",
    "prefixItems",
    "contains",
];

impl SchemaNode {
    /// Parse a schema node from a JSON value, stamping `pointer` on it and
    /// every descendant.
    pub fn parse(value: &Value, pointer: &str) -> Result<SchemaNode> {
        match value {
            Value::Bool(b) => Ok(SchemaNode {
                pointer: pointer.to_string(),
                boolean: Some(*b),
                ..SchemaNode::default()
            }),
            Value::Object(map) => Self::parse_object(map, pointer),
            other => Err(GenerateError::Load {
                uri: pointer.to_string(),
                reason: format!("schema must be an object or boolean, got {}", kind_name(other)),
            }),
        }
    }

    fn parse_object(map: &serde_json::Map<String, Value>, pointer: &str) -> Result<SchemaNode> {
        let mut node = SchemaNode {
            pointer: pointer.to_string(),
            ..SchemaNode::default()
        };

        match map.get("type") {
            Some(Value::String(s)) => {
                if let Some(t) = SimpleType::from_keyword(s) {
                    node.types.push(t);
                }
            }
            Some(Value::Array(arr)) => {
                for v in arr {
                    if let Some(t) = v.as_str().and_then(SimpleType::from_keyword) {
                        if !node.types.contains(&t) {
                            node.types.push(t);
                        }
                    }
                }
                node.types.sort();
            }
            _ => {}
        }

        node.reference = map.get("$ref").and_then(Value::as_str).map(String::from);

        for (keyword, target) in [
            ("allOf", &mut node.all_of),
            ("anyOf", &mut node.any_of),
            ("oneOf", &mut node.one_of),
        ] {
            if let Some(Value::Array(arr)) = map.get(keyword) {
                for (i, sub) in arr.iter().enumerate() {
                    let child = format!("{pointer}/{keyword}/{i}");
                    target.push(SchemaNode::parse(sub, &child)?);
                }
            }
        }

        if let Some(Value::Array(arr)) = map.get("enum") {
            node.enum_values = arr.clone();
        }
        node.const_value = map.get("const").cloned();

        if let Some(Value::Object(props)) = map.get("properties") {
            for (name, sub) in props {
                let child = format!("{pointer}/properties/{}", escape_pointer_token(name));
                node.properties
                    .insert(name.clone(), SchemaNode::parse(sub, &child)?);
            }
        }

        if let Some(Value::Array(arr)) = map.get("required") {
            node.required = arr
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect();
            node.required.sort();
            node.required.dedup();
        }

        node.additional = match map.get("additionalProperties") {
            Some(Value::Bool(b)) => Some(AdditionalProperties::Allowed(*b)),
            Some(other @ Value::Object(_)) => {
                let child = format!("{pointer}/additionalProperties");
                Some(AdditionalProperties::Schema(Box::new(SchemaNode::parse(
                    other, &child,
                )?)))
            }
            _ => None,
        };

        if let Some(items) = map.get("items") {
            // Draft 2020-12 tuple form lands under prefixItems and is rejected
            // below; a bare array here is the legacy tuple form.
            if items.is_array() {
                node.unsupported_keywords.push("items (tuple form)".to_string());
            } else {
                let child = format!("{pointer}/items");
                node.items = Some(Box::new(SchemaNode::parse(items, &child)?));
            }
        }

        node.min_items = map.get("minItems").and_then(Value::as_u64);
        node.max_items = map.get("maxItems").and_then(Value::as_u64);
        node.minimum = map.get("minimum").and_then(Value::as_f64);
        node.maximum = map.get("maximum").and_then(Value::as_f64);

        // Draft 4 spells exclusive bounds as booleans modifying minimum and
        // maximum; later drafts use standalone numbers. Normalize both to the
        // numeric form.
        match map.get("exclusiveMinimum") {
            Some(Value::Bool(true)) => {
                node.exclusive_minimum = node.minimum.take();
            }
            Some(v) if v.is_number() => node.exclusive_minimum = v.as_f64(),
            _ => {}
        }
        match map.get("exclusiveMaximum") {
            Some(Value::Bool(true)) => {
                node.exclusive_maximum = node.maximum.take();
            }
            Some(v) if v.is_number() => node.exclusive_maximum = v.as_f64(),
            _ => {}
        }

        node.pattern = map.get("pattern").and_then(Value::as_str).map(String::from);
        node.format = map.get("format").and_then(Value::as_str).map(String::from);
        node.min_length = map.get("minLength").and_then(Value::as_u64);
        node.max_length = map.get("maxLength").and_then(Value::as_u64);
        node.default = map.get("default").cloned();
        node.description = map
            .get("description")
            .and_then(Value::as_str)
            .map(String::from);
        node.title = map.get("title").and_then(Value::as_str).map(String::from);

        for defs_keyword in ["$defs", "definitions"] {
            if let Some(Value::Object(defs)) = map.get(defs_keyword) {
                for (name, sub) in defs {
                    let child =
                        format!("{pointer}/{defs_keyword}/{}", escape_pointer_token(name));
                    node.defs
                        .insert(name.clone(), SchemaNode::parse(sub, &child)?);
                }
            }
        }

        for key in map.keys() {
            if UNSUPPORTED_KEYWORDS.contains(&key.as_str()) {
                node.unsupported_keywords.push(key.clone());
            } else if !KNOWN_KEYWORDS.contains(&key.as_str()) {
                node.unknown_keywords.push(key.clone());
            }
        }

        Ok(node)
    }

    /// True when the node carries no keyword at all (the `Empty` kind)
    pub fn is_empty_schema(&self) -> bool {
        self.boolean.is_none()
            && self.types.is_empty()
            && self.reference.is_none()
            && self.all_of.is_empty()
            && self.any_of.is_empty()
            && self.one_of.is_empty()
            && self.enum_values.is_empty()
            && self.const_value.is_none()
            && self.properties.is_empty()
            && self.items.is_none()
    }

    /// True when the node is a `$ref` plus, at most, cosmetic siblings.
    ///
    /// Structural siblings force the resolver to merge rather than alias.
    pub fn is_plain_reference(&self) -> bool {
        self.reference.is_some()
            && self.types.is_empty()
            && self.all_of.is_empty()
            && self.any_of.is_empty()
            && self.one_of.is_empty()
            && self.enum_values.is_empty()
            && self.const_value.is_none()
            && self.properties.is_empty()
            && self.items.is_none()
            && self.additional.is_none()
            && self.constraint_free()
            && self.default.is_none()
    }

    fn constraint_free(&self) -> bool {
        self.min_items.is_none()
            && self.max_items.is_none()
            && self.minimum.is_none()
            && self.maximum.is_none()
            && self.exclusive_minimum.is_none()
            && self.exclusive_maximum.is_none()
            && self.pattern.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
    }
}

fn kind_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Escape a property name for use as a JSON pointer token
pub fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// One parsed schema file. Created once per load, immutable afterward,
/// owned by the loader cache.
pub struct SchemaDocument {
    /// Canonical absolute URI the document was loaded from
    pub uri: Url,
    /// The document's `$id`, if any
    pub id: Option<String>,
    /// The raw JSON-compatible tree
    pub raw: Value,
    /// Parsed nodes keyed by JSON pointer, filled on demand
    nodes: RefCell<HashMap<String, Rc<SchemaNode>>>,
}

impl SchemaDocument {
    pub fn new(uri: Url, raw: Value) -> Self {
        let id = raw
            .get("$id")
            .and_then(Value::as_str)
            .map(String::from);
        Self {
            uri,
            id,
            raw,
            nodes: RefCell::new(HashMap::new()),
        }
    }

    /// The identity schemas are keyed by: the `$id` when present, the
    /// loader URI otherwise.
    pub fn identity(&self) -> &str {
        self.id.as_deref().unwrap_or_else(|| self.uri.as_str())
    }

    /// Base URI for resolving relative `$ref`s out of this document
    pub fn base_uri(&self) -> Url {
        if let Some(id) = &self.id {
            if let Ok(url) = Url::parse(id) {
                return url;
            }
        }
        self.uri.clone()
    }

    /// Parsed root node
    pub fn root(&self) -> Result<Rc<SchemaNode>> {
        self.node_at("")
    }

    /// Parse (or fetch the cached parse of) the node at a JSON pointer.
    pub fn node_at(&self, pointer: &str) -> Result<Rc<SchemaNode>> {
        if let Some(node) = self.nodes.borrow().get(pointer) {
            return Ok(node.clone());
        }
        let target = self.raw.pointer(pointer).ok_or_else(|| GenerateError::Ref {
            reference: format!("#{pointer}"),
            base: self.uri.to_string(),
            reason: "no value at pointer".to_string(),
        })?;
        let node = Rc::new(SchemaNode::parse(target, pointer)?);
        self.nodes
            .borrow_mut()
            .insert(pointer.to_string(), node.clone());
        Ok(node)
    }

    /// Node identity for memoization
    pub fn node_id(&self, pointer: &str) -> NodeId {
        NodeId::new(self.uri.as_str(), pointer)
    }
}

impl std::fmt::Debug for SchemaDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaDocument")
            .field("uri", &self.uri.as_str())
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_extracts_core_keywords() {
        let node = SchemaNode::parse(
            &json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "age": {"type": "integer", "minimum": 0}
                },
                "required": ["name"]
            }),
            "",
        )
        .unwrap();

        assert_eq!(node.types, vec![SimpleType::Object]);
        assert_eq!(node.required, vec!["name"]);
        let age = &node.properties["age"];
        assert_eq!(age.pointer, "/properties/age");
        assert_eq!(age.minimum, Some(0.0));
    }

    #[test]
    fn parse_normalizes_draft4_exclusive_bounds() {
        let node = SchemaNode::parse(
            &json!({"type": "integer", "minimum": 3, "exclusiveMinimum": true}),
            "",
        )
        .unwrap();
        assert_eq!(node.minimum, None);
        assert_eq!(node.exclusive_minimum, Some(3.0));

        let node = SchemaNode::parse(&json!({"type": "integer", "exclusiveMaximum": 9}), "")
            .unwrap();
        assert_eq!(node.exclusive_maximum, Some(9.0));
    }

    #[test]
    fn parse_folds_definitions_into_defs() {
        let node = SchemaNode::parse(
            &json!({
                "$defs": {"a": {"type": "string"}},
                "definitions": {"b": {"type": "integer"}}
            }),
            "",
        )
        .unwrap();
        assert_eq!(node.defs["a"].pointer, "/$defs/a");
        assert_eq!(node.defs["b"].pointer, "/definitions/b");
    }

    #[test]
    fn parse_flags_unsupported_and_unknown_keywords() {
        let node = SchemaNode::parse(
            &json!({"if": {}, "then": {}, "x-vendor": true, "type": "object"}),
            "",
        )
        .unwrap();
        assert!(node.unsupported_keywords.contains(&"if".to_string()));
        assert_eq!(node.unknown_keywords, vec!["x-vendor"]);
    }

    #[test]
    fn plain_reference_detection() {
        let plain =
            SchemaNode::parse(&json!({"$ref": "#/$defs/a", "description": "x"}), "").unwrap();
        assert!(plain.is_plain_reference());

        let merged =
            SchemaNode::parse(&json!({"$ref": "#/$defs/a", "minLength": 3}), "").unwrap();
        assert!(!merged.is_plain_reference());
    }

    #[test]
    fn document_node_at_walks_pointers() {
        let doc = SchemaDocument::new(
            Url::parse("file:///tmp/s.json").unwrap(),
            json!({"$id": "https://example.com/s.json", "$defs": {"a/b": {"type": "string"}}}),
        );
        assert_eq!(doc.identity(), "https://example.com/s.json");
        let node = doc.node_at("/$defs/a~1b").unwrap();
        assert_eq!(node.types, vec![SimpleType::String]);
        assert!(doc.node_at("/$defs/missing").is_err());
    }
}
