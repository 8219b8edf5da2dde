//! # Schema Tree Model
//!
//! `SchemaNode` is one node of a generated JSON Schema (draft 4 vocabulary
//! with numeric `exclusiveMinimum`/`exclusiveMaximum`) plus the
//! `x-uiDefinition` extension carrying the node's [`BehaviorDescriptor`].
//!
//! ## Design
//!
//! - Property-like maps (`properties`, `patternProperties`, `definitions`)
//!   are [`PropertyMap`]s, which serialize as JSON objects but keep
//!   insertion order so declared member order survives into the schema
//!   text.
//! - `$ref` values are document-local: `#` for the root and
//!   `#/definitions/<key>` for everything else. [`SchemaNode::resolve`]
//!   follows them against the root node.
//! - A wrapper node that carries `$ref` contributes only its
//!   behavior descriptor; constraint facets are read from the referenced
//!   node.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};

use crate::behavior::BehaviorDescriptor;

/// Draft identifier stamped on generated root schemas.
pub const DRAFT_URI: &str = "http://json-schema.org/draft-04/schema#";

/// Prefix of document-local definition references.
pub const DEFINITIONS_PREFIX: &str = "#/definitions/";

// ─── Primitive types ─────────────────────────────────────────────────

/// A JSON primitive type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    Array,
    Boolean,
    Integer,
    Null,
    Number,
    Object,
    String,
}

impl PrimitiveType {
    /// The natural type of a JSON value. Integral numbers report `Integer`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Array => "array",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Null => "null",
            Self::Number => "number",
            Self::Object => "object",
            Self::String => "string",
        };
        f.write_str(name)
    }
}

/// The set of types a node admits. Empty means "any type".
///
/// Serialized as a single string when it holds one type and as an array
/// otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TypeSet(Vec<PrimitiveType>);

impl TypeSet {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn single(ty: PrimitiveType) -> Self {
        Self(vec![ty])
    }

    pub fn of(types: impl IntoIterator<Item = PrimitiveType>) -> Self {
        let mut set = Self::empty();
        for ty in types {
            set.insert(ty);
        }
        set
    }

    /// Add a type, keeping the set sorted and deduplicated.
    pub fn insert(&mut self, ty: PrimitiveType) {
        if let Err(position) = self.0.binary_search(&ty) {
            self.0.insert(position, ty);
        }
    }

    pub fn contains(&self, ty: PrimitiveType) -> bool {
        self.0.binary_search(&ty).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = PrimitiveType> + '_ {
        self.0.iter().copied()
    }
}

impl Serialize for TypeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.as_slice() {
            [single] => single.serialize(serializer),
            many => many.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for TypeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            One(PrimitiveType),
            Many(Vec<PrimitiveType>),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::One(ty) => TypeSet::single(ty),
            Repr::Many(types) => TypeSet::of(types),
        })
    }
}

// ─── Ordered property maps ───────────────────────────────────────────

/// An insertion-ordered map from names to schema nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap(Vec<(String, SchemaNode)>);

impl PropertyMap {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert or replace in place. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, node: SchemaNode) {
        let name = name.into();
        match self.0.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = node,
            None => self.0.push((name, node)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.0.iter().find(|(key, _)| key == name).map(|(_, node)| node)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.0.iter().map(|(key, node)| (key.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for PropertyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, node) in &self.0 {
            map.serialize_entry(key, node)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PropertyMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PropertyMapVisitor;

        impl<'de> Visitor<'de> for PropertyMapVisitor {
            type Value = PropertyMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of schema nodes")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<PropertyMap, A::Error> {
                let mut map = PropertyMap::new();
                while let Some((key, node)) = access.next_entry::<String, SchemaNode>()? {
                    map.insert(key, node);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(PropertyMapVisitor)
    }
}

// ─── Sub-schema slots ────────────────────────────────────────────────

/// The `items` keyword: one schema for every item, or a tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Items {
    Tuple(Vec<SchemaNode>),
    Single(Box<SchemaNode>),
}

/// `additionalItems` / `additionalProperties`: a flag or a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Additional {
    Allowed(bool),
    Schema(Box<SchemaNode>),
}

// ─── Schema node ─────────────────────────────────────────────────────

/// One node of a JSON Schema tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<String>,
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "TypeSet::is_empty")]
    pub types: TypeSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    // Numbers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<Number>,

    // Strings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    // Arrays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Items>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_items: Option<Additional>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique_items: bool,

    // Objects
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "PropertyMap::is_empty")]
    pub properties: PropertyMap,
    #[serde(default, skip_serializing_if = "PropertyMap::is_empty")]
    pub pattern_properties: PropertyMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Additional>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_properties: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<u64>,

    // Enumerations
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enumeration: Vec<Value>,
    #[serde(rename = "x-enumNames", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_names: Vec<String>,

    // Combinators
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<SchemaNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<SchemaNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<SchemaNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<SchemaNode>>,

    #[serde(rename = "x-uiDefinition", default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<BehaviorDescriptor>,

    #[serde(default, skip_serializing_if = "PropertyMap::is_empty")]
    pub definitions: PropertyMap,
}

impl SchemaNode {
    /// A node admitting exactly one type.
    pub fn typed(ty: PrimitiveType) -> Self {
        Self {
            types: TypeSet::single(ty),
            ..Self::default()
        }
    }

    /// A `$ref` wrapper pointing at a definition key (or `#` for the root).
    pub fn reference_to(key: &str) -> Self {
        let target = if key == "#" {
            "#".to_string()
        } else {
            format!("{DEFINITIONS_PREFIX}{key}")
        };
        Self {
            reference: Some(target),
            ..Self::default()
        }
    }

    /// Whether this node does nothing but admit `null`.
    pub fn is_null_only(&self) -> bool {
        self.types == TypeSet::single(PrimitiveType::Null)
            && self.reference.is_none()
            && self.one_of.is_empty()
            && self.any_of.is_empty()
            && self.all_of.is_empty()
    }

    /// Whether `null` is an accepted value: either by type or through a
    /// `oneOf`/`anyOf` alternative that only admits `null`.
    pub fn is_nullable(&self) -> bool {
        self.types.contains(PrimitiveType::Null)
            || self.one_of.iter().any(SchemaNode::is_null_only)
            || self.any_of.iter().any(SchemaNode::is_null_only)
    }

    /// Follow `$ref` links against `root` until a concrete node is reached.
    ///
    /// Unresolvable references resolve to the wrapper itself.
    pub fn resolve<'a>(&'a self, root: &'a SchemaNode) -> &'a SchemaNode {
        let mut current = self;
        for _ in 0..64 {
            let Some(reference) = current.reference.as_deref() else {
                return current;
            };
            let next = if reference == "#" {
                Some(root)
            } else {
                reference
                    .strip_prefix(DEFINITIONS_PREFIX)
                    .and_then(|key| root.definitions.get(key))
            };
            match next {
                Some(node) if !std::ptr::eq(node, current) => current = node,
                _ => return current,
            }
        }
        current
    }

    /// The node's behavior, or the behavior of the node it references.
    pub fn effective_behavior<'a>(&'a self, root: &'a SchemaNode) -> Option<&'a BehaviorDescriptor> {
        self.behavior
            .as_ref()
            .or_else(|| self.resolve(root).behavior.as_ref())
    }

    /// Pretty-printed JSON text.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
