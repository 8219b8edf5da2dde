//! # Validator Core
//!
//! Recursive JSON Schema validation producing the complete, path-exact
//! error set for a document in one pass.
//!
//! ## Design
//!
//! - Every facet of a node is evaluated even when an earlier one failed:
//!   combinators, then type facets, then enumeration membership, then
//!   object facets.
//! - Declared properties are visited even when absent from the document,
//!   so a [`ValidationHook`] sees every declared node. A missing value
//!   produces no errors of its own; `required` handles presence.
//! - Sub-schema failures (combinator candidates, array items, additional
//!   properties) are wrapped in aggregate errors whose children keep the
//!   nested errors. See [`crate::error::flatten_errors`].
//! - The validator never mutates the document. A hook that wants a node
//!   validated against a different value returns it through
//!   [`VisitAction::revalidate`]; recording the substitution is the
//!   hook's business.
//! - Hooks run for the root and for every property, item and additional
//!   property node. Combinator candidates are evaluated against the same
//!   value without a visit of their own.
//! - Hook effects inside combinator candidates are speculative. Every
//!   candidate runs between [`ValidationHook::begin_candidate`] and
//!   [`ValidationHook::discard_candidate`]; the candidates that decide the
//!   combinator are then replayed against the live hook. A failed
//!   combinator replays nothing.
//! - Declared properties of a value that is not an object are not visited.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use modcfg_core::{CanonicalText, DocumentPath};
use regex::Regex;
use serde_json::{Map, Number, Value};

use crate::behavior::BehaviorDescriptor;
use crate::error::{ChildErrors, ErrorKind, ValidationError};
use crate::format::{default_format_validators, FormatValidator};
use crate::node::{Additional, Items, PrimitiveType, SchemaNode};

// ─── Settings ────────────────────────────────────────────────────────

/// How object keys are compared to declared property names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyNameMatching {
    #[default]
    Exact,
    IgnoreAsciiCase,
}

impl PropertyNameMatching {
    pub fn matches(&self, key: &str, name: &str) -> bool {
        match self {
            Self::Exact => key == name,
            Self::IgnoreAsciiCase => key.eq_ignore_ascii_case(name),
        }
    }
}

/// Validator configuration.
pub struct ValidatorSettings {
    pub property_name_matching: PropertyNameMatching,
    pub formats: Vec<Box<dyn FormatValidator>>,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            property_name_matching: PropertyNameMatching::Exact,
            formats: default_format_validators(),
        }
    }
}

impl fmt::Debug for ValidatorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorSettings")
            .field("property_name_matching", &self.property_name_matching)
            .field(
                "formats",
                &self.formats.iter().map(|v| v.format()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// ─── Hooks ───────────────────────────────────────────────────────────

/// A node about to be validated.
#[derive(Debug, Clone, Copy)]
pub struct NodeVisit<'a> {
    pub path: &'a DocumentPath,
    /// Property name, `[n]` for items, or `None` at the root.
    pub property: Option<&'a str>,
    /// The node as declared, possibly a `$ref` wrapper.
    pub schema: &'a SchemaNode,
    /// The node after following references.
    pub resolved: &'a SchemaNode,
    pub root: &'a SchemaNode,
    /// The document value, or `None` for a declared but absent property.
    pub value: Option<&'a Value>,
}

impl<'a> NodeVisit<'a> {
    /// Behavior of the declared node, falling back to the referenced one.
    pub fn behavior(&self) -> Option<&'a BehaviorDescriptor> {
        self.schema.effective_behavior(self.root)
    }
}

/// What a hook wants done with a visited node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitAction {
    pub errors: Vec<ValidationError>,
    /// A replacement value, validated in addition to the document's own.
    pub revalidate: Option<Value>,
}

/// Extension point for host-specific validation semantics.
pub trait ValidationHook {
    fn on_visit(&mut self, visit: &NodeVisit<'_>) -> VisitAction;

    /// Start a combinator candidate whose effects may be undone. Calls nest.
    fn begin_candidate(&mut self) {}

    /// Undo every effect since the matching [`Self::begin_candidate`].
    fn discard_candidate(&mut self) {}
}

/// A hook that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passive;

impl ValidationHook for Passive {
    fn on_visit(&mut self, _visit: &NodeVisit<'_>) -> VisitAction {
        VisitAction::default()
    }
}

// ─── Validator ───────────────────────────────────────────────────────

/// Validates documents against one schema tree.
pub struct Validator<'s> {
    root: &'s SchemaNode,
    settings: &'s ValidatorSettings,
    patterns: RefCell<HashMap<String, Option<Regex>>>,
}

impl<'s> Validator<'s> {
    pub fn new(root: &'s SchemaNode, settings: &'s ValidatorSettings) -> Self {
        Self {
            root,
            settings,
            patterns: RefCell::new(HashMap::new()),
        }
    }

    pub fn validate(&self, document: &Value) -> Vec<ValidationError> {
        self.validate_with(document, &mut Passive)
    }

    pub fn validate_with(
        &self,
        document: &Value,
        hook: &mut dyn ValidationHook,
    ) -> Vec<ValidationError> {
        self.visit(hook, Some(document), self.root, None, &DocumentPath::root())
    }

    /// Parse `text` and validate it.
    pub fn validate_text(
        &self,
        text: &str,
        hook: &mut dyn ValidationHook,
    ) -> Result<(Value, Vec<ValidationError>), serde_json::Error> {
        let document: Value = serde_json::from_str(text)?;
        let errors = self.validate_with(&document, hook);
        Ok((document, errors))
    }

    fn visit(
        &self,
        hook: &mut dyn ValidationHook,
        value: Option<&Value>,
        schema: &SchemaNode,
        property: Option<&str>,
        path: &DocumentPath,
    ) -> Vec<ValidationError> {
        let resolved = schema.resolve(self.root);
        let mut errors = match value {
            Some(value) => self.evaluate(hook, value, resolved, property, path),
            None => Vec::new(),
        };
        let action = hook.on_visit(&NodeVisit {
            path,
            property,
            schema,
            resolved,
            root: self.root,
            value,
        });
        errors.extend(action.errors);
        if let Some(replacement) = &action.revalidate {
            errors.extend(self.evaluate(&mut Passive, replacement, resolved, property, path));
        }
        errors
    }

    fn evaluate(
        &self,
        hook: &mut dyn ValidationHook,
        value: &Value,
        node: &SchemaNode,
        property: Option<&str>,
        path: &DocumentPath,
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        self.check_any_of(hook, value, node, property, path, &mut errors);
        self.check_all_of(hook, value, node, property, path, &mut errors);
        self.check_one_of(hook, value, node, property, path, &mut errors);
        self.check_not(value, node, property, path, &mut errors);
        self.check_types(hook, value, node, property, path, &mut errors);
        self.check_enum(value, node, property, path, &mut errors);
        self.check_properties(hook, value, node, property, path, &mut errors);
        errors
    }

    /// Visit `value` against a sub-schema; wrap any failure in `kind`.
    fn child(
        &self,
        hook: &mut dyn ValidationHook,
        value: &Value,
        schema: &SchemaNode,
        kind: ErrorKind,
        property: &str,
        path: &DocumentPath,
    ) -> Option<ValidationError> {
        let nested = self.visit(hook, Some(value), schema, Some(property), path);
        if nested.is_empty() {
            None
        } else {
            Some(
                ValidationError::new(kind, Some(property), path)
                    .with_children(ChildErrors::Schemas(vec![nested])),
            )
        }
    }

    fn candidates(
        &self,
        hook: &mut dyn ValidationHook,
        value: &Value,
        schemas: &[SchemaNode],
        property: Option<&str>,
        path: &DocumentPath,
    ) -> Vec<Vec<ValidationError>> {
        schemas
            .iter()
            .map(|candidate| {
                hook.begin_candidate();
                let errors =
                    self.evaluate(hook, value, candidate.resolve(self.root), property, path);
                hook.discard_candidate();
                errors
            })
            .collect()
    }

    /// Re-run the deciding candidates so their hook effects stick.
    fn replay<'c>(
        &self,
        hook: &mut dyn ValidationHook,
        value: &Value,
        chosen: impl IntoIterator<Item = &'c SchemaNode>,
        property: Option<&str>,
        path: &DocumentPath,
    ) {
        for candidate in chosen {
            self.evaluate(hook, value, candidate.resolve(self.root), property, path);
        }
    }

    // ─── Combinators ─────────────────────────────────────────────────

    fn check_any_of(
        &self,
        hook: &mut dyn ValidationHook,
        value: &Value,
        node: &SchemaNode,
        property: Option<&str>,
        path: &DocumentPath,
        errors: &mut Vec<ValidationError>,
    ) {
        if node.any_of.is_empty() {
            return;
        }
        let results = self.candidates(hook, value, &node.any_of, property, path);
        match results.iter().position(Vec::is_empty) {
            Some(first) => self.replay(hook, value, &node.any_of[first..=first], property, path),
            None => errors.push(
                ValidationError::new(ErrorKind::NotAnyOf, property, path)
                    .with_children(ChildErrors::Schemas(results)),
            ),
        }
    }

    fn check_all_of(
        &self,
        hook: &mut dyn ValidationHook,
        value: &Value,
        node: &SchemaNode,
        property: Option<&str>,
        path: &DocumentPath,
        errors: &mut Vec<ValidationError>,
    ) {
        if node.all_of.is_empty() {
            return;
        }
        let results = self.candidates(hook, value, &node.all_of, property, path);
        if results.iter().all(Vec::is_empty) {
            self.replay(hook, value, &node.all_of, property, path);
        } else {
            errors.push(
                ValidationError::new(ErrorKind::NotAllOf, property, path)
                    .with_children(ChildErrors::Schemas(results)),
            );
        }
    }

    fn check_one_of(
        &self,
        hook: &mut dyn ValidationHook,
        value: &Value,
        node: &SchemaNode,
        property: Option<&str>,
        path: &DocumentPath,
        errors: &mut Vec<ValidationError>,
    ) {
        if node.one_of.is_empty() {
            return;
        }
        let results = self.candidates(hook, value, &node.one_of, property, path);
        let passing: Vec<usize> = (0..results.len()).filter(|&i| results[i].is_empty()).collect();
        match passing[..] {
            [only] => self.replay(hook, value, &node.one_of[only..=only], property, path),
            _ => errors.push(
                ValidationError::new(ErrorKind::NotOneOf, property, path)
                    .with_children(ChildErrors::Schemas(results)),
            ),
        }
    }

    fn check_not(
        &self,
        value: &Value,
        node: &SchemaNode,
        property: Option<&str>,
        path: &DocumentPath,
        errors: &mut Vec<ValidationError>,
    ) {
        let Some(excluded) = &node.not else {
            return;
        };
        if self
            .evaluate(&mut Passive, value, excluded.resolve(self.root), property, path)
            .is_empty()
        {
            errors.push(ValidationError::new(
                ErrorKind::ExcludedSchemaValidates,
                property,
                path,
            ));
        }
    }

    // ─── Types ───────────────────────────────────────────────────────

    fn check_types(
        &self,
        hook: &mut dyn ValidationHook,
        value: &Value,
        node: &SchemaNode,
        property: Option<&str>,
        path: &DocumentPath,
        errors: &mut Vec<ValidationError>,
    ) {
        if value.is_null() && node.is_nullable() {
            return;
        }
        if node.types.len() <= 1 {
            // An untyped node has no type facets.
            if let Some(ty) = node.types.iter().next() {
                self.check_type(hook, value, ty, node, property, path, errors);
            }
            return;
        }
        let mut per_type = Vec::with_capacity(node.types.len());
        for ty in node.types.iter() {
            let mut type_errors = Vec::new();
            self.check_type(hook, value, ty, node, property, path, &mut type_errors);
            if type_errors.is_empty() {
                return;
            }
            per_type.push((ty, type_errors));
        }
        errors.push(
            ValidationError::new(ErrorKind::NoTypeValidates, property, path)
                .with_children(ChildErrors::Types(per_type)),
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn check_type(
        &self,
        hook: &mut dyn ValidationHook,
        value: &Value,
        ty: PrimitiveType,
        node: &SchemaNode,
        property: Option<&str>,
        path: &DocumentPath,
        errors: &mut Vec<ValidationError>,
    ) {
        let expected = |kind| ValidationError::new(kind, property, path);
        match ty {
            PrimitiveType::Array => match value {
                Value::Array(items) => self.check_array(hook, items, node, property, path, errors),
                _ => errors.push(expected(ErrorKind::ArrayExpected)),
            },
            PrimitiveType::String => match value {
                Value::String(text) => self.check_string(text, node, property, path, errors),
                _ => errors.push(expected(ErrorKind::StringExpected)),
            },
            PrimitiveType::Number => match value {
                Value::Number(number) => check_number(number, node, property, path, errors),
                _ => errors.push(expected(ErrorKind::NumberExpected)),
            },
            PrimitiveType::Integer => match value {
                Value::Number(number) if number.is_i64() || number.is_u64() => {
                    check_number(number, node, property, path, errors)
                }
                _ => errors.push(expected(ErrorKind::IntegerExpected)),
            },
            PrimitiveType::Boolean => {
                if !value.is_boolean() {
                    errors.push(expected(ErrorKind::BooleanExpected));
                }
            }
            PrimitiveType::Null => {
                if !value.is_null() {
                    errors.push(expected(ErrorKind::NullExpected));
                }
            }
            PrimitiveType::Object => {
                if !value.is_object() {
                    errors.push(expected(ErrorKind::ObjectExpected));
                }
            }
        }
    }

    fn check_array(
        &self,
        hook: &mut dyn ValidationHook,
        items: &[Value],
        node: &SchemaNode,
        property: Option<&str>,
        path: &DocumentPath,
        errors: &mut Vec<ValidationError>,
    ) {
        let count = items.len() as u64;
        if node.min_items.is_some_and(|min| min > 0 && count < min) {
            errors.push(ValidationError::new(ErrorKind::TooFewItems, property, path));
        }
        if node.max_items.is_some_and(|max| max > 0 && count > max) {
            errors.push(ValidationError::new(ErrorKind::TooManyItems, property, path));
        }
        if node.unique_items && !all_unique(items) {
            errors.push(ValidationError::new(ErrorKind::ItemsNotUnique, property, path));
        }

        for (index, item) in items.iter().enumerate() {
            let name = format!("[{index}]");
            let item_path = path.index(index);
            let failure = match &node.items {
                Some(Items::Single(schema)) => self.child(
                    hook,
                    item,
                    schema,
                    ErrorKind::ArrayItemNotValid,
                    &name,
                    &item_path,
                ),
                Some(Items::Tuple(schemas)) => match (schemas.get(index), &node.additional_items) {
                    (Some(schema), _) => self.child(
                        hook,
                        item,
                        schema,
                        ErrorKind::ArrayItemNotValid,
                        &name,
                        &item_path,
                    ),
                    (None, Some(Additional::Schema(schema))) => self.child(
                        hook,
                        item,
                        schema,
                        ErrorKind::AdditionalItemNotValid,
                        &name,
                        &item_path,
                    ),
                    (None, Some(Additional::Allowed(false))) => Some(ValidationError::new(
                        ErrorKind::TooManyItemsInTuple,
                        Some(&name),
                        &item_path,
                    )),
                    (None, _) => None,
                },
                None => None,
            };
            errors.extend(failure);
        }
    }

    fn check_string(
        &self,
        text: &str,
        node: &SchemaNode,
        property: Option<&str>,
        path: &DocumentPath,
        errors: &mut Vec<ValidationError>,
    ) {
        if let Some(pattern) = node.pattern.as_deref().filter(|p| !p.is_empty()) {
            if !self.pattern_matches(pattern, text) {
                errors.push(ValidationError::new(ErrorKind::PatternMismatch, property, path));
            }
        }
        let length = text.chars().count() as u64;
        if node.min_length.is_some_and(|min| length < min) {
            errors.push(ValidationError::new(ErrorKind::StringTooShort, property, path));
        }
        if node.max_length.is_some_and(|max| length > max) {
            errors.push(ValidationError::new(ErrorKind::StringTooLong, property, path));
        }
        if let Some(format) = node.format.as_deref().filter(|f| !f.is_empty()) {
            let validators: Vec<&dyn FormatValidator> = self
                .settings
                .formats
                .iter()
                .map(|v| v.as_ref())
                .filter(|v| v.format() == format)
                .collect();
            if !validators.is_empty() && !validators.iter().any(|v| v.is_valid(text)) {
                let mut kinds: Vec<ErrorKind> = Vec::new();
                for validator in validators {
                    let kind = validator.error_kind();
                    if !kinds.contains(&kind) {
                        kinds.push(kind);
                    }
                }
                for kind in kinds {
                    errors.push(ValidationError::new(kind, property, path));
                }
            }
        }
    }

    /// An invalid pattern never matches.
    fn pattern_matches(&self, pattern: &str, text: &str) -> bool {
        let mut cache = self.patterns.borrow_mut();
        cache
            .entry(pattern.to_string())
            .or_insert_with(|| Regex::new(pattern).ok())
            .as_ref()
            .is_some_and(|regex| regex.is_match(text))
    }

    // ─── Enumerations ────────────────────────────────────────────────

    fn check_enum(
        &self,
        value: &Value,
        node: &SchemaNode,
        property: Option<&str>,
        path: &DocumentPath,
        errors: &mut Vec<ValidationError>,
    ) {
        if value.is_null() && node.is_nullable() {
            return;
        }
        if !node.enumeration.is_empty()
            && !node
                .enumeration
                .iter()
                .any(|member| CanonicalText::same_value(member, value))
        {
            errors.push(ValidationError::new(ErrorKind::NotInEnumeration, property, path));
        }
    }

    // ─── Objects ─────────────────────────────────────────────────────

    fn check_properties(
        &self,
        hook: &mut dyn ValidationHook,
        value: &Value,
        node: &SchemaNode,
        property: Option<&str>,
        path: &DocumentPath,
        errors: &mut Vec<ValidationError>,
    ) {
        let object = value.as_object();
        if object.is_none() && node.types.contains(PrimitiveType::Null) {
            return;
        }
        let matching = self.settings.property_name_matching;

        if let Some(object) = object {
            for (name, schema) in node.properties.iter() {
                let member = find_member(object, name, matching);
                errors.extend(self.visit(hook, member, schema, Some(name), &path.property(name)));
            }
        }

        for name in &node.required {
            if object.and_then(|o| find_member(o, name, matching)).is_none() {
                errors.push(ValidationError::new(
                    ErrorKind::PropertyRequired,
                    Some(name.as_str()),
                    &path.property(name.as_str()),
                ));
            }
        }

        let Some(object) = object else {
            return;
        };
        let count = object.len() as u64;
        if node.max_properties.is_some_and(|max| max > 0 && count > max) {
            errors.push(ValidationError::new(ErrorKind::TooManyProperties, property, path));
        }
        if node.min_properties.is_some_and(|min| min > 0 && count < min) {
            errors.push(ValidationError::new(ErrorKind::TooFewProperties, property, path));
        }

        let mut remaining: Vec<(&String, &Value)> = object
            .iter()
            .filter(|(key, _)| !node.properties.keys().any(|name| matching.matches(key, name)))
            .collect();

        if !node.pattern_properties.is_empty() {
            remaining.retain(|(key, member)| {
                let Some((_, schema)) = node
                    .pattern_properties
                    .iter()
                    .find(|(pattern, _)| self.pattern_matches(pattern, key))
                else {
                    return true;
                };
                errors.extend(self.child(
                    hook,
                    member,
                    schema,
                    ErrorKind::AdditionalPropertiesNotValid,
                    key,
                    &path.property(key.as_str()),
                ));
                false
            });
        }

        match &node.additional_properties {
            Some(Additional::Schema(schema)) => {
                for (key, member) in remaining {
                    errors.extend(self.child(
                        hook,
                        member,
                        schema,
                        ErrorKind::AdditionalPropertiesNotValid,
                        key,
                        &path.key(key.as_str()),
                    ));
                }
            }
            Some(Additional::Allowed(false)) => {
                for (key, _) in remaining {
                    errors.push(ValidationError::new(
                        ErrorKind::NoAdditionalPropertiesAllowed,
                        Some(key.as_str()),
                        &path.key(key.as_str()),
                    ));
                }
            }
            _ => {}
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn find_member<'v>(
    object: &'v Map<String, Value>,
    name: &str,
    matching: PropertyNameMatching,
) -> Option<&'v Value> {
    match matching {
        PropertyNameMatching::Exact => object.get(name),
        PropertyNameMatching::IgnoreAsciiCase => object
            .iter()
            .find(|(key, _)| matching.matches(key, name))
            .map(|(_, value)| value),
    }
}

fn all_unique(items: &[Value]) -> bool {
    let mut seen = HashSet::with_capacity(items.len());
    items.iter().all(|item| {
        let text = CanonicalText::of_value(item)
            .map(CanonicalText::into_string)
            .unwrap_or_else(|_| item.to_string());
        seen.insert(text)
    })
}

/// Exact integer form when the number has one.
fn as_integer(number: &Number) -> Option<i128> {
    number
        .as_i64()
        .map(i128::from)
        .or_else(|| number.as_u64().map(i128::from))
}

fn compare(value: &Number, bound: &Number) -> Option<Ordering> {
    match (as_integer(value), as_integer(bound)) {
        (Some(v), Some(b)) => Some(v.cmp(&b)),
        _ => value.as_f64()?.partial_cmp(&bound.as_f64()?),
    }
}

fn is_multiple_of(value: &Number, factor: &Number) -> bool {
    match (as_integer(value), as_integer(factor)) {
        (Some(_), Some(0)) => true,
        (Some(v), Some(f)) => v % f == 0,
        _ => match (value.as_f64(), factor.as_f64()) {
            (Some(_), Some(f)) if f == 0.0 => true,
            (Some(v), Some(f)) => {
                let quotient = v / f;
                (quotient - quotient.round()).abs() <= f64::EPSILON * quotient.abs().max(1.0)
            }
            _ => true,
        },
    }
}

fn check_number(
    number: &Number,
    node: &SchemaNode,
    property: Option<&str>,
    path: &DocumentPath,
    errors: &mut Vec<ValidationError>,
) {
    let is = |bound: &Option<Number>, accept: fn(Ordering) -> bool| {
        bound
            .as_ref()
            .and_then(|bound| compare(number, bound))
            .is_some_and(|ordering| !accept(ordering))
    };
    if is(&node.minimum, Ordering::is_ge) {
        errors.push(ValidationError::new(ErrorKind::NumberTooSmall, property, path));
    }
    if is(&node.maximum, Ordering::is_le) {
        errors.push(ValidationError::new(ErrorKind::NumberTooBig, property, path));
    }
    if is(&node.exclusive_minimum, Ordering::is_gt) {
        errors.push(ValidationError::new(ErrorKind::NumberTooSmall, property, path));
    }
    if is(&node.exclusive_maximum, Ordering::is_lt) {
        errors.push(ValidationError::new(ErrorKind::NumberTooBig, property, path));
    }
    if node
        .multiple_of
        .as_ref()
        .is_some_and(|factor| !is_multiple_of(number, factor))
    {
        errors.push(ValidationError::new(ErrorKind::NumberNotMultipleOf, property, path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::flatten_errors;
    use crate::node::{PropertyMap, TypeSet};
    use serde_json::json;

    fn node(value: Value) -> SchemaNode {
        serde_json::from_value(value).unwrap()
    }

    fn run(schema: &SchemaNode, document: Value) -> Vec<ValidationError> {
        let settings = ValidatorSettings::default();
        Validator::new(schema, &settings).validate(&document)
    }

    fn paths(errors: &[ValidationError]) -> Vec<String> {
        flatten_errors(errors).into_keys().collect()
    }

    #[test]
    fn test_list_item_errors_are_path_exact() {
        let schema = node(json!({
            "type": "object",
            "properties": {
                "list": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": { "name": { "type": "string", "minLength": 1 } },
                        "required": ["name"]
                    }
                }
            }
        }));
        let errors = run(&schema, json!({ "list": [{ "name": "" }] }));
        let map = flatten_errors(&errors);
        assert_eq!(map["list[0].name"], vec!["String too short"]);
        assert_eq!(map["list[0]"], vec!["Array item not valid"]);
    }

    #[test]
    fn test_map_key_errors_are_quoted() {
        let schema = node(json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "object",
                    "additionalProperties": { "type": "integer", "minimum": 2 }
                }
            }
        }));
        let errors = run(&schema, json!({ "items": { "a b": 1, "ok": 3 } }));
        let map = flatten_errors(&errors);
        assert_eq!(map["items['a b']"], vec!["Additional properties not valid", "Number too small"]);
        assert!(!map.contains_key("items['ok']"));
    }

    #[test]
    fn test_all_facets_are_reported() {
        let schema = node(json!({
            "type": "object",
            "properties": {
                "count": { "type": "integer", "minimum": 10, "multipleOf": 3 }
            }
        }));
        let errors = run(&schema, json!({ "count": 4 }));
        let map = flatten_errors(&errors);
        assert_eq!(map["count"], vec!["Number too small", "Number not multiple of"]);
    }

    #[test]
    fn test_required_properties_reported_even_when_undeclared() {
        let schema = node(json!({ "type": "object", "required": ["missing"] }));
        let errors = run(&schema, json!({}));
        assert_eq!(paths(&errors), vec!["missing"]);
        assert_eq!(errors[0].kind, ErrorKind::PropertyRequired);
    }

    #[test]
    fn test_required_against_non_object() {
        let schema = node(json!({ "type": "object", "required": ["name"] }));
        let errors = run(&schema, json!("text"));
        let kinds: Vec<ErrorKind> = errors.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ErrorKind::ObjectExpected, ErrorKind::PropertyRequired]);
    }

    #[test]
    fn test_multi_type_aggregates() {
        let schema = node(json!({ "type": ["integer", "string"] }));
        assert!(run(&schema, json!(5)).is_empty());
        assert!(run(&schema, json!("five")).is_empty());
        let errors = run(&schema, json!(true));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::NoTypeValidates);
        match &errors[0].children {
            ChildErrors::Types(per_type) => assert_eq!(per_type.len(), 2),
            other => panic!("unexpected children {other:?}"),
        }
    }

    #[test]
    fn test_nullable_skips_type_and_enum() {
        let schema = node(json!({ "type": ["string", "null"], "enum": ["a", "b"] }));
        assert!(run(&schema, json!(null)).is_empty());
        let errors = run(&schema, json!("c"));
        assert_eq!(errors[0].kind, ErrorKind::NotInEnumeration);
    }

    #[test]
    fn test_integer_rejects_fractions() {
        let schema = node(json!({ "type": "integer" }));
        assert_eq!(run(&schema, json!(1.5))[0].kind, ErrorKind::IntegerExpected);
        let number = node(json!({ "type": "number", "maximum": 1.5 }));
        assert_eq!(run(&number, json!(2))[0].kind, ErrorKind::NumberTooBig);
        assert!(run(&number, json!(1.5)).is_empty());
    }

    #[test]
    fn test_large_unsigned_bounds() {
        let schema = node(json!({ "type": "integer", "minimum": 0, "maximum": u64::MAX }));
        assert!(run(&schema, json!(u64::MAX)).is_empty());
        assert_eq!(run(&schema, json!(-1))[0].kind, ErrorKind::NumberTooSmall);
    }

    #[test]
    fn test_exclusive_bounds() {
        let schema = node(json!({ "type": "number", "exclusiveMinimum": 0, "exclusiveMaximum": 1 }));
        assert_eq!(run(&schema, json!(0))[0].kind, ErrorKind::NumberTooSmall);
        assert_eq!(run(&schema, json!(1))[0].kind, ErrorKind::NumberTooBig);
        assert!(run(&schema, json!(0.5)).is_empty());
    }

    #[test]
    fn test_array_facets() {
        let schema = node(json!({
            "type": "array",
            "minItems": 2,
            "uniqueItems": true,
            "items": { "type": "integer" }
        }));
        let errors = run(&schema, json!([1]));
        assert_eq!(errors[0].kind, ErrorKind::TooFewItems);
        let errors = run(&schema, json!([{ "a": 1, "b": 2 }, { "b": 2, "a": 1 }]));
        let kinds: Vec<ErrorKind> = errors.iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&ErrorKind::ItemsNotUnique));
        assert!(kinds.contains(&ErrorKind::ArrayItemNotValid));
    }

    #[test]
    fn test_tuple_additional_items() {
        let schema = node(json!({
            "type": "array",
            "items": [{ "type": "string" }],
            "additionalItems": false
        }));
        let errors = run(&schema, json!(["a", "b"]));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::TooManyItemsInTuple);
        assert_eq!(errors[0].path.to_string(), "[1]");
    }

    #[test]
    fn test_string_facets_and_formats() {
        let schema = node(json!({
            "type": "string",
            "pattern": "^[a-z]+$",
            "maxLength": 3,
            "format": "email"
        }));
        let kinds: Vec<ErrorKind> = run(&schema, json!("ABCD")).iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![ErrorKind::PatternMismatch, ErrorKind::StringTooLong, ErrorKind::EmailExpected]
        );
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        let schema = node(json!({ "type": "string", "pattern": "([" }));
        assert_eq!(run(&schema, json!("x"))[0].kind, ErrorKind::PatternMismatch);
    }

    #[test]
    fn test_combinators() {
        let any = node(json!({ "anyOf": [{ "type": "string" }, { "type": "integer" }] }));
        assert!(run(&any, json!(1)).is_empty());
        assert_eq!(run(&any, json!(true))[0].kind, ErrorKind::NotAnyOf);

        let all = node(json!({ "allOf": [{ "type": "integer" }, { "type": "integer", "minimum": 3 }] }));
        assert_eq!(run(&all, json!(1))[0].kind, ErrorKind::NotAllOf);

        let one = node(json!({ "oneOf": [{ "type": "integer" }, { "type": "number" }] }));
        assert_eq!(run(&one, json!(1))[0].kind, ErrorKind::NotOneOf);
        assert!(run(&one, json!(1.5)).is_empty());

        let not = node(json!({ "not": { "type": "string" } }));
        assert_eq!(run(&not, json!("x"))[0].kind, ErrorKind::ExcludedSchemaValidates);
        assert!(run(&not, json!(1)).is_empty());
    }

    #[test]
    fn test_nullable_reference_suppression() {
        let schema = node(json!({
            "type": "object",
            "properties": {
                "inner": { "oneOf": [{ "type": "null" }, { "$ref": "#/definitions/Inner" }] }
            },
            "definitions": {
                "Inner": {
                    "type": "object",
                    "properties": { "name": { "type": "string" } },
                    "required": ["name"]
                }
            }
        }));
        assert!(run(&schema, json!({ "inner": null })).is_empty());
        let errors = run(&schema, json!({ "inner": {} }));
        let map = flatten_errors(&errors);
        assert_eq!(map.len(), 1);
        assert_eq!(map["inner.name"], vec!["Property required"]);
    }

    #[test]
    fn test_additional_properties_false() {
        let schema = node(json!({
            "type": "object",
            "properties": { "known": { "type": "integer" } },
            "additionalProperties": false
        }));
        let errors = run(&schema, json!({ "known": 1, "$schema": "file:///x", "extra": 2 }));
        assert_eq!(errors.len(), 2);
        let map = flatten_errors(&errors);
        assert_eq!(paths(&errors), vec!["['extra']"]);
        assert_eq!(map["['extra']"], vec!["No additional properties allowed"]);
    }

    #[test]
    fn test_pattern_properties() {
        let schema = node(json!({
            "type": "object",
            "patternProperties": { "^n_": { "type": "integer" } },
            "additionalProperties": false
        }));
        let errors = run(&schema, json!({ "n_a": "x", "other": 1 }));
        let kinds: Vec<ErrorKind> = errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![ErrorKind::AdditionalPropertiesNotValid, ErrorKind::NoAdditionalPropertiesAllowed]
        );
    }

    #[test]
    fn test_case_insensitive_property_matching() {
        let schema = node(json!({
            "type": "object",
            "properties": { "Count": { "type": "integer" } },
            "required": ["Count"],
            "additionalProperties": false
        }));
        let settings = ValidatorSettings {
            property_name_matching: PropertyNameMatching::IgnoreAsciiCase,
            ..ValidatorSettings::default()
        };
        let errors = Validator::new(&schema, &settings).validate(&json!({ "count": "x" }));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::IntegerExpected);
        assert_eq!(errors[0].path.to_string(), "Count");
    }

    struct Recorder {
        visited: Vec<(String, bool)>,
    }

    impl ValidationHook for Recorder {
        fn on_visit(&mut self, visit: &NodeVisit<'_>) -> VisitAction {
            self.visited.push((visit.path.to_string(), visit.value.is_some()));
            VisitAction::default()
        }
    }

    #[test]
    fn test_hook_sees_absent_declared_properties() {
        let schema = node(json!({
            "type": "object",
            "properties": {
                "present": { "type": "integer" },
                "absent": { "type": "integer" }
            }
        }));
        let settings = ValidatorSettings::default();
        let mut recorder = Recorder { visited: Vec::new() };
        let errors = Validator::new(&schema, &settings).validate_with(&json!({ "present": 1 }), &mut recorder);
        assert!(errors.is_empty());
        assert_eq!(
            recorder.visited,
            vec![
                ("present".to_string(), true),
                ("absent".to_string(), false),
                (String::new(), true),
            ]
        );
    }

    /// Records visited paths, undoing candidate visits on discard.
    #[derive(Default)]
    struct Speculative {
        visited: Vec<String>,
        marks: Vec<usize>,
    }

    impl ValidationHook for Speculative {
        fn on_visit(&mut self, visit: &NodeVisit<'_>) -> VisitAction {
            self.visited.push(visit.path.to_string());
            VisitAction::default()
        }

        fn begin_candidate(&mut self) {
            self.marks.push(self.visited.len());
        }

        fn discard_candidate(&mut self) {
            if let Some(mark) = self.marks.pop() {
                self.visited.truncate(mark);
            }
        }
    }

    fn optional_inner() -> SchemaNode {
        node(json!({
            "type": "object",
            "properties": {
                "inner": { "oneOf": [{ "type": "null" }, { "$ref": "#/definitions/Inner" }] }
            },
            "definitions": {
                "Inner": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "label": { "type": "string" }
                    },
                    "required": ["name"]
                }
            }
        }))
    }

    #[test]
    fn test_only_matching_candidate_effects_survive() {
        let schema = optional_inner();
        let settings = ValidatorSettings::default();
        let validator = Validator::new(&schema, &settings);

        let mut hook = Speculative::default();
        assert!(validator.validate_with(&json!({ "inner": null }), &mut hook).is_empty());
        assert_eq!(hook.visited, vec!["inner".to_string(), String::new()]);

        let mut hook = Speculative::default();
        let errors = validator.validate_with(&json!({ "inner": { "name": "a" } }), &mut hook);
        assert!(errors.is_empty());
        assert_eq!(
            hook.visited,
            vec!["inner.name", "inner.label", "inner", ""]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_failed_combinator_keeps_no_effects() {
        let schema = optional_inner();
        let settings = ValidatorSettings::default();
        let mut hook = Speculative::default();
        let errors =
            Validator::new(&schema, &settings).validate_with(&json!({ "inner": {} }), &mut hook);
        assert_eq!(flatten_errors(&errors)["inner.name"], vec!["Property required"]);
        assert_eq!(hook.visited, vec!["inner".to_string(), String::new()]);
        assert!(hook.marks.is_empty());
    }

    #[test]
    fn test_non_object_value_skips_declared_properties() {
        let schema = node(json!({
            "type": "object",
            "properties": {
                "inner": {
                    "type": "object",
                    "properties": { "name": { "type": "string" } }
                }
            }
        }));
        let settings = ValidatorSettings::default();
        let mut recorder = Recorder { visited: Vec::new() };
        let errors = Validator::new(&schema, &settings).validate_with(&json!({ "inner": 5 }), &mut recorder);
        assert_eq!(errors[0].kind, ErrorKind::ObjectExpected);
        assert_eq!(
            recorder.visited,
            vec![("inner".to_string(), true), (String::new(), true)]
        );
    }

    struct Replace(Value);

    impl ValidationHook for Replace {
        fn on_visit(&mut self, visit: &NodeVisit<'_>) -> VisitAction {
            if visit.property == Some("count") {
                VisitAction {
                    errors: Vec::new(),
                    revalidate: Some(self.0.clone()),
                }
            } else {
                VisitAction::default()
            }
        }
    }

    #[test]
    fn test_revalidate_checks_replacement() {
        let mut properties = PropertyMap::new();
        properties.insert(
            "count",
            SchemaNode {
                maximum: Some(5.into()),
                ..SchemaNode::typed(PrimitiveType::Integer)
            },
        );
        let schema = SchemaNode {
            types: TypeSet::single(PrimitiveType::Object),
            properties,
            ..SchemaNode::default()
        };
        let settings = ValidatorSettings::default();
        let errors = Validator::new(&schema, &settings)
            .validate_with(&json!({ "count": 1 }), &mut Replace(json!(9)));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::NumberTooBig);
        let errors = Validator::new(&schema, &settings)
            .validate_with(&json!({}), &mut Replace(json!(3)));
        assert!(errors.is_empty());
    }
}
