//! # Schema Generation
//!
//! Turns a [`Reflect`] type into a [`SchemaNode`] tree with one
//! [`BehaviorDescriptor`] per node.
//!
//! ## Design
//!
//! - Object and enum types are emitted once into `definitions`, keyed by
//!   their short type name (numbered on collision), and referenced through
//!   `$ref`. The root type is the root node itself; recursive references
//!   to it use `#`.
//! - Class-level behavior (section layout, primary key, actions, member
//!   order) is computed once per class, keyed by the fully qualified type
//!   name, before the class's properties are generated. Containers whose
//!   items are classes read it from that cache.
//! - The cache lives in a [`GenerationState`] owned by the generator's
//!   mutex. It is reset at the start and end of every top-level call, so
//!   generations never observe each other.
//! - Shape problems that make a schema unusable (map keys that cannot be
//!   text, keyed list layouts over plain items) are returned as
//!   [`SchemaDefinitionError`]s.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use serde_json::Value;

use crate::behavior::{
    BehaviorDescriptor, ClassActions, CustomActionDescriptor, ElementSize, ElementType,
    EnumDefinition, ListType, MemberEntry, MemberKind, PrimaryKey, SectionType, Visibility,
};
use crate::error::SchemaDefinitionError;
use crate::naming::{display_name, short_type_name, type_display_name};
use crate::node::{Additional, Items, PrimitiveType, PropertyMap, SchemaNode, DRAFT_URI};
use crate::reflect::{
    ClassDef, ClassRef, CustomAction, EnumRef, Member, Presentation, PropertyDef, PropertyOptions,
    Reflect, TypeShape,
};

/// Generates schemas for reflected types. Safe to share between threads;
/// concurrent calls are serialized.
#[derive(Default)]
pub struct SchemaGenerator {
    state: Mutex<GenerationState>,
}

impl SchemaGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the schema of `T`, which must reflect as an object.
    pub fn generate<T: Reflect>(&self) -> Result<SchemaNode, SchemaDefinitionError> {
        self.generate_shape(&T::shape())
    }

    /// Generate the schema of an already-obtained shape.
    pub fn generate_shape(&self, shape: &TypeShape) -> Result<SchemaNode, SchemaDefinitionError> {
        let TypeShape::Object(class) = shape.non_null() else {
            return Err(SchemaDefinitionError::RootNotObject {
                type_name: shape.label(),
            });
        };
        let mut state = self.state.lock();
        state.reset();
        let result = state.root(class);
        state.reset();
        if let Ok(schema) = &result {
            tracing::debug!(
                type_name = class.type_name,
                definitions = schema.definitions.len(),
                "generated configuration schema"
            );
        }
        result
    }
}

// ─── Per-call state ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct ClassEntry {
    key: String,
    behavior: BehaviorDescriptor,
}

#[derive(Debug, Clone)]
struct EnumEntry {
    key: String,
    definitions: Vec<EnumDefinition>,
    is_flag: bool,
}

/// Where a shape is being generated, for error messages.
struct Site<'a> {
    owner: &'a str,
    property: &'a str,
}

impl Site<'_> {
    fn owner(&self) -> String {
        self.owner.to_string()
    }

    fn property(&self) -> String {
        self.property.to_string()
    }
}

#[derive(Default)]
struct GenerationState {
    definitions: PropertyMap,
    classes: HashMap<&'static str, ClassEntry>,
    enums: HashMap<&'static str, EnumEntry>,
    used_keys: HashSet<String>,
}

impl GenerationState {
    fn reset(&mut self) {
        self.definitions = PropertyMap::new();
        self.classes.clear();
        self.enums.clear();
        self.used_keys.clear();
    }

    fn root(&mut self, class: &ClassRef) -> Result<SchemaNode, SchemaDefinitionError> {
        let def = (class.build)();
        let behavior = class_behavior(&def);
        self.classes.insert(
            class.type_name,
            ClassEntry {
                key: "#".to_string(),
                behavior: behavior.clone(),
            },
        );
        let mut node = self.class_node(class, &def, behavior)?;
        node.draft = Some(DRAFT_URI.to_string());
        node.definitions = std::mem::take(&mut self.definitions);
        Ok(node)
    }

    fn allocate_key(&mut self, type_name: &str) -> String {
        let short = short_type_name(type_name).to_string();
        let mut key = short.clone();
        let mut suffix = 2;
        while self.used_keys.contains(&key) {
            key = format!("{short}{suffix}");
            suffix += 1;
        }
        self.used_keys.insert(key.clone());
        key
    }

    // ─── Classes ─────────────────────────────────────────────────────

    fn object_ref(&mut self, class: &ClassRef) -> Result<SchemaNode, SchemaDefinitionError> {
        if let Some(entry) = self.classes.get(class.type_name) {
            return Ok(SchemaNode::reference_to(&entry.key));
        }
        let key = self.allocate_key(class.type_name);
        let def = (class.build)();
        let behavior = class_behavior(&def);
        self.classes.insert(
            class.type_name,
            ClassEntry {
                key: key.clone(),
                behavior: behavior.clone(),
            },
        );
        // Reserve the slot so definitions appear in first-encounter order.
        self.definitions.insert(key.clone(), SchemaNode::default());
        let node = self.class_node(class, &def, behavior)?;
        self.definitions.insert(key.clone(), node);
        Ok(SchemaNode::reference_to(&key))
    }

    fn class_node(
        &mut self,
        class: &ClassRef,
        def: &ClassDef,
        behavior: BehaviorDescriptor,
    ) -> Result<SchemaNode, SchemaDefinitionError> {
        let mut node = SchemaNode::typed(PrimitiveType::Object);
        node.title = Some(
            def.title
                .clone()
                .unwrap_or_else(|| type_display_name(class.type_name)),
        );
        node.description = def.description.clone();
        let defaults = class.defaults.and_then(|defaults| defaults());
        let owner = short_type_name(class.type_name);
        for member in def.ordered_members() {
            let Member::Property(property) = member else {
                continue;
            };
            let default = defaults
                .as_ref()
                .and_then(|d| d.get(&property.name))
                .cloned();
            let property_node = self.property_node(owner, property, default)?;
            if property.options.required && !node.required.contains(&property.name) {
                node.required.push(property.name.clone());
            }
            node.properties.insert(property.name.clone(), property_node);
        }
        node.behavior = Some(behavior);
        Ok(node)
    }

    // ─── Enums ───────────────────────────────────────────────────────

    fn enum_entry(&mut self, e: &EnumRef) -> EnumEntry {
        if let Some(entry) = self.enums.get(e.type_name) {
            return entry.clone();
        }
        let key = self.allocate_key(e.type_name);
        let def = (e.build)();
        let mut node = SchemaNode::typed(PrimitiveType::String);
        node.title = Some(
            def.title
                .clone()
                .unwrap_or_else(|| display_name(short_type_name(e.type_name))),
        );
        node.description = def.description.clone();
        let mut definitions = Vec::with_capacity(def.variants.len());
        for variant in &def.variants {
            let wire = Value::String(variant.wire_value().to_string());
            node.enumeration.push(wire.clone());
            node.enum_names.push(variant.name.clone());
            definitions.push(EnumDefinition {
                title: variant
                    .title
                    .clone()
                    .unwrap_or_else(|| display_name(&variant.name)),
                description: variant.description.clone().unwrap_or_default(),
                value: wire,
            });
        }
        self.definitions.insert(key.clone(), node);
        let entry = EnumEntry {
            key,
            definitions,
            is_flag: def.is_flag,
        };
        self.enums.insert(e.type_name, entry.clone());
        entry
    }

    // ─── Shapes ──────────────────────────────────────────────────────

    fn shape_node(
        &mut self,
        shape: &TypeShape,
        site: &Site<'_>,
    ) -> Result<SchemaNode, SchemaDefinitionError> {
        Ok(match shape {
            TypeShape::Boolean => SchemaNode::typed(PrimitiveType::Boolean),
            TypeShape::Integer { minimum, maximum } => {
                let mut node = SchemaNode::typed(PrimitiveType::Integer);
                node.minimum = minimum.clone();
                node.maximum = maximum.clone();
                node
            }
            TypeShape::Number => SchemaNode::typed(PrimitiveType::Number),
            TypeShape::String => SchemaNode::typed(PrimitiveType::String),
            TypeShape::Formatted(format) => {
                let mut node = SchemaNode::typed(PrimitiveType::String);
                node.format = Some((*format).to_string());
                node
            }
            TypeShape::Nullable(inner) => match inner.non_null() {
                TypeShape::Object(_) | TypeShape::Enum(_) => {
                    let reference = self.shape_node(inner, site)?;
                    SchemaNode {
                        one_of: vec![SchemaNode::typed(PrimitiveType::Null), reference],
                        ..SchemaNode::default()
                    }
                }
                TypeShape::Any => SchemaNode::default(),
                _ => {
                    let mut node = self.shape_node(inner, site)?;
                    node.types.insert(PrimitiveType::Null);
                    node
                }
            },
            TypeShape::List { item, unique } => {
                let mut node = SchemaNode::typed(PrimitiveType::Array);
                node.items = Some(Items::Single(Box::new(self.shape_node(item, site)?)));
                node.unique_items = *unique;
                node
            }
            TypeShape::Map { key, value } => {
                if !is_text_key(key) {
                    return Err(SchemaDefinitionError::UnusableMapKey {
                        owner: site.owner(),
                        property: site.property(),
                        key_type: key.label(),
                    });
                }
                let mut node = SchemaNode::typed(PrimitiveType::Object);
                node.additional_properties =
                    Some(Additional::Schema(Box::new(self.shape_node(value, site)?)));
                node
            }
            TypeShape::Enum(e) => SchemaNode::reference_to(&self.enum_entry(e).key),
            TypeShape::Object(class) => self.object_ref(class)?,
            TypeShape::Selectable(inner) => {
                let mut node = SchemaNode::typed(PrimitiveType::Object);
                node.properties
                    .insert("enabled", SchemaNode::typed(PrimitiveType::Boolean));
                node.properties.insert("value", self.shape_node(inner, site)?);
                node.required = vec!["enabled".to_string(), "value".to_string()];
                node
            }
            TypeShape::Any => SchemaNode::default(),
        })
    }

    // ─── Properties ──────────────────────────────────────────────────

    fn property_node(
        &mut self,
        owner: &str,
        property: &PropertyDef,
        default: Option<Value>,
    ) -> Result<SchemaNode, SchemaDefinitionError> {
        let site = Site {
            owner,
            property: &property.name,
        };
        let options = &property.options;
        let mut node = self.shape_node(&property.shape, &site)?;

        // Scalar facets on a container bound its elements.
        match property.shape.non_null() {
            TypeShape::List { .. } | TypeShape::Map { .. } => {
                if let Some(element) = element_node_mut(&mut node) {
                    apply_scalar_facets(element, options);
                }
            }
            _ => apply_scalar_facets(&mut node, options),
        }
        node.min_items = options.min_items.or(node.min_items);
        node.max_items = options.max_items.or(node.max_items);
        node.unique_items |= options.unique_items;
        node.min_properties = options.min_properties.or(node.min_properties);
        node.max_properties = options.max_properties.or(node.max_properties);

        node.title = Some(
            options
                .label
                .clone()
                .unwrap_or_else(|| display_name(&property.name)),
        );
        if options.description.is_some() {
            node.description = options.description.clone();
        }
        node.default = options.default.clone().or(default);
        node.behavior = Some(self.property_behavior(&site, property)?);
        Ok(node)
    }

    fn property_behavior(
        &mut self,
        site: &Site<'_>,
        property: &PropertyDef,
    ) -> Result<BehaviorDescriptor, SchemaDefinitionError> {
        let options = &property.options;
        let mut behavior = BehaviorDescriptor {
            element_type: Some(ElementType::Auto),
            element_size: Some(options.size.unwrap_or(ElementSize::Normal)),
            primary_key: options.primary_key.then_some(PrimaryKey::Marker(true)),
            section_name: options.section_name.clone(),
            requires_restart: Some(options.requires_restart),
            ..BehaviorDescriptor::default()
        };
        if options.visibility.is_some() || options.advanced || options.toggle.is_some() {
            behavior.visibility = Some(Visibility {
                default: options.visibility.unwrap_or_default(),
                advanced: options.advanced,
                toggle: options.toggle.clone(),
            });
        }
        if let Some((name, overridable)) = options.env.as_ref().filter(|(n, _)| !n.trim().is_empty()) {
            behavior.env_var = Some(name.clone());
            behavior.env_var_overridable = Some(*overridable);
        }
        behavior.badge = options.badge.clone();

        match property.shape.non_null() {
            TypeShape::List { item, .. } => {
                let list = options.list.clone().unwrap_or_default();
                behavior.element_type = Some(ElementType::List);
                behavior.list_element_type = Some(ElementType::Auto);
                behavior.list_type = Some(list.list_type);
                behavior.list_sortable = Some(list.sortable);
                behavior.list_unique_items = Some(list.unique_items);
                behavior.list_hide_add_action = Some(list.hide_add_action);
                behavior.list_hide_remove_action = Some(list.hide_remove_action);

                let inherited = self.inherit_from_class(item, &mut behavior);
                if let Some(element) = inherited {
                    behavior.list_element_type = Some(element);
                }
                let inner = self.element_behavior(options, item.non_null());
                if let Some(element) = merge_inner(&mut behavior, inner) {
                    behavior.list_element_type = Some(element);
                }
                check_list_layout(site, &behavior, list.list_type)?;
            }
            TypeShape::Map { value, .. } => {
                let record = options.record.clone().unwrap_or_default();
                behavior.element_type = Some(ElementType::Record);
                behavior.record_element_type = Some(ElementType::Auto);
                behavior.record_type = Some(record.record_type);
                behavior.record_sortable = Some(record.sortable);
                behavior.record_hide_add_action = Some(record.hide_add_action);
                behavior.record_hide_remove_action = Some(record.hide_remove_action);

                if let Some(element) = self.inherit_from_class(value, &mut behavior) {
                    behavior.record_element_type = Some(element);
                }
                let inner = self.element_behavior(options, value.non_null());
                if let Some(element) = merge_inner(&mut behavior, inner) {
                    behavior.record_element_type = Some(element);
                }
            }
            TypeShape::Enum(e) => {
                let entry = self.enum_entry(e);
                behavior.element_type = Some(ElementType::Enum);
                behavior.enum_definitions = Some(entry.definitions);
                behavior.enum_is_flag = Some(entry.is_flag);
            }
            TypeShape::Selectable(_) => {
                behavior.element_type = Some(ElementType::Selectable);
            }
            _ => apply_presentation(&mut behavior, options.presentation.as_ref()),
        }
        Ok(behavior)
    }

    /// Copy section layout and primary key from a referenced class into a
    /// container's behavior. Returns the class's element type when it is
    /// not `Auto`.
    fn inherit_from_class(
        &mut self,
        item: &TypeShape,
        behavior: &mut BehaviorDescriptor,
    ) -> Option<ElementType> {
        let TypeShape::Object(class) = item.non_null() else {
            return None;
        };
        let class_behavior = self.classes.get(class.type_name)?.behavior.clone();
        if behavior.section_type.is_none() {
            behavior.section_type = class_behavior.section_type;
        }
        if behavior.primary_key.is_none() {
            behavior.primary_key = class_behavior.primary_key.clone();
        }
        Some(class_behavior.element_type()).filter(|element| *element != ElementType::Auto)
    }

    /// Behavior derived for a container's element from the property's own
    /// options.
    fn element_behavior(
        &mut self,
        options: &PropertyOptions,
        item: &TypeShape,
    ) -> BehaviorDescriptor {
        let mut inner = BehaviorDescriptor {
            element_type: Some(ElementType::Auto),
            ..BehaviorDescriptor::default()
        };
        match item {
            TypeShape::Enum(e) => {
                let entry = self.enum_entry(e);
                inner.element_type = Some(ElementType::Enum);
                inner.enum_definitions = Some(entry.definitions);
                inner.enum_is_flag = Some(entry.is_flag);
            }
            TypeShape::List { .. } => inner.element_type = Some(ElementType::List),
            TypeShape::Map { .. } => inner.element_type = Some(ElementType::Record),
            TypeShape::Selectable(_) => inner.element_type = Some(ElementType::Selectable),
            TypeShape::Object(_) => {}
            _ => apply_presentation(&mut inner, options.presentation.as_ref()),
        }
        inner
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn element_node_mut(node: &mut SchemaNode) -> Option<&mut SchemaNode> {
    if let Some(Items::Single(item)) = node.items.as_mut() {
        return Some(item.as_mut());
    }
    match node.additional_properties.as_mut() {
        Some(Additional::Schema(value)) => Some(value.as_mut()),
        _ => None,
    }
}

fn apply_scalar_facets(node: &mut SchemaNode, options: &PropertyOptions) {
    if options.minimum.is_some() {
        node.minimum = options.minimum.clone();
    }
    if options.maximum.is_some() {
        node.maximum = options.maximum.clone();
    }
    if options.exclusive_minimum.is_some() {
        node.exclusive_minimum = options.exclusive_minimum.clone();
    }
    if options.exclusive_maximum.is_some() {
        node.exclusive_maximum = options.exclusive_maximum.clone();
    }
    if options.multiple_of.is_some() {
        node.multiple_of = options.multiple_of.clone();
    }
    node.min_length = options.min_length.or(node.min_length);
    node.max_length = options.max_length.or(node.max_length);
    if options.pattern.is_some() {
        node.pattern = options.pattern.clone();
    }
    if options.format.is_some() {
        node.format = options.format.clone();
    }
}

fn is_text_key(key: &TypeShape) -> bool {
    matches!(
        key,
        TypeShape::String | TypeShape::Formatted(_) | TypeShape::Integer { .. } | TypeShape::Enum(_)
    )
}

fn apply_presentation(behavior: &mut BehaviorDescriptor, presentation: Option<&Presentation>) {
    match presentation {
        Some(Presentation::CodeBlock {
            language,
            auto_format_on_load,
        }) => {
            behavior.element_type = Some(ElementType::CodeBlock);
            behavior.code_language = Some(*language);
            behavior.code_auto_format_on_load = Some(*auto_format_on_load);
        }
        Some(Presentation::TextArea) => behavior.element_type = Some(ElementType::TextArea),
        Some(Presentation::Password) => behavior.element_type = Some(ElementType::Password),
        None => {}
    }
}

/// Fill element-specific keys from the element's behavior without
/// overriding what the container already declares. Returns the element's
/// type when it is not `Auto`.
fn merge_inner(behavior: &mut BehaviorDescriptor, inner: BehaviorDescriptor) -> Option<ElementType> {
    let element = inner.element_type();
    if behavior.enum_definitions.is_none() {
        behavior.enum_definitions = inner.enum_definitions;
    }
    if behavior.enum_is_flag.is_none() {
        behavior.enum_is_flag = inner.enum_is_flag;
    }
    if behavior.code_language.is_none() {
        behavior.code_language = inner.code_language;
    }
    if behavior.code_auto_format_on_load.is_none() {
        behavior.code_auto_format_on_load = inner.code_auto_format_on_load;
    }
    Some(element).filter(|element| *element != ElementType::Auto)
}

fn check_list_layout(
    site: &Site<'_>,
    behavior: &BehaviorDescriptor,
    list_type: ListType,
) -> Result<(), SchemaDefinitionError> {
    let element = behavior.list_element_type.unwrap_or_default();
    if list_type.requires_keyed_sections() {
        let layout = match list_type {
            ListType::ComplexDropdown => "Dropdown",
            ListType::ComplexTab => "Tab",
            _ => "Inline",
        };
        if element != ElementType::SectionContainer {
            return Err(SchemaDefinitionError::ListItemsNotSections {
                owner: site.owner(),
                property: site.property(),
                layout,
            });
        }
        if behavior.primary_key.is_none() {
            return Err(SchemaDefinitionError::ListWithoutPrimaryKey {
                owner: site.owner(),
                property: site.property(),
                layout,
            });
        }
    } else if list_type == ListType::EnumCheckbox && element != ElementType::Enum {
        return Err(SchemaDefinitionError::CheckboxListNotEnum {
            owner: site.owner(),
            property: site.property(),
        });
    }
    Ok(())
}

fn action_descriptor(action: &CustomAction) -> CustomActionDescriptor {
    CustomActionDescriptor {
        title: action.name.clone(),
        description: action.description.clone().unwrap_or_default(),
        theme: action.theme,
        position: action.position,
        section_name: action.section_name.clone().filter(|s| !s.is_empty()),
        toggle: action.toggle.clone(),
        inverse_toggle: action.toggle.is_some() && action.inverse_toggle,
        disable_if_no_changes: action.disable_if_no_changes,
    }
}

/// Class-level behavior, computed from the definition alone.
fn class_behavior(def: &ClassDef) -> BehaviorDescriptor {
    let mut behavior = BehaviorDescriptor {
        element_type: Some(ElementType::SectionContainer),
        ..BehaviorDescriptor::default()
    };
    match &def.section {
        Some(section) => {
            behavior.section_type = Some(section.section_type);
            behavior.section_name = section
                .default_section_name
                .clone()
                .filter(|name| !name.trim().is_empty());
            behavior.section_append_floating_at_end = Some(section.append_floating_at_end);
        }
        None => behavior.section_type = Some(SectionType::FieldSet),
    }
    behavior.primary_key = def
        .properties()
        .find(|property| property.options.primary_key)
        .map(|property| PrimaryKey::Property(property.name.clone()));
    behavior.actions = Some(ClassActions {
        hide_save_action: def.hide_save_action,
        custom_actions: def.actions().map(action_descriptor).collect(),
    });
    behavior.members = Some(
        def.ordered_members()
            .into_iter()
            .map(|member| match member {
                Member::Property(property) => MemberEntry {
                    kind: MemberKind::Property,
                    name: property.name.clone(),
                },
                Member::Action(action) => MemberEntry {
                    kind: MemberKind::Method,
                    name: action.name.clone(),
                },
            })
            .collect(),
    );
    behavior
}
