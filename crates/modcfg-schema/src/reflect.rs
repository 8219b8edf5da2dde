//! # Explicit Reflection
//!
//! Configuration types describe themselves through the [`Reflect`] trait.
//! Each type returns a [`TypeShape`]; object types return a [`ClassRef`]
//! whose `build` function produces a [`ClassDef`] through a builder API
//! evaluated at registration time.
//!
//! ## Design
//!
//! - Object and enum shapes are lazy: they carry a `fn() -> ClassDef` /
//!   `fn() -> EnumDef` pointer plus the fully qualified type name, so
//!   recursive types terminate and the generator can cache by name.
//! - Property order is declaration order, adjusted by an explicit `order`
//!   value (stable sort, default 0). Custom actions are interleaved with
//!   properties in the member list by declaration position.
//! - Wire names are given explicitly and must match the serde names of
//!   the corresponding fields.
//!
//! ```ignore
//! impl Reflect for ServerSettings {
//!     fn shape() -> TypeShape {
//!         TypeShape::object_with_defaults::<Self>(|| {
//!             ClassDef::new()
//!                 .property::<u16>("Port", |p| p.range(1, 65535).requires_restart())
//!                 .property::<String>("Label", |p| p.env_overridable("LABEL"))
//!         })
//!     }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::behavior::{
    ActionPosition, ActionToggle, Badge, CodeLanguage, ElementSize, ListType, RecordType,
    SectionType, Theme, VisibilityKind, VisibilityToggle,
};

/// A type that can describe its own schema shape.
pub trait Reflect: 'static {
    fn shape() -> TypeShape;
}

// ─── Shapes ──────────────────────────────────────────────────────────

/// Lazy handle on an object type's class definition.
#[derive(Debug, Clone, Copy)]
pub struct ClassRef {
    pub type_name: &'static str,
    pub build: fn() -> ClassDef,
    /// Serialized default instance, used for `default` keywords.
    pub defaults: Option<fn() -> Option<Value>>,
}

/// Lazy handle on an enum type's definition.
#[derive(Debug, Clone, Copy)]
pub struct EnumRef {
    pub type_name: &'static str,
    pub build: fn() -> EnumDef,
}

/// The structural classification of a type.
#[derive(Debug, Clone)]
pub enum TypeShape {
    Boolean,
    /// Integers carry the representable range of the Rust type.
    Integer {
        minimum: Option<Number>,
        maximum: Option<Number>,
    },
    Number,
    String,
    /// A string with a named `format`.
    Formatted(&'static str),
    Nullable(Box<TypeShape>),
    List {
        item: Box<TypeShape>,
        unique: bool,
    },
    Map {
        key: Box<TypeShape>,
        value: Box<TypeShape>,
    },
    Enum(EnumRef),
    Object(ClassRef),
    /// An `{ enabled, value }` pair rendered as a toggleable value.
    Selectable(Box<TypeShape>),
    /// Any JSON value.
    Any,
}

impl TypeShape {
    /// Shape of an object type without schema defaults.
    pub fn object<T: 'static>(build: fn() -> ClassDef) -> Self {
        Self::Object(ClassRef {
            type_name: std::any::type_name::<T>(),
            build,
            defaults: None,
        })
    }

    /// Shape of an object type whose `Default` instance supplies the
    /// `default` keyword of each property.
    pub fn object_with_defaults<T: Default + Serialize + 'static>(build: fn() -> ClassDef) -> Self {
        fn defaults_of<T: Default + Serialize>() -> Option<Value> {
            serde_json::to_value(T::default()).ok()
        }
        Self::Object(ClassRef {
            type_name: std::any::type_name::<T>(),
            build,
            defaults: Some(defaults_of::<T>),
        })
    }

    /// Shape of an enum type.
    pub fn enumeration<T: 'static>(build: fn() -> EnumDef) -> Self {
        Self::Enum(EnumRef {
            type_name: std::any::type_name::<T>(),
            build,
        })
    }

    fn integer(minimum: impl Into<Number>, maximum: impl Into<Number>) -> Self {
        Self::Integer {
            minimum: Some(minimum.into()),
            maximum: Some(maximum.into()),
        }
    }

    /// The shape with any `Nullable` wrapper removed.
    pub fn non_null(&self) -> &TypeShape {
        match self {
            Self::Nullable(inner) => inner.non_null(),
            other => other,
        }
    }

    /// Short label used in error messages.
    pub fn label(&self) -> String {
        match self {
            Self::Boolean => "bool".into(),
            Self::Integer { .. } => "integer".into(),
            Self::Number => "number".into(),
            Self::String => "string".into(),
            Self::Formatted(format) => format!("string({format})"),
            Self::Nullable(inner) => format!("Option<{}>", inner.label()),
            Self::List { item, .. } => format!("Vec<{}>", item.label()),
            Self::Map { key, value } => format!("Map<{}, {}>", key.label(), value.label()),
            Self::Enum(r) => r.type_name.to_string(),
            Self::Object(r) => r.type_name.to_string(),
            Self::Selectable(inner) => format!("Selectable<{}>", inner.label()),
            Self::Any => "any".into(),
        }
    }
}

// ─── Reflect for std and ecosystem types ─────────────────────────────

impl Reflect for bool {
    fn shape() -> TypeShape {
        TypeShape::Boolean
    }
}

macro_rules! reflect_integer {
    ($($ty:ty),*) => {
        $(impl Reflect for $ty {
            fn shape() -> TypeShape {
                TypeShape::integer(<$ty>::MIN, <$ty>::MAX)
            }
        })*
    };
}

reflect_integer!(u8, u16, u32, u64, i8, i16, i32, i64);

impl Reflect for usize {
    fn shape() -> TypeShape {
        TypeShape::integer(0u64, usize::MAX as u64)
    }
}

impl Reflect for isize {
    fn shape() -> TypeShape {
        TypeShape::integer(isize::MIN as i64, isize::MAX as i64)
    }
}

impl Reflect for f32 {
    fn shape() -> TypeShape {
        TypeShape::Number
    }
}

impl Reflect for f64 {
    fn shape() -> TypeShape {
        TypeShape::Number
    }
}

impl Reflect for String {
    fn shape() -> TypeShape {
        TypeShape::String
    }
}

impl Reflect for PathBuf {
    fn shape() -> TypeShape {
        TypeShape::String
    }
}

impl Reflect for uuid::Uuid {
    fn shape() -> TypeShape {
        TypeShape::Formatted("uuid")
    }
}

impl Reflect for url::Url {
    fn shape() -> TypeShape {
        TypeShape::Formatted("uri")
    }
}

impl Reflect for chrono::DateTime<chrono::Utc> {
    fn shape() -> TypeShape {
        TypeShape::Formatted("date-time")
    }
}

impl Reflect for chrono::NaiveDate {
    fn shape() -> TypeShape {
        TypeShape::Formatted("date")
    }
}

impl Reflect for std::net::Ipv4Addr {
    fn shape() -> TypeShape {
        TypeShape::Formatted("ipv4")
    }
}

impl Reflect for std::net::Ipv6Addr {
    fn shape() -> TypeShape {
        TypeShape::Formatted("ipv6")
    }
}

impl Reflect for Value {
    fn shape() -> TypeShape {
        TypeShape::Any
    }
}

impl<T: Reflect> Reflect for Option<T> {
    fn shape() -> TypeShape {
        match T::shape() {
            nullable @ TypeShape::Nullable(_) => nullable,
            inner => TypeShape::Nullable(Box::new(inner)),
        }
    }
}

impl<T: Reflect> Reflect for Box<T> {
    fn shape() -> TypeShape {
        T::shape()
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn shape() -> TypeShape {
        TypeShape::List {
            item: Box::new(T::shape()),
            unique: false,
        }
    }
}

impl<T: Reflect> Reflect for BTreeSet<T> {
    fn shape() -> TypeShape {
        TypeShape::List {
            item: Box::new(T::shape()),
            unique: true,
        }
    }
}

impl<T: Reflect, S: 'static> Reflect for HashSet<T, S> {
    fn shape() -> TypeShape {
        TypeShape::List {
            item: Box::new(T::shape()),
            unique: true,
        }
    }
}

impl<K: Reflect, V: Reflect> Reflect for BTreeMap<K, V> {
    fn shape() -> TypeShape {
        TypeShape::Map {
            key: Box::new(K::shape()),
            value: Box::new(V::shape()),
        }
    }
}

impl<K: Reflect, V: Reflect, S: 'static> Reflect for HashMap<K, V, S> {
    fn shape() -> TypeShape {
        TypeShape::Map {
            key: Box::new(K::shape()),
            value: Box::new(V::shape()),
        }
    }
}

/// A value that can be switched on or off while keeping its setting.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selectable<T> {
    pub enabled: bool,
    pub value: T,
}

impl<T: Reflect> Reflect for Selectable<T> {
    fn shape() -> TypeShape {
        TypeShape::Selectable(Box::new(T::shape()))
    }
}

// ─── Class definitions ───────────────────────────────────────────────

/// Layout options declared on a class.
#[derive(Debug, Clone, Default)]
pub struct SectionOptions {
    pub section_type: SectionType,
    pub default_section_name: Option<String>,
    pub append_floating_at_end: bool,
}

/// A declared class member.
#[derive(Debug, Clone)]
pub enum Member {
    Property(PropertyDef),
    Action(CustomAction),
}

/// One declared property.
#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub name: String,
    pub shape: TypeShape,
    pub options: PropertyOptions,
}

/// Builder-produced description of an object type.
#[derive(Debug, Clone, Default)]
pub struct ClassDef {
    pub title: Option<String>,
    pub description: Option<String>,
    pub section: Option<SectionOptions>,
    pub hide_save_action: bool,
    pub members: Vec<Member>,
}

impl ClassDef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit display title, replacing the derived one.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn section(mut self, section_type: SectionType) -> Self {
        self.section.get_or_insert_with(SectionOptions::default).section_type = section_type;
        self
    }

    pub fn default_section_name(mut self, name: impl Into<String>) -> Self {
        self.section
            .get_or_insert_with(SectionOptions::default)
            .default_section_name = Some(name.into());
        self
    }

    pub fn append_floating_sections_at_end(mut self) -> Self {
        self.section
            .get_or_insert_with(SectionOptions::default)
            .append_floating_at_end = true;
        self
    }

    pub fn hide_save_action(mut self) -> Self {
        self.hide_save_action = true;
        self
    }

    /// Declare a property with default options.
    pub fn field<T: Reflect>(self, name: impl Into<String>) -> Self {
        self.property::<T>(name, |p| p)
    }

    /// Declare a property and configure its options.
    pub fn property<T: Reflect>(
        mut self,
        name: impl Into<String>,
        configure: impl FnOnce(PropertyOptions) -> PropertyOptions,
    ) -> Self {
        self.members.push(Member::Property(PropertyDef {
            name: name.into(),
            shape: T::shape(),
            options: configure(PropertyOptions::default()),
        }));
        self
    }

    /// Declare a custom action.
    pub fn action(mut self, action: CustomAction) -> Self {
        self.members.push(Member::Action(action));
        self
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyDef> {
        self.members.iter().filter_map(|member| match member {
            Member::Property(property) => Some(property),
            Member::Action(_) => None,
        })
    }

    pub fn actions(&self) -> impl Iterator<Item = &CustomAction> {
        self.members.iter().filter_map(|member| match member {
            Member::Action(action) => Some(action),
            Member::Property(_) => None,
        })
    }

    /// Members in presentation order: declaration order, stably sorted by
    /// each property's `order`. Actions sort as order 0.
    pub fn ordered_members(&self) -> Vec<&Member> {
        let mut members: Vec<&Member> = self.members.iter().collect();
        members.sort_by_key(|member| match member {
            Member::Property(property) => property.options.order,
            Member::Action(_) => 0,
        });
        members
    }
}

/// Presentation override for scalar properties.
#[derive(Debug, Clone, PartialEq)]
pub enum Presentation {
    CodeBlock {
        language: CodeLanguage,
        auto_format_on_load: bool,
    },
    TextArea,
    Password,
}

/// Editor options for list properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ListOptions {
    pub list_type: ListType,
    pub sortable: bool,
    pub unique_items: bool,
    pub hide_add_action: bool,
    pub hide_remove_action: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            list_type: ListType::Auto,
            sortable: true,
            unique_items: false,
            hide_add_action: false,
            hide_remove_action: false,
        }
    }
}

impl ListOptions {
    pub fn new(list_type: ListType) -> Self {
        Self {
            list_type,
            ..Self::default()
        }
    }

    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    pub fn unique_items(mut self) -> Self {
        self.unique_items = true;
        self
    }

    pub fn hide_add_action(mut self) -> Self {
        self.hide_add_action = true;
        self
    }

    pub fn hide_remove_action(mut self) -> Self {
        self.hide_remove_action = true;
        self
    }
}

/// Editor options for map properties.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOptions {
    pub record_type: RecordType,
    pub sortable: bool,
    pub hide_add_action: bool,
    pub hide_remove_action: bool,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            record_type: RecordType::Auto,
            sortable: true,
            hide_add_action: false,
            hide_remove_action: false,
        }
    }
}

impl RecordOptions {
    pub fn new(record_type: RecordType) -> Self {
        Self {
            record_type,
            ..Self::default()
        }
    }

    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    pub fn hide_add_action(mut self) -> Self {
        self.hide_add_action = true;
        self
    }

    pub fn hide_remove_action(mut self) -> Self {
        self.hide_remove_action = true;
        self
    }
}

/// Per-property options, set through chained builder calls.
#[derive(Debug, Clone, Default)]
pub struct PropertyOptions {
    pub label: Option<String>,
    pub description: Option<String>,
    pub order: i32,
    pub required: bool,
    pub default: Option<Value>,
    pub minimum: Option<Number>,
    pub maximum: Option<Number>,
    pub exclusive_minimum: Option<Number>,
    pub exclusive_maximum: Option<Number>,
    pub multiple_of: Option<Number>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
    pub format: Option<String>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,
    pub env: Option<(String, bool)>,
    pub requires_restart: bool,
    pub primary_key: bool,
    pub section_name: Option<String>,
    pub visibility: Option<VisibilityKind>,
    pub advanced: bool,
    pub toggle: Option<VisibilityToggle>,
    pub size: Option<ElementSize>,
    pub badge: Option<Badge>,
    pub presentation: Option<Presentation>,
    pub list: Option<ListOptions>,
    pub record: Option<RecordOptions>,
}

impl PropertyOptions {
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Explicit `default` keyword, replacing the one taken from the
    /// class's default instance.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Inclusive bounds.
    pub fn range(mut self, minimum: impl Into<Number>, maximum: impl Into<Number>) -> Self {
        self.minimum = Some(minimum.into());
        self.maximum = Some(maximum.into());
        self
    }

    pub fn minimum(mut self, minimum: impl Into<Number>) -> Self {
        self.minimum = Some(minimum.into());
        self
    }

    pub fn maximum(mut self, maximum: impl Into<Number>) -> Self {
        self.maximum = Some(maximum.into());
        self
    }

    pub fn exclusive_minimum(mut self, minimum: impl Into<Number>) -> Self {
        self.exclusive_minimum = Some(minimum.into());
        self
    }

    pub fn exclusive_maximum(mut self, maximum: impl Into<Number>) -> Self {
        self.exclusive_maximum = Some(maximum.into());
        self
    }

    pub fn multiple_of(mut self, factor: impl Into<Number>) -> Self {
        self.multiple_of = Some(factor.into());
        self
    }

    pub fn length(mut self, min: u64, max: u64) -> Self {
        self.min_length = Some(min);
        self.max_length = Some(max);
        self
    }

    pub fn min_length(mut self, min: u64) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: u64) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn items(mut self, min: u64, max: u64) -> Self {
        self.min_items = Some(min);
        self.max_items = Some(max);
        self
    }

    pub fn min_items(mut self, min: u64) -> Self {
        self.min_items = Some(min);
        self
    }

    pub fn max_items(mut self, max: u64) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn unique_items(mut self) -> Self {
        self.unique_items = true;
        self
    }

    pub fn min_properties(mut self, min: u64) -> Self {
        self.min_properties = Some(min);
        self
    }

    pub fn max_properties(mut self, max: u64) -> Self {
        self.max_properties = Some(max);
        self
    }

    /// Bind to an environment variable that a save may not contradict.
    pub fn env(mut self, name: impl Into<String>) -> Self {
        self.env = Some((name.into(), false));
        self
    }

    /// Bind to an environment variable whose value a save may replace.
    pub fn env_overridable(mut self, name: impl Into<String>) -> Self {
        self.env = Some((name.into(), true));
        self
    }

    pub fn requires_restart(mut self) -> Self {
        self.requires_restart = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn section_name(mut self, name: impl Into<String>) -> Self {
        self.section_name = Some(name.into());
        self
    }

    pub fn visibility(mut self, visibility: VisibilityKind) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn advanced(mut self) -> Self {
        self.advanced = true;
        self
    }

    /// Switch visibility while another member equals `value`.
    pub fn toggle(mut self, path: impl Into<String>, value: Value, visibility: VisibilityKind) -> Self {
        self.toggle = Some(VisibilityToggle {
            path: path.into(),
            value,
            visibility,
        });
        self
    }

    pub fn size(mut self, size: ElementSize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn badge(mut self, name: impl Into<String>, theme: Theme) -> Self {
        self.badge = Some(Badge {
            name: name.into(),
            theme,
        });
        self
    }

    pub fn code(mut self, language: CodeLanguage, auto_format_on_load: bool) -> Self {
        self.presentation = Some(Presentation::CodeBlock {
            language,
            auto_format_on_load,
        });
        self
    }

    pub fn text_area(mut self) -> Self {
        self.presentation = Some(Presentation::TextArea);
        self
    }

    pub fn password(mut self) -> Self {
        self.presentation = Some(Presentation::Password);
        self
    }

    pub fn list(mut self, options: ListOptions) -> Self {
        self.list = Some(options);
        self
    }

    pub fn record(mut self, options: RecordOptions) -> Self {
        self.record = Some(options);
        self
    }
}

// ─── Custom actions ──────────────────────────────────────────────────

/// A named action declared on a class.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAction {
    pub name: String,
    pub description: Option<String>,
    pub theme: Theme,
    pub position: ActionPosition,
    pub section_name: Option<String>,
    pub toggle: Option<ActionToggle>,
    pub inverse_toggle: bool,
    pub disable_if_no_changes: bool,
}

impl CustomAction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            theme: Theme::Default,
            position: ActionPosition::Auto,
            section_name: None,
            toggle: None,
            inverse_toggle: false,
            disable_if_no_changes: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn position(mut self, position: ActionPosition) -> Self {
        self.position = position;
        self
    }

    pub fn section_name(mut self, name: impl Into<String>) -> Self {
        self.section_name = Some(name.into());
        self
    }

    /// Enable the action only while `path` equals `value`.
    pub fn toggle(mut self, path: impl Into<String>, value: Value) -> Self {
        self.toggle = Some(ActionToggle {
            path: path.into(),
            value,
        });
        self
    }

    pub fn inverse_toggle(mut self) -> Self {
        self.inverse_toggle = true;
        self
    }

    pub fn disable_if_no_changes(mut self) -> Self {
        self.disable_if_no_changes = true;
        self
    }
}

// ─── Enum definitions ────────────────────────────────────────────────

/// One enum member.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnumVariant {
    pub name: String,
    pub value: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl EnumVariant {
    /// Explicit wire value, replacing the variant name.
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The value written to documents.
    pub fn wire_value(&self) -> &str {
        self.value.as_deref().unwrap_or(&self.name)
    }
}

/// Builder-produced description of an enum type.
#[derive(Debug, Clone, Default)]
pub struct EnumDef {
    pub title: Option<String>,
    pub description: Option<String>,
    pub variants: Vec<EnumVariant>,
    pub is_flag: bool,
}

impl EnumDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a member whose wire value is its name.
    pub fn member(self, name: impl Into<String>) -> Self {
        self.variant(name, |v| v)
    }

    /// Declare and configure a member.
    pub fn variant(
        mut self,
        name: impl Into<String>,
        configure: impl FnOnce(EnumVariant) -> EnumVariant,
    ) -> Self {
        self.variants.push(configure(EnumVariant {
            name: name.into(),
            ..EnumVariant::default()
        }));
        self
    }

    /// Mark the enum as a combinable flag set.
    pub fn flag(mut self) -> Self {
        self.is_flag = true;
        self
    }
}
