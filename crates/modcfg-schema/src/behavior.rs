//! # Behavior Descriptors
//!
//! Non-schema metadata attached to each generated node under the
//! `x-uiDefinition` key: presentation kind, labels and grouping, visibility
//! rules, environment binding, restart impact, list/record editor options,
//! enum display data and class-level actions.
//!
//! The descriptor is flat, with one optional field per key, so property
//! nodes and class nodes share one type. Property nodes always carry
//! `elementType`, `elementSize` and `requiresRestart`; class nodes carry
//! `elementType: sectionContainer`, `sectionType` and `actions`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How an editor should render a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementType {
    #[default]
    Auto,
    SectionContainer,
    List,
    Record,
    Enum,
    CodeBlock,
    TextArea,
    Password,
    Selectable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementSize {
    Small,
    #[default]
    Normal,
    Large,
    Full,
}

/// Editor layout for a list property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListType {
    #[default]
    Auto,
    ComplexDropdown,
    ComplexTab,
    ComplexInline,
    EnumCheckbox,
}

impl ListType {
    /// Layouts that render each item as a keyed section.
    pub fn requires_keyed_sections(&self) -> bool {
        matches!(self, Self::ComplexDropdown | Self::ComplexTab | Self::ComplexInline)
    }
}

/// Editor layout for a map property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordType {
    #[default]
    Auto,
    Simple,
    ComplexInline,
}

/// Layout of a class's sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionType {
    #[default]
    FieldSet,
    Tab,
    Minimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VisibilityKind {
    #[default]
    Visible,
    Hidden,
    ReadOnly,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Theme {
    #[default]
    Default,
    Primary,
    Secondary,
    Important,
    Warning,
    Danger,
    Info,
    Success,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionPosition {
    #[default]
    Auto,
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CodeLanguage {
    #[default]
    PlainText,
    Json,
    Yaml,
    Xml,
    Css,
    Html,
    JavaScript,
    TypeScript,
    Python,
    Shell,
}

/// Conditional visibility driven by another member's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityToggle {
    /// Path of the member whose value is watched.
    pub path: String,
    /// Value that flips visibility.
    pub value: Value,
    /// Visibility applied while the watched member equals `value`.
    pub visibility: VisibilityKind,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visibility {
    pub default: VisibilityKind,
    pub advanced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toggle: Option<VisibilityToggle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub name: String,
    pub theme: Theme,
}

/// One enum member as presented to an editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDefinition {
    pub title: String,
    pub description: String,
    pub value: Value,
}

/// Toggle condition of a custom action. Unlike visibility toggles it only
/// names the watched member and value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionToggle {
    pub path: String,
    pub value: Value,
}

/// A custom action declared on a class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomActionDescriptor {
    pub title: String,
    pub description: String,
    pub theme: Theme,
    pub position: ActionPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
    pub toggle: Option<ActionToggle>,
    pub inverse_toggle: bool,
    pub disable_if_no_changes: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassActions {
    pub hide_save_action: bool,
    pub custom_actions: Vec<CustomActionDescriptor>,
}

impl ClassActions {
    pub fn declares(&self, title: &str) -> bool {
        self.custom_actions.iter().any(|action| action.title == title)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MemberKind {
    Property,
    Method,
}

/// One entry of a class's member order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEntry {
    pub kind: MemberKind,
    pub name: String,
}

/// `primaryKey` is a marker on the key property and the key's name on
/// classes and on containers that inherit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    Marker(bool),
    Property(String),
}

/// The `x-uiDefinition` payload of a node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<ElementType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_size: Option<ElementSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_restart: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_var_overridable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<Badge>,

    // Lists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_type: Option<ListType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_element_type: Option<ElementType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_sortable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_unique_items: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_hide_add_action: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_hide_remove_action: Option<bool>,

    // Records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<RecordType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_element_type: Option<ElementType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_sortable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_hide_add_action: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_hide_remove_action: Option<bool>,

    // Enums and code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_definitions: Option<Vec<EnumDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_is_flag: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_language: Option<CodeLanguage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_auto_format_on_load: Option<bool>,

    // Classes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_type: Option<SectionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_append_floating_at_end: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<ClassActions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<MemberEntry>>,
}

impl BehaviorDescriptor {
    /// Bound environment variable and whether a save may diverge from it.
    pub fn environment_binding(&self) -> Option<(&str, bool)> {
        let name = self.env_var.as_deref().filter(|name| !name.trim().is_empty())?;
        Some((name, self.env_var_overridable.unwrap_or(false)))
    }

    pub fn requires_restart(&self) -> bool {
        self.requires_restart.unwrap_or(false)
    }

    /// Name of the primary key property, if one is declared or inherited.
    pub fn primary_key_name(&self) -> Option<&str> {
        match &self.primary_key {
            Some(PrimaryKey::Property(name)) => Some(name),
            _ => None,
        }
    }

    pub fn is_primary_key_marker(&self) -> bool {
        matches!(self.primary_key, Some(PrimaryKey::Marker(true)))
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type.unwrap_or_default()
    }
}
