//! # Document Helpers
//!
//! Text-level helpers used around persistence: the leading `$schema`
//! reference of stored documents, the schema text served to editors, and
//! the patches the extended validator asks for instead of mutating a
//! shared tree.

use std::path::Path;

use modcfg_core::DocumentPath;
use modcfg_schema::{PrimitiveType, PropertyMap, SchemaNode};
use serde_json::Value;

/// Key of the schema reference property.
pub const SCHEMA_PROPERTY: &str = "$schema";

/// `file://` URI of a sidecar schema.
pub fn schema_uri(sidecar: &Path) -> String {
    url::Url::from_file_path(sidecar)
        .map(|url| url.to_string())
        .unwrap_or_else(|()| format!("file://{}", sidecar.display()))
}

/// Insert `"$schema": <uri>` as the first property of a JSON object text.
///
/// Text that already mentions `$schema`, or is not an object, is returned
/// unchanged. When the object's first line break is followed by spaces or
/// tabs the inserted line uses the same indentation; otherwise the
/// property is inserted inline.
pub fn inject_schema_reference(text: &str, uri: &str) -> String {
    if text.contains(SCHEMA_PROPERTY) || !text.starts_with('{') {
        return text.to_string();
    }
    let quoted = Value::String(uri.to_string()).to_string();
    let rest = &text[1..];
    if rest.trim_start().starts_with('}') {
        return format!("{{\"{SCHEMA_PROPERTY}\":{quoted}{rest}");
    }

    let newline = if rest.starts_with("\r\n") {
        "\r\n"
    } else if rest.starts_with('\n') {
        "\n"
    } else {
        ""
    };
    if !newline.is_empty() {
        let after = &rest[newline.len()..];
        let indent_char = after.chars().next().filter(|c| *c == ' ' || *c == '\t');
        if let Some(indent_char) = indent_char {
            let indent: String = after.chars().take_while(|c| *c == indent_char).collect();
            return format!("{{{newline}{indent}\"{SCHEMA_PROPERTY}\": {quoted},{rest}");
        }
    }
    format!("{{\"{SCHEMA_PROPERTY}\":{quoted},{rest}")
}

/// Pretty schema text with a root `$schema` string property declared
/// first, so editors accept the reference stored in each document.
pub fn schema_text(schema: &SchemaNode) -> Result<String, serde_json::Error> {
    let mut served = schema.clone();
    let mut properties = PropertyMap::new();
    properties.insert(SCHEMA_PROPERTY, SchemaNode::typed(PrimitiveType::String));
    for (name, node) in schema.properties.iter() {
        if name != SCHEMA_PROPERTY {
            properties.insert(name, node.clone());
        }
    }
    served.properties = properties;
    served.to_json_pretty()
}

// ─── Patches ─────────────────────────────────────────────────────────

/// One edit to a document, produced during validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    Set { path: DocumentPath, value: Value },
    Remove { path: DocumentPath },
}

/// Apply `patches` in order. Returns how many took effect.
pub fn apply_patches(document: &mut Value, patches: &[Patch]) -> usize {
    patches
        .iter()
        .filter(|patch| match patch {
            Patch::Set { path, value } => path.assign(document, value.clone()),
            Patch::Remove { path } => path.remove(document).is_some(),
        })
        .count()
}
