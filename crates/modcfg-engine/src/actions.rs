//! # Custom-Action Resolution
//!
//! Resolves a document path such as `list[0]` or `items['a b'].inner` to
//! the schema node it addresses and checks that the node's class declares
//! the requested action.
//!
//! ## Descent rules
//!
//! - A property or key segment looks in `properties`, then in the
//!   `additionalProperties` schema.
//! - An index segment takes the `items` schema (or the tuple slot).
//! - References are followed after every step, and a nullable
//!   `oneOf`/`anyOf` wrapper (an optional class) is stepped through to its
//!   one non-null candidate.

use modcfg_core::{DocumentPath, PathSegment};
use modcfg_schema::node::{Additional, Items};
use modcfg_schema::SchemaNode;

use crate::error::CustomActionError;

/// Find the node `path` addresses and check it declares `action`.
pub fn resolve_action_target(
    root: &SchemaNode,
    path: &str,
    action: &str,
) -> Result<DocumentPath, CustomActionError> {
    let invalid = || CustomActionError::InvalidPath {
        path: path.to_string(),
    };
    let parsed = DocumentPath::parse(path).map_err(|_| invalid())?;

    let mut node = descend(root, root);
    for segment in parsed.segments() {
        let next = match segment {
            PathSegment::Property(name) | PathSegment::Key(name) => {
                node.properties.get(name).or(match &node.additional_properties {
                    Some(Additional::Schema(schema)) => Some(schema.as_ref()),
                    _ => None,
                })
            }
            PathSegment::Index(index) => match &node.items {
                Some(Items::Single(schema)) => Some(schema.as_ref()),
                Some(Items::Tuple(schemas)) => schemas.get(*index),
                None => None,
            },
        };
        node = descend(next.ok_or_else(invalid)?, root);
    }

    let actions = node
        .behavior
        .as_ref()
        .and_then(|behavior| behavior.actions.as_ref())
        .filter(|actions| !actions.custom_actions.is_empty())
        .ok_or_else(|| CustomActionError::NoActions {
            path: path.to_string(),
        })?;
    if !actions.declares(action) {
        return Err(CustomActionError::UnknownAction {
            path: path.to_string(),
            action: action.to_string(),
        });
    }
    Ok(parsed)
}

fn descend<'a>(node: &'a SchemaNode, root: &'a SchemaNode) -> &'a SchemaNode {
    let mut node = node.resolve(root);
    for _ in 0..64 {
        match non_null_candidate(node) {
            Some(inner) => node = inner.resolve(root),
            None => break,
        }
    }
    node
}

fn non_null_candidate(node: &SchemaNode) -> Option<&SchemaNode> {
    [&node.one_of, &node.any_of].into_iter().find_map(|candidates| {
        if !candidates.iter().any(SchemaNode::is_null_only) {
            return None;
        }
        let mut rest = candidates.iter().filter(|candidate| !candidate.is_null_only());
        match (rest.next(), rest.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    })
}
