//! # Extended Validation
//!
//! Host semantics layered on the validator core through a
//! [`ValidationHook`]: environment overrides at load time, override
//! reconciliation and restart tracking at save time.
//!
//! ## Modes
//!
//! - **Load**: a node bound to a set variable is validated as stored, then
//!   the variable's text is coerced to a value the node admits and
//!   validated in its place. The substitution becomes a [`Patch`] and an
//!   [`OverrideRecord`]. A path that already carries an override for this
//!   configuration is an error.
//! - **Save**: a value equal to a recorded override is patched back to
//!   the value it replaced, so stored documents never contain injected
//!   values. Diverging from a non-overridable override is an error;
//!   diverging from an overridable one drops the record. Restart-flagged
//!   nodes are compared against the last persisted document.
//! - **Plain**: structural validation only.
//!
//! The document itself is never mutated while validating. Patches apply
//! to the returned copy, and record changes are handed back for the
//! caller to commit once the whole operation succeeded. Effects produced
//! inside a combinator candidate are kept only when that candidate decides
//! the combinator, so an optional class stored as `null` never records
//! overrides for its members.

use modcfg_core::{CanonicalText, DocumentPath};
use modcfg_schema::{
    BehaviorDescriptor, ErrorKind, NodeVisit, PrimitiveType, SchemaNode, TypeSet, ValidationError,
    ValidationHook, Validator, VisitAction,
};
use serde_json::Value;

use crate::document::{apply_patches, Patch};
use crate::environment::EnvironmentSource;
use crate::records::{OverrideRecord, PendingRestart, RecordChanges, RecordSnapshot};

/// Which host semantics apply to a validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Plain,
    Load,
    Save,
}

/// Inputs of one extended validation pass.
pub struct ValidationContext<'a> {
    pub mode: ValidationMode,
    pub environment: &'a dyn EnvironmentSource,
    /// This configuration's records before the pass.
    pub records: &'a RecordSnapshot,
    /// The last persisted document, for restart tracking.
    pub baseline: Option<&'a Value>,
}

/// Result of one pass.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// The document with every patch applied.
    pub document: Value,
    pub errors: Vec<ValidationError>,
    pub patches: Vec<Patch>,
    pub changes: RecordChanges,
}

/// Validate `document` under `context`.
pub fn validate_extended(
    validator: &Validator<'_>,
    document: Value,
    context: ValidationContext<'_>,
) -> ValidationOutcome {
    let mut hook = HostHook {
        context,
        patches: Vec::new(),
        changes: RecordChanges::default(),
        marks: Vec::new(),
    };
    let errors = validator.validate_with(&document, &mut hook);
    let HostHook { patches, changes, .. } = hook;
    let mut document = document;
    apply_patches(&mut document, &patches);
    ValidationOutcome {
        document,
        errors,
        patches,
        changes,
    }
}

// ─── Hook ────────────────────────────────────────────────────────────

struct HostHook<'a> {
    context: ValidationContext<'a>,
    patches: Vec<Patch>,
    changes: RecordChanges,
    marks: Vec<Mark>,
}

/// Effect counts when a candidate began.
#[derive(Debug, Clone, Copy)]
struct Mark {
    patches: usize,
    set_overrides: usize,
    clear_overrides: usize,
    add_pending: usize,
    clear_pending: usize,
}

impl ValidationHook for HostHook<'_> {
    fn on_visit(&mut self, visit: &NodeVisit<'_>) -> VisitAction {
        let Some(behavior) = visit.behavior() else {
            return VisitAction::default();
        };
        match self.context.mode {
            ValidationMode::Plain => VisitAction::default(),
            ValidationMode::Load => self.apply_override(visit, behavior),
            ValidationMode::Save => self.reconcile(visit, behavior),
        }
    }

    fn begin_candidate(&mut self) {
        self.marks.push(Mark {
            patches: self.patches.len(),
            set_overrides: self.changes.set_overrides.len(),
            clear_overrides: self.changes.clear_overrides.len(),
            add_pending: self.changes.add_pending.len(),
            clear_pending: self.changes.clear_pending.len(),
        });
    }

    fn discard_candidate(&mut self) {
        let Some(mark) = self.marks.pop() else {
            return;
        };
        self.patches.truncate(mark.patches);
        self.changes.set_overrides.truncate(mark.set_overrides);
        self.changes.clear_overrides.truncate(mark.clear_overrides);
        self.changes.add_pending.truncate(mark.add_pending);
        self.changes.clear_pending.truncate(mark.clear_pending);
    }
}

impl HostHook<'_> {
    fn apply_override(&mut self, visit: &NodeVisit<'_>, behavior: &BehaviorDescriptor) -> VisitAction {
        let Some((variable, _)) = behavior.environment_binding() else {
            return VisitAction::default();
        };
        let Some(raw) = self.context.environment.var(variable) else {
            return VisitAction::default();
        };
        let key = visit.path.to_string();
        if self.context.records.overrides.contains_key(&key) {
            return error_action(ErrorKind::EnvironmentOverrideReapplied, visit);
        }
        let Some(value) = coerce(&raw, visit.resolved) else {
            tracing::warn!(variable, path = %key, "environment variable does not fit the property type");
            return error_action(ErrorKind::EnvironmentOverrideUnparsable, visit);
        };

        tracing::debug!(variable, path = %key, "applying environment override");
        self.patches.push(Patch::Set {
            path: visit.path.clone(),
            value: value.clone(),
        });
        self.changes.set_overrides.push((
            key,
            OverrideRecord {
                value: value.clone(),
                prior: visit.value.cloned(),
            },
        ));
        VisitAction {
            errors: Vec::new(),
            revalidate: Some(value),
        }
    }

    fn reconcile(&mut self, visit: &NodeVisit<'_>, behavior: &BehaviorDescriptor) -> VisitAction {
        let key = visit.path.to_string();
        let mut stored = visit.value.cloned();
        let mut errors = Vec::new();

        if let Some((_, overridable)) = behavior.environment_binding() {
            if let Some(record) = self.context.records.overrides.get(&key) {
                let matches = visit
                    .value
                    .is_some_and(|value| CanonicalText::same_value(value, &record.value));
                if matches {
                    if !same_optional(record.prior.as_ref(), Some(&record.value)) {
                        self.patches.push(restore(visit.path, record.prior.clone()));
                        stored = record.prior.clone();
                    }
                } else if overridable {
                    self.changes.clear_overrides.push(key.clone());
                } else {
                    errors.push(ValidationError::new(
                        ErrorKind::EnvironmentOverrideConflict,
                        visit.property,
                        visit.path,
                    ));
                }
            }
        }

        if behavior.requires_restart() {
            self.track_restart(visit.path, key, stored.as_ref());
        }

        VisitAction {
            errors,
            revalidate: None,
        }
    }

    fn track_restart(&mut self, path: &DocumentPath, key: String, stored: Option<&Value>) {
        match self.context.records.pending_restart.get(&key) {
            Some(pending) => {
                if same_optional(stored, pending.baseline.as_ref()) {
                    self.changes.clear_pending.push(key);
                }
            }
            None => {
                let Some(baseline) = self.context.baseline else {
                    return;
                };
                let persisted = path.lookup(baseline);
                if !same_optional(stored, persisted) {
                    self.changes.add_pending.push((
                        key,
                        PendingRestart {
                            baseline: persisted.cloned(),
                        },
                    ));
                }
            }
        }
    }
}

fn error_action(kind: ErrorKind, visit: &NodeVisit<'_>) -> VisitAction {
    VisitAction {
        errors: vec![ValidationError::new(kind, visit.property, visit.path)],
        revalidate: None,
    }
}

fn restore(path: &DocumentPath, prior: Option<Value>) -> Patch {
    match prior {
        Some(value) => Patch::Set {
            path: path.clone(),
            value,
        },
        None => Patch::Remove { path: path.clone() },
    }
}

fn same_optional(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => CanonicalText::same_value(a, b),
        _ => false,
    }
}

/// Turn raw variable text into a value `node` admits.
///
/// JSON text is used as parsed when its type is admitted. Otherwise the
/// text becomes a string, if strings are admitted.
fn coerce(raw: &str, node: &SchemaNode) -> Option<Value> {
    let types = &node.types;
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        if types.is_empty() || admits(types, &parsed) {
            return Some(parsed);
        }
    }
    if types.is_empty() || types.contains(PrimitiveType::String) {
        return Some(Value::String(raw.to_string()));
    }
    None
}

fn admits(types: &TypeSet, value: &Value) -> bool {
    let natural = PrimitiveType::of(value);
    types.contains(natural)
        || (natural == PrimitiveType::Integer && types.contains(PrimitiveType::Number))
}
