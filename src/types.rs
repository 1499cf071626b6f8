//! Plan, import and result types exchanged with the host.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diagnostics::Diagnostic;
use crate::schema::Schema;

/// How one attribute moves between prior and planned state.
///
/// `before` is `None` for an attribute being set for the first time and
/// `after` is `None` for one being cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub path: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl AttributeChange {
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }
}

/// What a plan call proposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// Null when the resource is being destroyed.
    pub planned_state: Value,
    pub changes: Vec<AttributeChange>,
    /// Destroy-then-create instead of an in-place update.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Diff `prior` against `planned` attribute by attribute.
    ///
    /// Attributes are compared in name order and null counts as absent. An
    /// existing resource requires replacement when any attribute marked
    /// `force_new` changes; creating or destroying never does.
    pub fn compute(schema: &Schema, prior: Option<&Value>, planned_state: Value) -> Self {
        let mut changes = Vec::new();
        let mut requires_replace = false;

        for name in schema.attribute_names() {
            let before = prior.and_then(|state| non_null(state, name));
            let after = non_null(&planned_state, name);
            if before == after {
                continue;
            }

            requires_replace |=
                before.is_some() && after.is_some() && schema.attributes[name].force_new;
            changes.push(AttributeChange::new(name, before.cloned(), after.cloned()));
        }

        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    pub fn is_no_op(&self) -> bool {
        self.changes.is_empty()
    }
}

fn non_null<'a>(state: &'a Value, name: &str) -> Option<&'a Value> {
    state.get(name).filter(|v| !v.is_null())
}

/// A value returned together with the non-fatal diagnostics collected while
/// producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            diagnostics: Vec::new(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) -> Self {
        self.diagnostics.extend(diagnostics);
        self
    }

    pub fn into_parts(self) -> (T, Vec<Diagnostic>) {
        (self.value, self.diagnostics)
    }
}

/// State recovered by an import, tagged with its resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    pub resource_type: String,
    pub state: Value,
}

impl ImportedResource {
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Answer to a metadata request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Sorted resource type names.
    pub resources: Vec<String>,
    pub capabilities: ServerCapabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// The host should call plan for destroys too.
    pub plan_destroy: bool,
}
