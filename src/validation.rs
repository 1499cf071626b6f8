//! Configuration checks against a [`Schema`].
//!
//! Every problem becomes its own error [`Diagnostic`], so a user fixing a
//! provider block sees all mistakes at once rather than one per run.
//!
//! # Example
//!
//! ```
//! use terraform_provider_bosk::schema::{Attribute, Schema};
//! use terraform_provider_bosk::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("url_prefix", Attribute::required_string())
//!     .with_attribute("username", Attribute::optional_string());
//!
//! assert!(validate(&schema, &json!({"url_prefix": "http://localhost/"})).is_empty());
//!
//! let problems = validate(&schema, &json!({"url_prefix": 7}));
//! assert_eq!(problems.len(), 1);
//! assert_eq!(problems[0].attribute.as_deref(), Some("url_prefix"));
//! ```

use crate::diagnostics::Diagnostic;
use crate::schema::{Attribute, AttributeType, Schema};
use serde_json::{Map, Value};

/// Check `value` against `schema`. No diagnostics means it is acceptable.
///
/// Null is treated as an empty object. Anything else that is not an object
/// yields a single diagnostic. Otherwise attributes are checked in name order
/// for presence, configurability and type, followed by any keys the schema
/// does not declare.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let empty = Map::new();
    let config = match value {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return vec![Diagnostic::error("Expected object")
                .with_detail(format!("Got {}", json_kind(other)))]
        }
    };

    let mut checker = Checker::default();
    for name in schema.attribute_names() {
        checker.attribute(&schema.attributes[name], config.get(name), name);
    }
    checker.undeclared(schema, config);
    checker.found
}

/// [`validate`] folded into a `Result`.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    match validate(schema, value) {
        problems if problems.is_empty() => Ok(()),
        problems => Err(problems),
    }
}

pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

#[derive(Default)]
struct Checker {
    found: Vec<Diagnostic>,
}

impl Checker {
    fn report(&mut self, path: &str, summary: String, detail: impl Into<String>) {
        self.found.push(
            Diagnostic::error(summary)
                .with_detail(detail)
                .with_attribute(path),
        );
    }

    fn attribute(&mut self, attr: &Attribute, value: Option<&Value>, path: &str) {
        match value.filter(|v| !v.is_null()) {
            None if attr.flags.required => self.report(
                path,
                format!("Missing required attribute '{}'", path),
                "This attribute must be set",
            ),
            None => {}
            Some(_) if attr.flags.is_computed_only() => self.report(
                path,
                format!("Value for unconfigurable attribute '{}'", path),
                "The provider sets this attribute; it cannot be configured",
            ),
            Some(v) => self.typed(attr.attr_type, v, path),
        }
    }

    fn typed(&mut self, expected: AttributeType, value: &Value, path: &str) {
        let matches = match expected {
            AttributeType::String => value.is_string(),
        };
        if !matches {
            self.report(
                path,
                format!("Invalid type for attribute '{}'", path),
                format!("Expected {}, got {}", type_label(expected), json_kind(value)),
            );
        }
    }

    fn undeclared(&mut self, schema: &Schema, config: &Map<String, Value>) {
        let mut extra: Vec<&str> = config
            .keys()
            .map(String::as_str)
            .filter(|key| !schema.attributes.contains_key(*key))
            .collect();
        extra.sort_unstable();
        for key in extra {
            self.report(
                key,
                format!("Unsupported attribute '{}'", key),
                "No attribute with this name is declared here",
            );
        }
    }
}

fn type_label(attr_type: AttributeType) -> &'static str {
    match attr_type {
        AttributeType::String => "string",
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
