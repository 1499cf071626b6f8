//! Attribute and schema descriptions.
//!
//! A [`ProviderSchema`] holds one [`Schema`] for the provider block and one per
//! resource type. Validation, default filling and replacement planning all
//! read from these descriptions rather than from the resource code itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Value type accepted by an attribute.
///
/// Every attribute of the provider block and of `object_node` is a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
}

/// Who may set an attribute, and whether its value is secret.
///
/// An attribute that is only `computed` is owned by the provider; setting it
/// in configuration is a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// Must appear in configuration.
    pub required: bool,
    /// May appear in configuration.
    pub optional: bool,
    /// Filled in by the provider.
    pub computed: bool,
    /// Never logged or displayed.
    pub sensitive: bool,
}

impl AttributeFlags {
    const fn of(required: bool, optional: bool, computed: bool) -> Self {
        Self {
            required,
            optional,
            computed,
            sensitive: false,
        }
    }

    pub const fn required() -> Self {
        Self::of(true, false, false)
    }

    pub const fn optional() -> Self {
        Self::of(false, true, false)
    }

    /// Read-only from the configuration's point of view.
    pub const fn computed() -> Self {
        Self::of(false, false, true)
    }

    /// Configurable, with the provider supplying a value when left out.
    pub const fn optional_computed() -> Self {
        Self::of(false, true, true)
    }

    pub fn is_computed_only(&self) -> bool {
        self.computed && !(self.optional || self.required)
    }
}

/// One named field of a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    #[serde(flatten)]
    pub flags: AttributeFlags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A planned change to this attribute replaces the resource.
    #[serde(default)]
    pub force_new: bool,
    /// Substituted when configuration leaves the attribute unset or null.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Attribute {
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
        }
    }

    fn string(flags: AttributeFlags) -> Self {
        Self::new(AttributeType::String, flags)
    }

    pub fn required_string() -> Self {
        Self::string(AttributeFlags::required())
    }

    pub fn optional_string() -> Self {
        Self::string(AttributeFlags::optional())
    }

    pub fn optional_computed_string() -> Self {
        Self::string(AttributeFlags::optional_computed())
    }

    pub fn with_description(self, text: impl Into<String>) -> Self {
        Self {
            description: Some(text.into()),
            ..self
        }
    }

    pub fn with_force_new(self) -> Self {
        Self {
            force_new: true,
            ..self
        }
    }

    pub fn with_default(self, value: Value) -> Self {
        Self {
            default: Some(value),
            ..self
        }
    }

    /// Flag the attribute as secret, e.g. a password.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }
}

/// A versioned set of attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Schema {
    pub fn new(version: u64) -> Self {
        Self {
            version,
            attributes: HashMap::new(),
            description: None,
        }
    }

    /// Shorthand for `Schema::new(0)`.
    pub fn v0() -> Self {
        Self::new(0)
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn with_description(self, text: impl Into<String>) -> Self {
        Self {
            description: Some(text.into()),
            ..self
        }
    }

    /// Attribute names, sorted.
    pub fn attribute_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.attributes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Fill absent or null attributes that have a default.
    ///
    /// Non-object values are left untouched.
    pub fn apply_defaults(&self, value: &mut Value) {
        let Value::Object(map) = value else {
            return;
        };
        let defaults = self
            .attributes
            .iter()
            .filter_map(|(name, attr)| attr.default.as_ref().map(|d| (name, d)));
        for (name, default) in defaults {
            let slot = map.entry(name.clone()).or_insert(Value::Null);
            if slot.is_null() {
                *slot = default.clone();
            }
        }
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::v0()
    }
}

/// Everything a host needs to know about this provider's shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// The `provider` block.
    #[serde(default)]
    pub provider: Schema,
    /// Keyed by resource type name.
    #[serde(default)]
    pub resources: HashMap<String, Schema>,
}

impl ProviderSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider_config(self, provider: Schema) -> Self {
        Self { provider, ..self }
    }

    pub fn with_resource(mut self, type_name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(type_name.into(), schema);
        self
    }
}
