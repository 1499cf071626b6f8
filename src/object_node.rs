//! The `object_node` resource.
//!
//! An object node is a JSON document stored in bosk at `url_prefix + id`.
//! Each lifecycle callback maps between the host's state and one REST call:
//!
//! | Callback | Request                         |
//! |----------|---------------------------------|
//! | create   | `PUT url_prefix + id`           |
//! | read     | `GET url_prefix + id`           |
//! | update   | `PUT url_prefix + id`           |
//! | delete   | `DELETE url_prefix + id`        |
//! | import   | `GET url_prefix + <import id>`  |

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::client::BoskClient;
use crate::diagnostics::Diagnostic;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::types::{ImportedResource, Outcome, PlanResult};

/// Resource type name.
pub const TYPE_NAME: &str = "object_node";

/// Id used when the configuration does not name one.
pub const DEFAULT_ID: &str = "example-id";

/// Value of `defaulted` when it is not configured.
pub const DEFAULTED_VALUE: &str = "example value when not configured";

/// The resource schema.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("A JSON object stored in bosk.")
        .with_attribute(
            "id",
            Attribute::optional_computed_string()
                .with_default(json!(DEFAULT_ID))
                .with_force_new()
                .with_description("Node identifier, appended to the provider's url_prefix."),
        )
        .with_attribute(
            "configurable_attribute",
            Attribute::optional_string().with_description("Free-form value stored on the node."),
        )
        .with_attribute(
            "defaulted",
            Attribute::optional_computed_string()
                .with_default(json!(DEFAULTED_VALUE))
                .with_description("Value stored on the node, defaulted when not configured."),
        )
}

/// Typed resource state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectNodeState {
    /// Node identifier.
    pub id: String,
    /// Free-form value.
    pub configurable_attribute: Option<String>,
    /// Defaulted value.
    pub defaulted: String,
}

/// The document stored in bosk for a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct NodePayload {
    #[serde(default)]
    configurable_attribute: Option<String>,
    #[serde(default)]
    defaulted: Option<String>,
}

impl ObjectNodeState {
    /// State for a node known only by id, as when importing.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            configurable_attribute: None,
            defaulted: DEFAULTED_VALUE.to_string(),
        }
    }

    /// Decode a host state, filling schema defaults first.
    pub fn from_value(mut value: Value) -> Result<Self, ProviderError> {
        schema().apply_defaults(&mut value);
        Ok(serde_json::from_value(value)?)
    }

    /// Encode as a host state.
    pub fn to_value(&self) -> Result<Value, ProviderError> {
        Ok(serde_json::to_value(self)?)
    }

    fn payload(&self) -> Result<String, ProviderError> {
        Ok(serde_json::to_string(&NodePayload {
            configurable_attribute: self.configurable_attribute.clone(),
            defaulted: Some(self.defaulted.clone()),
        })?)
    }

    fn refresh_from(&mut self, payload: NodePayload) {
        self.configurable_attribute = payload.configurable_attribute;
        self.defaulted = payload
            .defaulted
            .unwrap_or_else(|| DEFAULTED_VALUE.to_string());
    }
}

/// Plan a create, update or destroy.
///
/// A null `proposed_state` means the resource is being destroyed.
pub fn plan(prior_state: Option<Value>, proposed_state: Value) -> PlanResult {
    let schema = schema();
    let mut planned = proposed_state;
    schema.apply_defaults(&mut planned);
    PlanResult::compute(&schema, prior_state.as_ref(), planned)
}

/// Store the planned node.
pub async fn create(client: &BoskClient, planned_state: Value) -> Result<Outcome<Value>, ProviderError> {
    let state = ObjectNodeState::from_value(planned_state)?;
    put(client, &state).await?;
    info!(id = %state.id, "Created object node");
    Ok(Outcome::new(state.to_value()?))
}

/// Refresh the state from bosk.
///
/// Returns null state when the node no longer exists.
pub async fn read(client: &BoskClient, current_state: Value) -> Result<Outcome<Value>, ProviderError> {
    let state = ObjectNodeState::from_value(current_state)?;
    match fetch(client, state).await? {
        Some(outcome) => {
            let (state, diagnostics) = outcome.into_parts();
            Ok(Outcome::new(state.to_value()?).with_diagnostics(diagnostics))
        }
        None => Ok(Outcome::new(Value::Null)),
    }
}

/// Replace the stored node with the planned one.
pub async fn update(
    client: &BoskClient,
    prior_state: Value,
    planned_state: Value,
) -> Result<Outcome<Value>, ProviderError> {
    let prior = ObjectNodeState::from_value(prior_state)?;
    let state = ObjectNodeState::from_value(planned_state)?;
    if prior.id != state.id {
        return Err(ProviderError::Validation(format!(
            "changing id from '{}' to '{}' requires replacing the node",
            prior.id, state.id
        )));
    }
    put(client, &state).await?;
    info!(id = %state.id, "Updated object node");
    Ok(Outcome::new(state.to_value()?))
}

/// Remove the node.
pub async fn delete(client: &BoskClient, current_state: Value) -> Result<(), ProviderError> {
    let state = ObjectNodeState::from_value(current_state)?;
    client.delete(&client.node_url(&state.id)).await?;
    info!(id = %state.id, "Deleted object node");
    Ok(())
}

/// Import an existing node by id.
pub async fn import(client: &BoskClient, id: &str) -> Result<Outcome<Vec<ImportedResource>>, ProviderError> {
    match fetch(client, ObjectNodeState::with_id(id)).await? {
        Some(outcome) => {
            let (state, diagnostics) = outcome.into_parts();
            info!(id, "Imported object node");
            Ok(Outcome::new(vec![ImportedResource::new(TYPE_NAME, state.to_value()?)])
                .with_diagnostics(diagnostics))
        }
        None => Err(ProviderError::NotFound(format!(
            "object node '{}' does not exist at {}",
            id,
            client.node_url(id)
        ))),
    }
}

async fn put(client: &BoskClient, state: &ObjectNodeState) -> Result<(), ProviderError> {
    let url = client.node_url(&state.id);
    client.put_as_string(&url, &state.payload()?).await?;
    Ok(())
}

/// Fetch the node behind `state.id` and refresh `state` from it.
///
/// `None` means bosk answered 404. A body that is not a node payload leaves
/// the state as it was and adds a warning.
async fn fetch(
    client: &BoskClient,
    mut state: ObjectNodeState,
) -> Result<Option<Outcome<ObjectNodeState>>, ProviderError> {
    let url = client.node_url(&state.id);
    let fetched = match client.fetch_as_string(&url).await {
        Ok(fetched) => fetched,
        Err(err) if err.is_not_found() => {
            debug!(id = %state.id, "Object node no longer exists");
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };

    let mut diagnostics = fetched.warnings;
    match serde_json::from_str::<NodePayload>(&fetched.text) {
        Ok(payload) => state.refresh_from(payload),
        Err(err) => diagnostics.push(
            Diagnostic::warning("Unexpected object node contents")
                .with_detail(format!(
                    "{} is not an object node ({}); keeping the previous state",
                    url, err
                ))
                .with_attribute("id"),
        ),
    }

    Ok(Some(Outcome::new(state).with_diagnostics(diagnostics)))
}
