//! The host-facing provider interface.
//!
//! [`ProviderService`] is what a host drives: schema discovery, provider
//! configuration and the resource lifecycle. The gRPC server (feature
//! `grpc`) and the in-process [`crate::testing::ProviderTester`] are both thin
//! adapters over it.
//!
//! Lifecycle callbacks return an [`Outcome`] so that warnings raised while
//! talking to bosk reach the user even when the call succeeds.

use serde_json::Value;

use crate::diagnostics::Diagnostic;
use crate::error::ProviderError;
use crate::schema::ProviderSchema;
use crate::types::{ImportedResource, Outcome, PlanResult, ProviderMetadata};
use crate::validation;

/// Operations a host drives against a provider.
///
/// Only the schema, `configure`, `plan` and the four CRUD calls have to be
/// written; validation and metadata fall back to the schema, and import
/// reports that it is not supported.
///
/// # Example
///
/// ```ignore
/// use terraform_provider_bosk::{BoskProvider, ProviderService};
/// use serde_json::json;
///
/// let provider = BoskProvider::new();
/// provider.configure(json!({"url_prefix": "http://localhost:1740/nodes/"})).await?;
/// let created = provider
///     .create("object_node", json!({"id": "a", "defaulted": "x"}))
///     .await?;
/// ```
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    fn schema(&self) -> ProviderSchema;

    /// Resource type names in sorted order, derived from [`Self::schema`].
    fn metadata(&self) -> ProviderMetadata {
        let mut resources: Vec<String> = self.schema().resources.into_keys().collect();
        resources.sort();
        ProviderMetadata {
            resources,
            ..ProviderMetadata::default()
        }
    }

    /// Checked against the provider schema unless overridden.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validation::validate(&self.schema().provider, &config))
    }

    /// Apply the provider block. The returned diagnostics are warnings;
    /// anything fatal comes back as `Err`.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Release whatever `configure` set up.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Checked against the resource's schema unless overridden.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schemas = self.schema().resources;
        match schemas.get(resource_type) {
            Some(schema) => Ok(validation::validate(schema, &config)),
            None => Err(ProviderError::UnknownResource(resource_type.to_string())),
        }
    }

    /// `prior_state` is `None` when creating; a null `proposed_state` means
    /// the resource is being destroyed.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Outcome<Value>, ProviderError>;

    /// A null state in the outcome means the resource no longer exists.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Outcome<Value>, ProviderError>;

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Outcome<Value>, ProviderError>;

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Adopt an object that already exists remotely, identified by `id`.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Outcome<Vec<ImportedResource>>, ProviderError> {
        Err(ProviderError::Unimplemented(format!(
            "{} cannot be imported",
            resource_type
        )))
    }
}
