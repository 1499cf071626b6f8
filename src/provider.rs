//! The bosk provider.
//!
//! [`BoskProvider`] holds the client built by `configure` and dispatches
//! lifecycle callbacks to the resource modules by type name.

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::client::BoskClient;
use crate::config::{provider_schema, ProviderConfig};
use crate::diagnostics::{has_errors, Diagnostic};
use crate::error::ProviderError;
use crate::object_node;
use crate::schema::ProviderSchema;
use crate::service::ProviderService;
use crate::types::{ImportedResource, Outcome, PlanResult, ProviderMetadata, ServerCapabilities};
use crate::validation;

/// Provider for bosk object nodes.
#[derive(Debug, Default)]
pub struct BoskProvider {
    client: RwLock<Option<BoskClient>>,
}

impl BoskProvider {
    /// Create an unconfigured provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider that is already configured with `client`.
    pub fn with_client(client: BoskClient) -> Self {
        Self {
            client: RwLock::new(Some(client)),
        }
    }

    /// The configured client.
    pub async fn client(&self) -> Result<BoskClient, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration(
                "provider has not been configured; call configure first".to_string(),
            )
        })
    }
}

fn check_resource_type(resource_type: &str) -> Result<(), ProviderError> {
    if resource_type == object_node::TYPE_NAME {
        Ok(())
    } else {
        Err(ProviderError::UnknownResource(resource_type.to_string()))
    }
}

#[async_trait::async_trait]
impl ProviderService for BoskProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(provider_schema())
            .with_resource(object_node::TYPE_NAME, object_node::schema())
    }

    /// `object_node` plans destroys (null proposed state), so the host is
    /// asked to plan them too.
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: vec![object_node::TYPE_NAME.to_string()],
            capabilities: ServerCapabilities { plan_destroy: true },
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validation::validate(&provider_schema(), &config);
        if !has_errors(&diagnostics) {
            diagnostics.extend(ProviderConfig::from_value(config)?.check());
        }
        Ok(diagnostics)
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = self.validate_provider_config(config.clone()).await?;
        if has_errors(&diagnostics) {
            warn!(diagnostics = diagnostics.len(), "Provider configuration rejected");
            return Ok(diagnostics);
        }

        let config = ProviderConfig::from_value(config)?;
        let client = config.build_client()?;
        info!(
            url_prefix = %client.url_prefix(),
            authenticated = client.credentials().is_configured(),
            "Provider configured"
        );
        *self.client.write().await = Some(client);
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        debug!("Releasing client");
        self.client.write().await.take();
        Ok(())
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        check_resource_type(resource_type)?;
        Ok(object_node::plan(prior_state, proposed_state))
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Outcome<Value>, ProviderError> {
        check_resource_type(resource_type)?;
        object_node::create(&self.client().await?, planned_state).await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Outcome<Value>, ProviderError> {
        check_resource_type(resource_type)?;
        object_node::read(&self.client().await?, current_state).await
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Outcome<Value>, ProviderError> {
        check_resource_type(resource_type)?;
        object_node::update(&self.client().await?, prior_state, planned_state).await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        check_resource_type(resource_type)?;
        object_node::delete(&self.client().await?, current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Outcome<Vec<ImportedResource>>, ProviderError> {
        check_resource_type(resource_type)?;
        object_node::import(&self.client().await?, id).await
    }
}
