//! In-process test harness.
//!
//! [`ProviderTester`] drives a [`ProviderService`] the way a host would, minus
//! the gRPC hop. The `lifecycle_*` helpers chain the calls a host makes for
//! one `apply` and keep every warning raised along the way.
//!
//! # Example
//!
//! ```ignore
//! use terraform_provider_bosk::testing::ProviderTester;
//! use terraform_provider_bosk::BoskProvider;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_node() {
//!     let tester = ProviderTester::new(BoskProvider::new());
//!     tester
//!         .configure(json!({"url_prefix": "http://localhost:1740/nodes/"}))
//!         .await
//!         .unwrap();
//!
//!     let created = tester
//!         .lifecycle_create("object_node", json!({"configurable_attribute": "one"}))
//!         .await
//!         .unwrap();
//!     assert_eq!(created.value["id"], "example-id");
//! }
//! ```

use serde_json::Value;
use thiserror::Error;

use crate::diagnostics::{has_errors, Diagnostic, DiagnosticSeverity};
use crate::error::ProviderError;
use crate::schema::ProviderSchema;
use crate::service::ProviderService;
use crate::types::{ImportedResource, Outcome, PlanResult};

/// Wraps a provider and calls it like a host.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Sorted resource type names from the provider's metadata.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Warnings on success; error diagnostics become [`TestError::Diagnostics`].
    pub async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, TestError> {
        split_errors(self.provider.validate_provider_config(config).await?)
    }

    /// Warnings on success; error diagnostics become [`TestError::Diagnostics`].
    pub async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, TestError> {
        split_errors(self.provider.configure(config).await?)
    }

    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, TestError> {
        split_errors(
            self.provider
                .validate_resource_config(resource_type, config)
                .await?,
        )
    }

    /// Plan with no prior state, using `config` as both proposal and config.
    pub async fn plan_create(&self, resource_type: &str, config: Value) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, config.clone(), config)
            .await
    }

    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), config.clone(), config)
            .await
    }

    /// Plan towards a null state.
    pub async fn plan_delete(&self, resource_type: &str, prior_state: Value) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Outcome<Value>, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Outcome<Value>, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Outcome<Value>, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Outcome<Vec<ImportedResource>>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// plan, create, then read back. The outcome holds the read state and
    /// the warnings from create and read.
    pub async fn lifecycle_create(&self, resource_type: &str, config: Value) -> Result<Outcome<Value>, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read_back(resource_type, created).await
    }

    /// plan, update, then read back. The outcome holds the read state and
    /// the warnings from update and read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Outcome<Value>, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), config)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read_back(resource_type, updated).await
    }

    pub async fn lifecycle_delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone()).await?;
        self.delete(resource_type, current_state).await
    }

    /// Create with `initial_config`, update to `updated_config`, delete.
    ///
    /// The outcome carries the state as it was just before the delete.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Outcome<Value>, ProviderError> {
        let (created, mut diagnostics) = self
            .lifecycle_create(resource_type, initial_config)
            .await?
            .into_parts();
        let (updated, more) = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?
            .into_parts();
        diagnostics.extend(more);

        self.lifecycle_delete(resource_type, updated.clone()).await?;
        Ok(Outcome::new(updated).with_diagnostics(diagnostics))
    }

    async fn read_back(&self, resource_type: &str, written: Outcome<Value>) -> Result<Outcome<Value>, ProviderError> {
        let (state, mut diagnostics) = written.into_parts();
        let (state, more) = self.read(resource_type, state).await?.into_parts();
        diagnostics.extend(more);
        Ok(Outcome::new(state).with_diagnostics(diagnostics))
    }

    /// Import `id` and compare the result with `expected`.
    ///
    /// Every attribute present in either state is compared, except those
    /// listed in `ignore`. Null and absent are treated as equal. Returns the
    /// imported state on success.
    pub async fn import_state_verify(
        &self,
        resource_type: &str,
        id: &str,
        expected: &Value,
        ignore: &[&str],
    ) -> Result<Value, TestError> {
        let (imported, diagnostics) = self.import_resource(resource_type, id).await?.into_parts();
        split_errors(diagnostics)?;

        let mut of_type = imported
            .into_iter()
            .filter(|resource| resource.resource_type == resource_type);
        let state = match (of_type.next(), of_type.next()) {
            (Some(resource), None) => resource.state,
            (None, _) => {
                return Err(TestError::Import(format!(
                    "import of '{}' returned no {} resource",
                    id, resource_type
                )))
            }
            (Some(_), Some(_)) => {
                return Err(TestError::Import(format!(
                    "import of '{}' returned more than one {} resource",
                    id, resource_type
                )))
            }
        };

        let mut names: Vec<&String> = keys(expected).chain(keys(&state)).collect();
        names.sort();
        names.dedup();

        let compared = names.into_iter().filter(|name| !ignore.contains(&name.as_str()));
        for name in compared {
            let (want, got) = (lookup(expected, name), lookup(&state, name));
            if want != got {
                return Err(TestError::Mismatch {
                    attribute: name.clone(),
                    expected: want,
                    actual: got,
                });
            }
        }

        Ok(state)
    }
}

fn keys(state: &Value) -> impl Iterator<Item = &String> {
    state.as_object().into_iter().flat_map(|map| map.keys())
}

fn lookup(state: &Value, name: &str) -> Value {
    state.get(name).cloned().unwrap_or(Value::Null)
}

/// Why a tester call did not succeed.
#[derive(Debug, Error)]
pub enum TestError {
    /// The provider answered with error diagnostics (only the errors are kept).
    #[error("{}", render(.0))]
    Diagnostics(Vec<Diagnostic>),
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    /// The import did not produce exactly one resource of the requested type.
    #[error("Import error: {0}")]
    Import(String),
    #[error("Imported attribute '{attribute}' differs: expected {expected}, got {actual}")]
    Mismatch {
        attribute: String,
        expected: Value,
        actual: Value,
    },
}

fn render(diagnostics: &[Diagnostic]) -> String {
    let mut out = format!("{} error diagnostic(s):", diagnostics.len());
    for d in diagnostics {
        out.push_str(&format!("\n  {}", d.summary));
        if let Some(attribute) = &d.attribute {
            out.push_str(&format!(" [{}]", attribute));
        }
        if let Some(detail) = &d.detail {
            out.push_str(&format!(": {}", detail));
        }
    }
    out
}

/// Pass warnings through, fail on errors.
fn split_errors(diagnostics: Vec<Diagnostic>) -> Result<Vec<Diagnostic>, TestError> {
    if !has_errors(&diagnostics) {
        return Ok(diagnostics);
    }
    Err(TestError::Diagnostics(
        diagnostics.into_iter().filter(Diagnostic::is_error).collect(),
    ))
}

fn paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

/// Panics unless the plan only sets attributes that had no prior value.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(!plan.changes.is_empty(), "create plan has no changes");
    assert!(
        plan.changes.iter().all(|c| c.before.is_none()),
        "create plan changes existing values: {:?}",
        plan.changes
    );
    assert!(!plan.requires_replace, "create plan asks for replacement");
}

pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(plan.is_no_op(), "plan was expected to be empty, changes: {:?}", paths(plan));
}

pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "plan updates in place, replacement expected; changes: {:?}",
        paths(plan)
    );
}

pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "plan replaces the resource, in-place update expected; changes: {:?}",
        paths(plan)
    );
}

pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "plan leaves '{}' alone; changes: {:?}",
        path,
        paths(plan)
    );
}

pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<&str> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.summary.as_str())
        .collect();
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
}

pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(has_errors(diagnostics), "no error among {:?}", diagnostics);
}

/// Panics unless some error's summary contains `substring`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    assert_contains(diagnostics, DiagnosticSeverity::Error, substring);
}

/// Panics unless some warning's summary contains `substring`.
pub fn assert_has_warning(diagnostics: &[Diagnostic], substring: &str) {
    assert_contains(diagnostics, DiagnosticSeverity::Warning, substring);
}

fn assert_contains(diagnostics: &[Diagnostic], severity: DiagnosticSeverity, substring: &str) {
    let found = diagnostics
        .iter()
        .any(|d| d.severity == severity && d.summary.contains(substring));
    assert!(
        found,
        "no {:?} mentioning '{}' among {:?}",
        severity,
        substring,
        diagnostics
            .iter()
            .map(|d| (d.severity, d.summary.as_str()))
            .collect::<Vec<_>>()
    );
}
