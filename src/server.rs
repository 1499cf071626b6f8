//! gRPC server for the host protocol.
//!
//! The host spawns the plugin binary, reads one handshake line from stdout
//! and then speaks the `bosk.provider.v1.Provider` service to the advertised
//! address. Everything else the process writes goes to stderr.
//!
//! ```text
//! BOSK_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! # Signal Handling
//!
//! On SIGTERM or SIGINT the server stops accepting connections, gives
//! in-flight requests up to [`ServeOptions::shutdown_timeout`] to finish and
//! then calls [`ProviderService::stop`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::transport::Server;
use tracing::{debug, error, info, instrument, warn};

use crate::diagnostics::{has_errors, Diagnostic, DiagnosticSeverity};
use crate::error::ProviderError;
use crate::schema::Schema;
use crate::service::ProviderService;
use crate::types::{AttributeChange, ImportedResource, Outcome};

/// Generated protocol types.
#[allow(clippy::all)]
pub mod proto {
    tonic::include_proto!("bosk.provider.v1");
}

/// Protocol version announced in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// First field of the handshake line.
pub const HANDSHAKE_PREFIX: &str = "BOSK_PROVIDER";

/// Wrapper that implements the generated gRPC trait.
pub struct ProviderGrpcService<P: ProviderService> {
    provider: Arc<P>,
}

impl<P: ProviderService> ProviderGrpcService<P> {
    /// Wrap a provider.
    pub fn new(provider: P) -> Self {
        Self::from_arc(Arc::new(provider))
    }

    fn from_arc(provider: Arc<P>) -> Self {
        Self { provider }
    }
}

impl From<Diagnostic> for proto::Diagnostic {
    fn from(d: Diagnostic) -> Self {
        let severity = match d.severity {
            DiagnosticSeverity::Error => proto::diagnostic::Severity::Error,
            DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning,
        };
        Self {
            severity: severity as i32,
            summary: d.summary,
            detail: d.detail.unwrap_or_default(),
            attribute: d.attribute.unwrap_or_default(),
        }
    }
}

impl From<AttributeChange> for proto::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        Self {
            path: change.path,
            before: change.before.map(|v| v.to_string().into_bytes()).unwrap_or_default(),
            after: change.after.map(|v| v.to_string().into_bytes()).unwrap_or_default(),
        }
    }
}

fn schema_to_proto(schema: &Schema) -> proto::Schema {
    let attributes = schema
        .attribute_names()
        .into_iter()
        .map(|name| {
            let attr = &schema.attributes[name];
            proto::Attribute {
                name: name.to_string(),
                r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
                required: attr.flags.required,
                optional: attr.flags.optional,
                computed: attr.flags.computed,
                sensitive: attr.flags.sensitive,
                description: attr.description.clone().unwrap_or_default(),
                force_new: attr.force_new,
                default_value: attr
                    .default
                    .as_ref()
                    .map(|v| v.to_string().into_bytes())
                    .unwrap_or_default(),
            }
        })
        .collect();

    proto::Schema {
        version: schema.version as i64,
        attributes,
        description: schema.description.clone().unwrap_or_default(),
    }
}

/// Decode a JSON payload. Empty bytes decode as null.
fn decode(bytes: &[u8]) -> Result<Value, tonic::Status> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|err| ProviderError::from(err).into())
}

fn encode(value: &Value) -> Vec<u8> {
    value.to_string().into_bytes()
}

/// Convert diagnostics for the wire, logging how the call went.
fn reported(rpc: &'static str, diagnostics: Vec<Diagnostic>) -> Vec<proto::Diagnostic> {
    if has_errors(&diagnostics) {
        warn!(rpc, diagnostics = diagnostics.len(), "Completed with errors");
    } else {
        debug!(rpc, diagnostics = diagnostics.len(), "Completed");
    }
    diagnostics.into_iter().map(Into::into).collect()
}

/// Log a failed call and turn the error into the one diagnostic the host sees.
/// `subject` is the resource type, or `provider` for provider-level calls.
fn failed(rpc: &'static str, subject: &str, err: &ProviderError) -> Vec<proto::Diagnostic> {
    error!(rpc, subject, error = %err, "Call failed");
    vec![err.to_diagnostic().into()]
}

/// Encoded state plus diagnostics for create, read and update replies.
/// A failed call yields empty state bytes.
fn state_reply(
    rpc: &'static str,
    resource_type: &str,
    result: Result<Outcome<Value>, ProviderError>,
) -> (Vec<u8>, Vec<proto::Diagnostic>) {
    match result {
        Ok(outcome) => {
            let (state, diagnostics) = outcome.into_parts();
            if state.is_null() {
                info!(rpc, resource_type, "Resource no longer exists");
            } else {
                info!(rpc, resource_type, "State returned");
            }
            (encode(&state), reported(rpc, diagnostics))
        }
        Err(err) => (Vec::new(), failed(rpc, resource_type, &err)),
    }
}

fn imported_to_proto(resource: ImportedResource) -> proto::ImportedResource {
    proto::ImportedResource {
        resource_type: resource.resource_type,
        state: encode(&resource.state),
    }
}

#[tonic::async_trait]
impl<P: ProviderService> proto::provider_server::Provider for ProviderGrpcService<P> {
    #[instrument(skip_all, name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: tonic::Request<proto::GetMetadataRequest>,
    ) -> Result<tonic::Response<proto::GetMetadataResponse>, tonic::Status> {
        let metadata = self.provider.metadata();
        Ok(tonic::Response::new(proto::GetMetadataResponse {
            server_capabilities: Some(proto::ServerCapabilities {
                plan_destroy: metadata.capabilities.plan_destroy,
            }),
            resources: metadata.resources,
            diagnostics: Vec::new(),
        }))
    }

    #[instrument(skip_all, name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: tonic::Request<proto::GetSchemaRequest>,
    ) -> Result<tonic::Response<proto::GetSchemaResponse>, tonic::Status> {
        let schema = self.provider.schema();
        let resources = schema
            .resources
            .iter()
            .map(|(type_name, resource)| (type_name.clone(), schema_to_proto(resource)))
            .collect();
        Ok(tonic::Response::new(proto::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources,
            diagnostics: Vec::new(),
        }))
    }

    #[instrument(skip_all, name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: tonic::Request<proto::ValidateProviderConfigRequest>,
    ) -> Result<tonic::Response<proto::ValidateProviderConfigResponse>, tonic::Status> {
        const RPC: &str = "ValidateProviderConfig";
        let config = decode(&request.into_inner().config)?;
        let diagnostics = match self.provider.validate_provider_config(config).await {
            Ok(found) => reported(RPC, found),
            Err(err) => failed(RPC, "provider", &err),
        };
        Ok(tonic::Response::new(proto::ValidateProviderConfigResponse { diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.configure")]
    async fn configure(
        &self,
        request: tonic::Request<proto::ConfigureRequest>,
    ) -> Result<tonic::Response<proto::ConfigureResponse>, tonic::Status> {
        const RPC: &str = "Configure";
        let config = decode(&request.into_inner().config)?;
        let diagnostics = match self.provider.configure(config).await {
            Ok(warnings) => reported(RPC, warnings),
            Err(err) => failed(RPC, "provider", &err),
        };
        Ok(tonic::Response::new(proto::ConfigureResponse { diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.stop")]
    async fn stop(
        &self,
        _request: tonic::Request<proto::StopRequest>,
    ) -> Result<tonic::Response<proto::StopResponse>, tonic::Status> {
        info!("Host asked the provider to stop");
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(err) => {
                error!(error = %err, "Stop failed");
                err.to_string()
            }
        };
        Ok(tonic::Response::new(proto::StopResponse { error }))
    }

    #[instrument(skip_all, name = "grpc.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        request: tonic::Request<proto::ValidateResourceConfigRequest>,
    ) -> Result<tonic::Response<proto::ValidateResourceConfigResponse>, tonic::Status> {
        const RPC: &str = "ValidateResourceConfig";
        let proto::ValidateResourceConfigRequest {
            resource_type,
            config,
        } = request.into_inner();
        let config = decode(&config)?;
        let diagnostics = match self
            .provider
            .validate_resource_config(&resource_type, config)
            .await
        {
            Ok(found) => reported(RPC, found),
            Err(err) => failed(RPC, &resource_type, &err),
        };
        Ok(tonic::Response::new(proto::ValidateResourceConfigResponse { diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.plan")]
    async fn plan(
        &self,
        request: tonic::Request<proto::PlanRequest>,
    ) -> Result<tonic::Response<proto::PlanResponse>, tonic::Status> {
        let proto::PlanRequest {
            resource_type,
            prior_state,
            proposed_state,
            config,
        } = request.into_inner();
        // Absent prior state means create; a JSON null would be a resource
        // that has vanished.
        let prior_state = if prior_state.is_empty() {
            None
        } else {
            Some(decode(&prior_state)?)
        };
        let proposed_state = decode(&proposed_state)?;
        let config = decode(&config)?;

        let response = match self
            .provider
            .plan(&resource_type, prior_state, proposed_state, config)
            .await
        {
            Ok(plan) => {
                info!(
                    resource_type = %resource_type,
                    changes = plan.changes.len(),
                    requires_replace = plan.requires_replace,
                    "Planned"
                );
                proto::PlanResponse {
                    planned_state: encode(&plan.planned_state),
                    changes: plan.changes.into_iter().map(Into::into).collect(),
                    requires_replace: plan.requires_replace,
                    diagnostics: Vec::new(),
                }
            }
            Err(err) => proto::PlanResponse {
                diagnostics: failed("Plan", &resource_type, &err),
                ..Default::default()
            },
        };
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.create")]
    async fn create(
        &self,
        request: tonic::Request<proto::CreateRequest>,
    ) -> Result<tonic::Response<proto::CreateResponse>, tonic::Status> {
        let req = request.into_inner();
        let planned_state = decode(&req.planned_state)?;
        let result = self.provider.create(&req.resource_type, planned_state).await;
        let (state, diagnostics) = state_reply("Create", &req.resource_type, result);
        Ok(tonic::Response::new(proto::CreateResponse { state, diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.read")]
    async fn read(
        &self,
        request: tonic::Request<proto::ReadRequest>,
    ) -> Result<tonic::Response<proto::ReadResponse>, tonic::Status> {
        let req = request.into_inner();
        let current_state = decode(&req.current_state)?;
        let result = self.provider.read(&req.resource_type, current_state).await;
        let (state, diagnostics) = state_reply("Read", &req.resource_type, result);
        Ok(tonic::Response::new(proto::ReadResponse { state, diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.update")]
    async fn update(
        &self,
        request: tonic::Request<proto::UpdateRequest>,
    ) -> Result<tonic::Response<proto::UpdateResponse>, tonic::Status> {
        let req = request.into_inner();
        let prior_state = decode(&req.prior_state)?;
        let planned_state = decode(&req.planned_state)?;
        let result = self
            .provider
            .update(&req.resource_type, prior_state, planned_state)
            .await;
        let (state, diagnostics) = state_reply("Update", &req.resource_type, result);
        Ok(tonic::Response::new(proto::UpdateResponse { state, diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.delete")]
    async fn delete(
        &self,
        request: tonic::Request<proto::DeleteRequest>,
    ) -> Result<tonic::Response<proto::DeleteResponse>, tonic::Status> {
        let req = request.into_inner();
        let current_state = decode(&req.current_state)?;
        let diagnostics = match self.provider.delete(&req.resource_type, current_state).await {
            Ok(()) => {
                info!(resource_type = %req.resource_type, "Deleted");
                Vec::new()
            }
            Err(err) => failed("Delete", &req.resource_type, &err),
        };
        Ok(tonic::Response::new(proto::DeleteResponse { diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.import_resource_state")]
    async fn import_resource_state(
        &self,
        request: tonic::Request<proto::ImportResourceStateRequest>,
    ) -> Result<tonic::Response<proto::ImportResourceStateResponse>, tonic::Status> {
        const RPC: &str = "ImportResourceState";
        let proto::ImportResourceStateRequest { resource_type, id } = request.into_inner();
        let (imported, diagnostics) = match self.provider.import_resource(&resource_type, &id).await {
            Ok(outcome) => {
                let (resources, diagnostics) = outcome.into_parts();
                info!(resource_type = %resource_type, id = %id, count = resources.len(), "Imported");
                (
                    resources.into_iter().map(imported_to_proto).collect(),
                    reported(RPC, diagnostics),
                )
            }
            Err(err) => (Vec::new(), failed(RPC, &resource_type, &err)),
        };
        Ok(tonic::Response::new(proto::ImportResourceStateResponse {
            imported,
            diagnostics,
        }))
    }
}

/// Options for configuring the provider server.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long in-flight requests may run after a shutdown signal.
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    /// Create new serve options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Wait for SIGTERM or SIGINT (CTRL+C on Windows).
///
/// If no handler can be installed the future never completes and the host
/// has to kill the process.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(error = %e, "Unable to install signal handlers");
                    return std::future::pending().await;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Unable to install CTRL+C handler");
            return std::future::pending().await;
        }
        info!("Received CTRL+C, shutting down");
    }
}

/// Serve a provider on an ephemeral localhost port.
///
/// Prints the handshake line `BOSK_PROVIDER|<version>|<address>` to stdout
/// and runs until SIGTERM or SIGINT.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), Box<dyn std::error::Error>> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// Serve a provider on an ephemeral localhost port with custom options.
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    serve_on_listener(provider, listener, options, wait_for_shutdown_signal()).await
}

/// Serve a provider on a specific address.
pub async fn serve_on<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    serve_on_with_options(provider, addr, ServeOptions::default()).await
}

/// Serve a provider on a specific address with custom options.
pub async fn serve_on_with_options<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    serve_on_listener(provider, listener, options, wait_for_shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` completes.
pub async fn serve_on_listener<P, F>(
    provider: P,
    listener: TcpListener,
    options: ServeOptions,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    P: ProviderService,
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    println!("{}", handshake_line(addr));
    info!(address = %addr, "Provider server starting");

    let provider = Arc::new(provider);
    let service = proto::provider_server::ProviderServer::new(ProviderGrpcService::from_arc(
        Arc::clone(&provider),
    ));

    // Fires once the shutdown signal has been seen, so the drain timeout only
    // starts counting from that point.
    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let server = Server::builder()
        .add_service(service)
        .serve_with_incoming_shutdown(
            tokio_stream::wrappers::TcpListenerStream::new(listener),
            async move {
                shutdown.await;
                let _ = signalled_tx.send(());
            },
        );
    tokio::pin!(server);

    let result = tokio::select! {
        biased;
        result = &mut server => result,
        _ = signalled_rx => {
            match tokio::time::timeout(options.shutdown_timeout, &mut server).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout = ?options.shutdown_timeout, "Shutdown timeout exceeded, dropping in-flight requests");
                    Ok(())
                }
            }
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(ProviderError::from(e).into());
    }

    debug!("Calling provider stop()");
    if let Err(e) = provider.stop().await {
        warn!(error = %e, "Provider stop() returned error");
    }

    info!("Provider shutdown complete");
    Ok(())
}

/// The line printed to stdout once the server is listening.
pub fn handshake_line(addr: SocketAddr) -> String {
    format!("{}|{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION, addr)
}
