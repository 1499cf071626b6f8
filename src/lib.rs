//! Bosk provider
//!
//! A provider plugin that manages `object_node` resources stored in a bosk
//! state tree through its REST interface. Each node is a JSON document living
//! at `url_prefix + id`.
//!
//! # Overview
//!
//! - **REST client** ([`client`]): GET/PUT/DELETE with optional HTTP Basic
//!   authentication, 2xx status checking, UTF-8 checking and JSON
//!   normalization. Failures are typed [`ClientError`]s; non-fatal problems
//!   come back as warnings.
//! - **Provider** ([`BoskProvider`]): implements [`ProviderService`], the
//!   interface a host drives: configure, plan, create, read, update, delete
//!   and import.
//! - **Schema and validation** ([`schema`], [`validation`]): attribute
//!   declarations with defaults and force-new markers.
//! - **Host protocol** (`server`, feature `grpc`): a tonic gRPC server with a
//!   one-line stdout handshake.
//! - **Testing** ([`testing`]): an in-process harness for lifecycle tests.
//!
//! # Quick Start
//!
//! ```ignore
//! use terraform_provider_bosk::{init_logging, serve, BoskProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     serve(BoskProvider::new()).await
//! }
//! ```
//!
//! # Handshake Protocol
//!
//! When started via `serve`, the plugin prints one line to stdout:
//!
//! ```text
//! BOSK_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `BOSK_PROVIDER|<protocol_version>|<address>`

#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod logging;
pub mod object_node;
pub mod provider;
pub mod schema;
#[cfg(feature = "grpc")]
pub mod server;
pub mod service;
pub mod testing;
pub mod types;
pub mod validation;

pub use client::{normalize_json, BoskClient, ClientError, Credentials, Fetched};
pub use diagnostics::{Diagnostic, DiagnosticSeverity};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::BoskProvider;
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{AttributeChange, ImportedResource, Outcome, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

#[cfg(feature = "grpc")]
pub use server::{
    serve, serve_on, serve_on_with_options, serve_with_options, ServeOptions, HANDSHAKE_PREFIX,
    PROTOCOL_VERSION,
};

// Provider implementations need these without adding the crates themselves.
pub use async_trait::async_trait;
pub use serde_json;
pub use tracing;
