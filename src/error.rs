//! The provider's error type.
//!
//! Every failed operation yields exactly one [`ProviderError`], which the
//! host sees as a single error diagnostic.

use thiserror::Error;

use crate::client::ClientError;
use crate::diagnostics::Diagnostic;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// No such object exists remotely.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Configuration or state was rejected before any remote call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider block is missing, invalid, or was never applied.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// State or configuration did not fit the expected JSON shape.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A call to the bosk service failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The gRPC server could not bind or failed while serving.
    #[cfg(feature = "grpc")]
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Unimplemented: {0}")]
    Unimplemented(String),
}

impl ProviderError {
    /// Convert this error into the single error diagnostic reported to the host.
    ///
    /// Client errors keep their own summary and detail so the host sees the
    /// same message whether the failure came from a read or an import.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Client(err) => err.to_diagnostic(),
            other => Diagnostic::error(other.to_string()),
        }
    }
}

#[cfg(feature = "grpc")]
impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        use tonic::Status;

        let message = err.to_string();
        match err {
            ProviderError::NotFound(_) | ProviderError::UnknownResource(_) => {
                Status::not_found(message)
            }
            ProviderError::Validation(_) | ProviderError::Serialization(_) => {
                Status::invalid_argument(message)
            }
            ProviderError::Configuration(_) => Status::failed_precondition(message),
            ProviderError::Client(_) | ProviderError::Transport(_) => Status::unavailable(message),
            ProviderError::Unimplemented(_) => Status::unimplemented(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::{Method, StatusCode};

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("object node example-id".to_string());
        assert_eq!(format!("{}", err), "Resource not found: object node example-id");

        let err = ProviderError::Configuration("url_prefix is required".to_string());
        assert_eq!(
            format!("{}", err),
            "Configuration error: url_prefix is required"
        );

        let err = ProviderError::UnknownResource("bosk_widget".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: bosk_widget");
    }

    #[test]
    fn test_client_error_is_transparent() {
        let err: ProviderError = ClientError::Status {
            method: Method::DELETE,
            url: "http://bosk/nodes/a".to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
        .into();

        assert_eq!(
            err.to_string(),
            "DELETE http://bosk/nodes/a returned unexpected status 500 Internal Server Error"
        );

        let diagnostic = err.to_diagnostic();
        assert_eq!(diagnostic.summary, "Client Error");
        assert!(diagnostic.is_error());
    }

    #[test]
    fn test_serialization_error_diagnostic() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ProviderError::from(json_err);
        let diagnostic = err.to_diagnostic();
        assert!(diagnostic.summary.starts_with("Serialization error"));
        assert!(diagnostic.detail.is_none());
    }

    #[cfg(feature = "grpc")]
    #[test]
    fn test_status_codes() {
        let cases = [
            (ProviderError::NotFound("a".into()), tonic::Code::NotFound),
            (ProviderError::UnknownResource("b".into()), tonic::Code::NotFound),
            (ProviderError::Validation("c".into()), tonic::Code::InvalidArgument),
            (
                ProviderError::Configuration("d".into()),
                tonic::Code::FailedPrecondition,
            ),
            (ProviderError::Unimplemented("e".into()), tonic::Code::Unimplemented),
        ];
        for (err, code) in cases {
            let status = tonic::Status::from(err);
            assert_eq!(status.code(), code);
        }

        let status = tonic::Status::from(ProviderError::Validation("bad id".into()));
        assert_eq!(status.message(), "Validation error: bad id");
    }
}
