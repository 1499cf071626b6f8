//! REST client for the bosk service.
//!
//! [`BoskClient`] performs the three verbs the provider needs (GET, PUT and
//! DELETE) against `url_prefix + id` style URLs. Failures come back as a
//! [`ClientError`], which converts into exactly one error [`Diagnostic`].
//! Non-fatal problems with a fetched body (invalid UTF-8, a body that is not
//! JSON) are returned as warnings inside [`Fetched`].
//!
//! # Example
//!
//! ```ignore
//! use terraform_provider_bosk::client::{BoskClient, Credentials};
//!
//! let client = BoskClient::new(
//!     reqwest::Client::new(),
//!     "https://bosk.example.com/nodes/",
//!     Credentials::basic("admin", "secret"),
//! );
//! let fetched = client.fetch_as_string(&client.node_url("example-id")).await?;
//! println!("{}", fetched.text);
//! ```

use std::borrow::Cow;
use std::fmt;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use crate::diagnostics::Diagnostic;

/// Credentials attached to every request a client sends.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Credentials {
    /// Requests are sent without an `Authorization` header.
    #[default]
    None,
    /// HTTP Basic authentication.
    Basic {
        /// The user name.
        username: String,
        /// The password.
        password: String,
    },
}

impl Credentials {
    /// Basic authentication credentials.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Whether requests will carry an `Authorization` header.
    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Basic { .. })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Errors returned by [`BoskClient`] operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be built (malformed URL or method).
    #[error("Unable to create HTTP {method} request: {source}")]
    Request {
        /// The HTTP method of the request.
        method: Method,
        /// The underlying builder error.
        source: reqwest::Error,
    },

    /// The request could not be delivered or no response was received.
    #[error("Unable to {method} {url}: {source}")]
    Transport {
        /// The HTTP method of the request.
        method: Method,
        /// The request URL.
        url: String,
        /// The underlying transport error.
        source: reqwest::Error,
    },

    /// The server answered with a status outside the 2xx class.
    #[error("{method} {url} returned unexpected status {status}")]
    Status {
        /// The HTTP method of the request.
        method: Method,
        /// The request URL.
        url: String,
        /// The response status.
        status: StatusCode,
    },

    /// The response body could not be read.
    #[error("Error reading response body: {0}")]
    Body(#[source] reqwest::Error),
}

impl ClientError {
    /// The response status, when the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server reported that the addressed node does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Convert this error into the single diagnostic reported to the host.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let summary = match self {
            Self::Body(_) => "Error reading response body",
            _ => "Client Error",
        };
        Diagnostic::error(summary).with_detail(self.to_string())
    }
}

impl From<&ClientError> for Diagnostic {
    fn from(err: &ClientError) -> Self {
        err.to_diagnostic()
    }
}

/// A successfully fetched body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// The normalized JSON text, or the raw body when normalization failed.
    pub text: String,
    /// Non-fatal problems found while decoding the body.
    pub warnings: Vec<Diagnostic>,
}

/// Client for a bosk REST endpoint.
///
/// Configuration is fixed at construction; the client is cheap to clone and
/// can be shared between concurrent operations.
#[derive(Debug, Clone)]
pub struct BoskClient {
    http: reqwest::Client,
    url_prefix: String,
    credentials: Credentials,
}

impl BoskClient {
    /// Create a client with the given transport, URL prefix and credentials.
    pub fn new(
        http: reqwest::Client,
        url_prefix: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            http,
            url_prefix: url_prefix.into(),
            credentials,
        }
    }

    /// Create a client that sends requests without authentication.
    pub fn without_auth(http: reqwest::Client, url_prefix: impl Into<String>) -> Self {
        Self::new(http, url_prefix, Credentials::None)
    }

    /// Create a client that authenticates every request with HTTP Basic auth.
    pub fn with_basic_auth(
        http: reqwest::Client,
        url_prefix: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(http, url_prefix, Credentials::basic(username, password))
    }

    /// The prefix node ids are appended to.
    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// The credentials attached to each request.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The URL of the node with the given id.
    ///
    /// The id is appended verbatim; the prefix is expected to carry any
    /// trailing separator.
    pub fn node_url(&self, id: &str) -> String {
        format!("{}{}", self.url_prefix, id)
    }

    /// GET `url` and return its body as normalized JSON text.
    ///
    /// Invalid UTF-8 is replaced with U+FFFD and reported as a warning; the
    /// replaced text is then normalized like any other body. A body that is
    /// not JSON comes back unchanged with a second warning.
    pub async fn fetch_as_string(&self, url: &str) -> Result<Fetched, ClientError> {
        let response = self.send(Method::GET, url, None).await?;
        let bytes = response.bytes().await.map_err(|err| {
            warn!(url, error = %err, "Failed to read response body");
            ClientError::Body(err)
        })?;

        let mut warnings = Vec::new();
        // Invalid sequences become U+FFFD and the text is still normalized.
        let text = String::from_utf8_lossy(&bytes);
        if matches!(text, Cow::Owned(_)) {
            warnings.push(
                Diagnostic::warning("Response body is not recognized as UTF-8").with_detail(
                    "The host may not properly handle the response body if the contents are binary.",
                ),
            );
        }

        match normalize_json(text.as_bytes()) {
            Ok(text) => Ok(Fetched { text, warnings }),
            Err(err) => {
                debug!(url, error = %err, "Response body is not JSON, returning it unchanged");
                warnings.push(
                    Diagnostic::warning("Error normalizing JSON response")
                        .with_detail(format!("Error reading response body: {}", err)),
                );
                Ok(Fetched {
                    text: text.into_owned(),
                    warnings,
                })
            }
        }
    }

    /// PUT `value` as the body of `url`.
    pub async fn put_as_string(&self, url: &str, value: &str) -> Result<(), ClientError> {
        self.send(Method::PUT, url, Some(value.to_owned()))
            .await
            .map(drop)
    }

    /// DELETE `url`.
    pub async fn delete(&self, url: &str) -> Result<(), ClientError> {
        self.send(Method::DELETE, url, None).await.map(drop)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.credentials {
            Credentials::None => builder,
            Credentials::Basic { username, password } => {
                builder.basic_auth(username, Some(password))
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<String>,
    ) -> Result<Response, ClientError> {
        let mut builder = self.request(method.clone(), url);
        if let Some(body) = body {
            builder = builder.header(CONTENT_TYPE, "application/json").body(body);
        }

        let request = builder.build().map_err(|source| {
            warn!(%method, url, error = %source, "Failed to build request");
            ClientError::Request {
                method: method.clone(),
                source,
            }
        })?;

        debug!(
            %method,
            url,
            authenticated = self.credentials.is_configured(),
            "Sending request"
        );

        let response = self.http.execute(request).await.map_err(|source| {
            warn!(%method, url, error = %source, "Request failed");
            ClientError::Transport {
                method: method.clone(),
                url: url.to_string(),
                source,
            }
        })?;

        let status = response.status();
        if status.as_u16() / 100 != 2 {
            warn!(%method, url, %status, "Unexpected response status");
            return Err(ClientError::Status {
                method,
                url: url.to_string(),
                status,
            });
        }

        debug!(%method, url, %status, "Request completed");
        Ok(response)
    }
}

/// Normalize JSON text by parsing it into an untyped value and serializing it
/// back compactly.
///
/// Object keys come out sorted and insignificant whitespace is dropped, so two
/// bodies that differ only in formatting normalize to the same text. Only
/// syntax is checked; no schema is enforced.
pub fn normalize_json(input: &[u8]) -> Result<String, serde_json::Error> {
    let parsed: serde_json::Value = serde_json::from_slice(input)?;
    serde_json::to_string(&parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_normalize_sorts_keys_and_strips_whitespace() {
        let normalized = normalize_json(br#"{ "b": [1, 2,  3], "a": {"y": null, "x": true} }"#)
            .unwrap();
        assert_eq!(normalized, r#"{"a":{"x":true,"y":null},"b":[1,2,3]}"#);
    }

    #[test]
    fn test_normalize_preserves_values() {
        let inputs: [&[u8]; 6] = [
            br#"{"name": "node", "count": 42, "ratio": 0.5, "tags": ["a", "b"]}"#,
            br#""just a string""#,
            b"12345678901234",
            b"-17",
            b"[]",
            br#"{"nested": {"deeper": {"unicode": "caf\u00e9 \ud83d\ude00"}}}"#,
        ];

        for input in inputs {
            let expected: Value = serde_json::from_slice(input).unwrap();
            let normalized = normalize_json(input).unwrap();
            let reparsed: Value = serde_json::from_str(&normalized).unwrap();
            assert_eq!(reparsed, expected, "input: {}", String::from_utf8_lossy(input));
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_json(br#"{"z": 1, "a": [ {"k": "v"} ], "m": null}"#).unwrap();
        let twice = normalize_json(once.as_bytes()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_rejects_malformed_input() {
        let inputs: [&[u8]; 5] = [b"", b"{", b"not json", br#"{"a": 1,}"#, b"ERROR"];
        for input in inputs {
            assert!(
                normalize_json(input).is_err(),
                "expected failure for {:?}",
                String::from_utf8_lossy(input)
            );
        }
    }

    #[test]
    fn test_normalize_edge_cases() {
        let deep = format!("{}{}", "[".repeat(100), "]".repeat(100));
        let cases: [(&[u8], &str); 4] = [
            (deep.as_bytes(), deep.as_str()),
            (
                br#"{"a\"b": 1, "\\": 2, "\u0000": 3}"#,
                r#"{"\u0000":3,"\\":2,"a\"b":1}"#,
            ),
            (b"-0", "-0.0"),
            (b"1e2", "100.0"),
        ];

        for (input, expected) in cases {
            let normalized = normalize_json(input).unwrap();
            assert_eq!(normalized, expected);
            assert_eq!(normalize_json(normalized.as_bytes()).unwrap(), normalized);
        }
    }

    #[test]
    fn test_normalize_rejects_out_of_range_and_too_deep() {
        assert!(normalize_json(b"1e400").is_err());
        assert!(normalize_json(b"-1e400").is_err());

        let too_deep = format!("{}{}", "[".repeat(200), "]".repeat(200));
        assert!(normalize_json(too_deep.as_bytes()).is_err());
    }

    #[test]
    fn test_normalize_rejects_invalid_utf8_strings() {
        assert!(normalize_json(b"\"\xff\xfe\"").is_err());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::basic("admin", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));

        let client = BoskClient::new(reqwest::Client::new(), "http://localhost/", creds);
        assert!(!format!("{:?}", client).contains("hunter2"));
    }

    #[test]
    fn test_credentials_default_is_none() {
        assert_eq!(Credentials::default(), Credentials::None);
        assert!(!Credentials::None.is_configured());
        assert!(Credentials::basic("u", "p").is_configured());
    }

    #[test]
    fn test_node_url_appends_id() {
        let client = BoskClient::without_auth(reqwest::Client::new(), "http://bosk:1740/nodes/");
        assert_eq!(client.node_url("example-id"), "http://bosk:1740/nodes/example-id");
        assert_eq!(client.url_prefix(), "http://bosk:1740/nodes/");
    }

    #[test]
    fn test_status_error_diagnostic() {
        let err = ClientError::Status {
            method: Method::GET,
            url: "http://bosk/nodes/a".to_string(),
            status: StatusCode::NOT_FOUND,
        };
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));

        let diagnostic = err.to_diagnostic();
        assert!(diagnostic.is_error());
        assert_eq!(diagnostic.summary, "Client Error");
        assert_eq!(
            diagnostic.detail.as_deref(),
            Some("GET http://bosk/nodes/a returned unexpected status 404 Not Found")
        );
    }
}
