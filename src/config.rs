//! Provider configuration.
//!
//! The provider block carries the bosk endpoint and optional Basic-auth
//! credentials:
//!
//! ```hcl
//! provider "bosk" {
//!   url_prefix = "http://localhost:1740/bosk/nodes/"
//!   username   = "admin"
//!   password   = var.bosk_password
//! }
//! ```

use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::{BoskClient, Credentials};
use crate::diagnostics::Diagnostic;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// The provider block's schema.
pub fn provider_schema() -> Schema {
    Schema::v0()
        .with_description("Manages nodes of a bosk state tree over its REST interface.")
        .with_attribute(
            "url_prefix",
            Attribute::required_string().with_description(
                "Base URL of the bosk REST interface. Node ids are appended to it verbatim.",
            ),
        )
        .with_attribute(
            "username",
            Attribute::optional_string()
                .with_description("User name for HTTP Basic authentication."),
        )
        .with_attribute(
            "password",
            Attribute::optional_string()
                .sensitive()
                .with_description("Password for HTTP Basic authentication."),
        )
}

/// The decoded provider block.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    /// Base URL node ids are appended to.
    pub url_prefix: String,
    /// Basic-auth user name.
    #[serde(default)]
    pub username: Option<String>,
    /// Basic-auth password.
    #[serde(default)]
    pub password: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("url_prefix", &self.url_prefix)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ProviderConfig {
    /// Decode the provider block.
    pub fn from_value(config: Value) -> Result<Self, ProviderError> {
        let config = if config.is_null() { json!({}) } else { config };
        serde_json::from_value(config).map_err(ProviderError::from)
    }

    /// Semantic checks beyond the schema.
    ///
    /// Errors mean the provider cannot be configured; warnings are passed on
    /// to the user.
    pub fn check(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        match reqwest::Url::parse(&self.url_prefix) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                if !self.url_prefix.ends_with('/') {
                    diagnostics.push(
                        Diagnostic::warning("url_prefix does not end with '/'")
                            .with_detail(format!(
                                "Node ids are appended verbatim, so the node 'example-id' would live at {}example-id",
                                self.url_prefix
                            ))
                            .with_attribute("url_prefix"),
                    );
                }
            }
            Ok(url) => diagnostics.push(
                Diagnostic::error("Invalid url_prefix")
                    .with_detail(format!(
                        "Unsupported scheme '{}', expected http or https",
                        url.scheme()
                    ))
                    .with_attribute("url_prefix"),
            ),
            Err(err) => diagnostics.push(
                Diagnostic::error("Invalid url_prefix")
                    .with_detail(format!("'{}' is not an absolute URL: {}", self.url_prefix, err))
                    .with_attribute("url_prefix"),
            ),
        }

        if self.username.is_some() != self.password.is_some() {
            let missing = if self.username.is_some() {
                "password"
            } else {
                "username"
            };
            diagnostics.push(
                Diagnostic::error("Incomplete credentials")
                    .with_detail("username and password must be set together")
                    .with_attribute(missing),
            );
        }

        diagnostics
    }

    /// The credentials to attach to each request.
    pub fn credentials(&self) -> Result<Credentials, ProviderError> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Ok(Credentials::basic(username, password)),
            (None, None) => Ok(Credentials::None),
            _ => Err(ProviderError::Configuration(
                "username and password must be set together".to_string(),
            )),
        }
    }

    /// Build the client for this configuration.
    pub fn build_client(&self) -> Result<BoskClient, ProviderError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| {
                ProviderError::Configuration(format!("Unable to create HTTP client: {}", err))
            })?;
        Ok(BoskClient::new(http, self.url_prefix.clone(), self.credentials()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::has_errors;
    use crate::validation::validate;

    #[test]
    fn test_schema_matches_config() {
        let schema = provider_schema();
        let config = json!({
            "url_prefix": "http://localhost:1740/nodes/",
            "username": "admin",
            "password": "secret"
        });
        assert!(validate(&schema, &config).is_empty());
        assert!(schema.attributes["password"].flags.sensitive);
        assert!(schema.attributes["url_prefix"].flags.required);
    }

    #[test]
    fn test_from_value() {
        let config = ProviderConfig::from_value(json!({
            "url_prefix": "http://localhost/",
            "username": null,
            "password": null
        }))
        .unwrap();
        assert_eq!(config.url_prefix, "http://localhost/");
        assert!(config.username.is_none());
        assert_eq!(config.credentials().unwrap(), Credentials::None);

        assert!(ProviderConfig::from_value(Value::Null).is_err());
    }

    #[test]
    fn test_check_accepts_well_formed_prefix() {
        let config = ProviderConfig::from_value(json!({"url_prefix": "https://bosk/nodes/"})).unwrap();
        assert!(config.check().is_empty());
    }

    #[test]
    fn test_check_warns_on_missing_trailing_slash() {
        let config = ProviderConfig::from_value(json!({"url_prefix": "https://bosk/nodes"})).unwrap();
        let diagnostics = config.check();
        assert_eq!(diagnostics.len(), 1);
        assert!(!has_errors(&diagnostics));
        assert_eq!(diagnostics[0].attribute, Some("url_prefix".to_string()));
    }

    #[test]
    fn test_check_rejects_bad_prefix() {
        let relative = ProviderConfig::from_value(json!({"url_prefix": "nodes/"})).unwrap();
        assert!(has_errors(&relative.check()));

        let ftp = ProviderConfig::from_value(json!({"url_prefix": "ftp://bosk/"})).unwrap();
        assert!(has_errors(&ftp.check()));
    }

    #[test]
    fn test_partial_credentials() {
        let config = ProviderConfig::from_value(json!({
            "url_prefix": "http://localhost/",
            "username": "admin"
        }))
        .unwrap();

        let diagnostics = config.check();
        assert!(has_errors(&diagnostics));
        assert_eq!(diagnostics[0].attribute, Some("password".to_string()));
        assert!(matches!(
            config.credentials(),
            Err(ProviderError::Configuration(_))
        ));
    }

    #[test]
    fn test_build_client_with_credentials() {
        let config = ProviderConfig::from_value(json!({
            "url_prefix": "http://localhost/",
            "username": "admin",
            "password": "secret"
        }))
        .unwrap();

        let client = config.build_client().unwrap();
        assert_eq!(client.url_prefix(), "http://localhost/");
        assert_eq!(client.credentials(), &Credentials::basic("admin", "secret"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ProviderConfig::from_value(json!({
            "url_prefix": "http://localhost/",
            "username": "admin",
            "password": "secret"
        }))
        .unwrap();
        assert!(!format!("{:?}", config).contains("secret"));
    }
}
