//! Diagnostics reported back to the host.
//!
//! Operations never print problems directly. They return diagnostics next to
//! their result so that one call can surface several independent issues, e.g.
//! a warning about an undecodable response body alongside a usable state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// The operation failed.
    Error,
    /// The operation went through, but the user should look at something.
    Warning,
}

/// A single problem report: severity, one-line summary, optional detail and
/// the attribute it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Attribute name, e.g. `url_prefix`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn with_severity(severity: DiagnosticSeverity, summary: String) -> Self {
        Self {
            severity,
            summary,
            detail: None,
            attribute: None,
        }
    }

    pub fn error(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Error, summary.into())
    }

    pub fn warning(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Warning, summary.into())
    }

    pub fn with_detail(self, detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..self
        }
    }

    pub fn with_attribute(self, attribute: impl Into<String>) -> Self {
        Self {
            attribute: Some(attribute.into()),
            ..self
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.severity, DiagnosticSeverity::Error)
    }
}

/// Whether any of `diagnostics` is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_fills_every_field() {
        let diagnostic = Diagnostic::error("Invalid url_prefix")
            .with_detail("The value must be an absolute URL")
            .with_attribute("url_prefix");

        assert!(diagnostic.is_error());
        assert_eq!(diagnostic.summary, "Invalid url_prefix");
        assert_eq!(
            diagnostic.detail.as_deref(),
            Some("The value must be an absolute URL")
        );
        assert_eq!(diagnostic.attribute.as_deref(), Some("url_prefix"));
    }

    #[test]
    fn test_has_errors() {
        assert!(!has_errors(&[]));
        assert!(!has_errors(&[Diagnostic::warning("heads up")]));
        assert!(has_errors(&[
            Diagnostic::warning("heads up"),
            Diagnostic::error("broken"),
        ]));
    }

    #[test]
    fn test_serialized_shape() {
        let warning = Diagnostic::warning("Response body is not recognized as UTF-8");
        let value = serde_json::to_value(&warning).unwrap();
        assert_eq!(value["severity"], "warning");
        assert!(value.get("detail").is_none());
        assert!(value.get("attribute").is_none());
    }
}
