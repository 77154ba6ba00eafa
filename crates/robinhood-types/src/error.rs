//! Error response bodies returned by the Robinhood Crypto API
//!
//! Non-2xx responses carry a body of the form
//! `{"type": "...", "errors": [{"attr": "...", "detail": "..."}]}`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single field-level error entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Offending request attribute, `None` for non-field errors
    #[serde(default)]
    pub attr: Option<String>,
    /// Human-readable explanation
    pub detail: String,
}

impl ErrorDetail {
    /// Create a new error detail
    pub fn new(attr: Option<&str>, detail: impl Into<String>) -> Self {
        Self {
            attr: attr.map(str::to_string),
            detail: detail.into(),
        }
    }
}

/// Wire shape of an error response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Error category, e.g. `validation_error`
    #[serde(rename = "type")]
    pub error_type: String,
    /// Field-level details (may be empty)
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

/// Structured API error: a decoded error body plus the HTTP status it came with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code
    pub status: u16,
    /// Error category, e.g. `validation_error`
    pub error_type: String,
    /// Field-level details
    pub errors: Vec<ErrorDetail>,
}

impl ApiError {
    /// Decode an error response body
    ///
    /// Returns `None` when the body is not JSON of the documented shape;
    /// callers fall back to the raw status and text in that case.
    pub fn parse(status: u16, body: &str) -> Option<Self> {
        let parsed: ApiErrorBody = serde_json::from_str(body).ok()?;
        Some(Self {
            status,
            error_type: parsed.error_type,
            errors: parsed.errors,
        })
    }

    /// Detail messages for a given attribute
    pub fn details_for<'a>(&'a self, attr: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.errors
            .iter()
            .filter(move |e| e.attr.as_deref() == Some(attr))
            .map(|e| e.detail.as_str())
    }

    /// Check if this is a field validation error
    pub fn is_validation(&self) -> bool {
        self.error_type == "validation_error"
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API error (status {}): {}", self.status, self.error_type)?;

        for (i, error) in self.errors.iter().enumerate() {
            f.write_str(if i == 0 { " - " } else { "; " })?;
            match error.attr.as_deref() {
                Some(attr) if !attr.is_empty() => write!(f, "{}: {}", attr, error.detail)?,
                _ => f.write_str(&error.detail)?,
            }
        }

        Ok(())
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16, error_type: &str, errors: Vec<ErrorDetail>) -> ApiError {
        ApiError {
            status,
            error_type: error_type.to_string(),
            errors,
        }
    }

    #[test]
    fn test_display_single_field() {
        let err = api_error(
            400,
            "validation_error",
            vec![ErrorDetail::new(Some("client_order_id"), "Must be a valid UUID.")],
        );
        assert_eq!(
            err.to_string(),
            "API error (status 400): validation_error - client_order_id: Must be a valid UUID."
        );
    }

    #[test]
    fn test_display_multiple_fields() {
        let err = api_error(
            400,
            "validation_error",
            vec![
                ErrorDetail::new(Some("symbol"), "Invalid symbol"),
                ErrorDetail::new(Some("quantity"), "Must be positive"),
            ],
        );
        assert_eq!(
            err.to_string(),
            "API error (status 400): validation_error - symbol: Invalid symbol; quantity: Must be positive"
        );
    }

    #[test]
    fn test_display_without_attr_or_details() {
        let err = api_error(401, "client_error", vec![ErrorDetail::new(None, "Unauthorized")]);
        assert_eq!(err.to_string(), "API error (status 401): client_error - Unauthorized");

        let err = api_error(500, "server_error", vec![]);
        assert_eq!(err.to_string(), "API error (status 500): server_error");
    }

    #[test]
    fn test_parse_validation_error() {
        let body = r#"{
            "type": "validation_error",
            "errors": [{"detail": "Must be a valid UUID.", "attr": "client_order_id"}]
        }"#;
        let err = ApiError::parse(400, body).unwrap();
        assert_eq!(err.status, 400);
        assert!(err.is_validation());
        assert_eq!(
            err.details_for("client_order_id").collect::<Vec<_>>(),
            vec!["Must be a valid UUID."]
        );
    }

    #[test]
    fn test_parse_null_attr_and_empty_errors() {
        let err = ApiError::parse(
            403,
            r#"{"type": "client_error", "errors": [{"detail": "Forbidden", "attr": null}]}"#,
        )
        .unwrap();
        assert_eq!(err.errors[0].attr, None);

        let err = ApiError::parse(503, r#"{"type": "server_error", "errors": []}"#).unwrap();
        assert!(err.errors.is_empty());
    }

    #[test]
    fn test_parse_rejects_other_bodies() {
        assert!(ApiError::parse(400, "{invalid json").is_none());
        assert!(ApiError::parse(500, "Internal Server Error").is_none());
        assert!(ApiError::parse(404, r#"{"detail": "Not found."}"#).is_none());
        assert!(ApiError::parse(404, "").is_none());
    }
}
