//! Error types for the claw-alertmanager crate.

use std::fmt;

use thiserror::Error;

use crate::config::IntegrationKind;

/// Errors that can occur while routing, matching, or storing alerts.
#[derive(Debug, Error)]
pub enum AlertmanagerError {
    /// Malformed input or a failed validation.
    #[error("{reason}")]
    BadData {
        /// Why the input was rejected.
        reason: String,
    },

    /// A receiver with this name is already registered.
    #[error("notification config name {name} is not unique")]
    Conflict {
        /// The duplicated receiver name.
        name: String,
    },

    /// The referenced resource does not exist.
    #[error("no {kind} found with {what} {name}")]
    NotFound {
        /// Resource kind, e.g. `receiver` or `silence`.
        kind: &'static str,
        /// How the resource was addressed, e.g. `name` or `id`.
        what: &'static str,
        /// The unknown key.
        name: String,
    },

    /// A required integration field has neither a receiver nor a global value.
    #[error("no global {field} set for {kind} integration")]
    MissingConfig {
        /// The integration kind being resolved.
        kind: IntegrationKind,
        /// The unset field.
        field: &'static str,
    },

    /// A matcher could not be built or parsed.
    #[error("invalid matcher: {reason}")]
    InvalidMatcher {
        /// Why the matcher is invalid.
        reason: String,
    },

    /// One or more submitted alerts failed validation.
    #[error("{0}")]
    InvalidAlerts(MultiError),

    /// Building the integrations of a receiver failed.
    #[error("error in building receiver integration for receiver {receiver}: {errors}")]
    IntegrationBuild {
        /// The receiver being built.
        receiver: String,
        /// Every per-integration failure.
        errors: MultiError,
    },

    /// The storage collaborator failed.
    #[error("storage error: {reason}")]
    Storage {
        /// The failure reported by storage.
        reason: String,
    },

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// Unexpected internal failure.
    #[error("internal error: {reason}")]
    Internal {
        /// What went wrong.
        reason: String,
    },

    /// The configuration file is unreadable or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// The wire-level classification of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Client-correctable input problem (HTTP 400).
    BadData,
    /// Unknown receiver or silence (HTTP 404).
    NotFound,
    /// Failure not attributable to the caller (HTTP 500).
    Internal,
}

impl ErrorType {
    /// Returns the wire name of the error type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BadData => "bad_data",
            Self::NotFound => "not_found",
            Self::Internal => "server_error",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AlertmanagerError {
    /// Shorthand for a [`AlertmanagerError::BadData`] error.
    pub fn bad_data(reason: impl Into<String>) -> Self {
        Self::BadData {
            reason: reason.into(),
        }
    }

    /// Shorthand for an unknown receiver.
    pub fn receiver_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "receiver",
            what: "name",
            name: name.into(),
        }
    }

    /// Shorthand for an unknown silence.
    pub fn silence_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "silence",
            what: "id",
            name: id.into(),
        }
    }

    /// Classifies the error for the HTTP envelope.
    #[must_use]
    pub const fn error_type(&self) -> ErrorType {
        match self {
            Self::BadData { .. }
            | Self::Conflict { .. }
            | Self::MissingConfig { .. }
            | Self::InvalidMatcher { .. }
            | Self::InvalidAlerts(_)
            | Self::Config(_)
            | Self::Serialization(_) => ErrorType::BadData,
            Self::NotFound { .. } => ErrorType::NotFound,
            Self::IntegrationBuild { .. }
            | Self::Storage { .. }
            | Self::Cancelled
            | Self::Internal { .. } => ErrorType::Internal,
        }
    }
}

impl From<serde_json::Error> for AlertmanagerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AlertmanagerError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A collection of errors reported together instead of failing fast.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<AlertmanagerError>,
}

impl MultiError {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Appends an error.
    pub fn add(&mut self, err: AlertmanagerError) {
        self.errors.push(err);
    }

    /// Number of collected errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// True if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// The collected errors in insertion order.
    #[must_use]
    pub fn errors(&self) -> &[AlertmanagerError] {
        &self.errors
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

/// Result type for alertmanager operations.
pub type Result<T> = std::result::Result<T, AlertmanagerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_conflict() {
        let err = AlertmanagerError::Conflict {
            name: "r1".to_string(),
        };
        assert_eq!(err.to_string(), "notification config name r1 is not unique");
    }

    #[test]
    fn error_display_not_found() {
        let err = AlertmanagerError::receiver_not_found("team-x");
        assert_eq!(err.to_string(), "no receiver found with name team-x");

        let err = AlertmanagerError::silence_not_found("abc");
        assert_eq!(err.to_string(), "no silence found with id abc");
    }

    #[test]
    fn error_display_missing_config() {
        let err = AlertmanagerError::MissingConfig {
            kind: IntegrationKind::Email,
            field: "SMTP smarthost",
        };
        assert_eq!(err.to_string(), "no global SMTP smarthost set for email integration");
    }

    #[test]
    fn error_types() {
        assert_eq!(
            AlertmanagerError::bad_data("x").error_type(),
            ErrorType::BadData
        );
        assert_eq!(
            AlertmanagerError::Conflict { name: "r".into() }.error_type(),
            ErrorType::BadData
        );
        assert_eq!(
            AlertmanagerError::receiver_not_found("r").error_type(),
            ErrorType::NotFound
        );
        assert_eq!(AlertmanagerError::Cancelled.error_type(), ErrorType::Internal);
        assert_eq!(
            AlertmanagerError::IntegrationBuild {
                receiver: "r".into(),
                errors: MultiError::new(),
            }
            .error_type(),
            ErrorType::Internal
        );
    }

    #[test]
    fn error_type_wire_names() {
        assert_eq!(ErrorType::BadData.as_str(), "bad_data");
        assert_eq!(ErrorType::NotFound.as_str(), "not_found");
        assert_eq!(ErrorType::Internal.as_str(), "server_error");
    }

    #[test]
    fn multi_error_joins_messages() {
        let mut errs = MultiError::new();
        assert!(errs.is_empty());
        errs.add(AlertmanagerError::bad_data("first"));
        errs.add(AlertmanagerError::bad_data("second"));
        assert_eq!(errs.len(), 2);
        assert_eq!(errs.to_string(), "first; second");
    }

    #[test]
    fn error_from_serde_json() {
        let json_err = serde_json::from_str::<String>("invalid json").unwrap_err();
        let err: AlertmanagerError = json_err.into();
        assert!(matches!(err, AlertmanagerError::Serialization(_)));
        assert_eq!(err.error_type(), ErrorType::BadData);
    }
}
