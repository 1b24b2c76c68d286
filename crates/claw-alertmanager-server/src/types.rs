//! Wire types of the v1 HTTP API.

use serde::{Deserialize, Serialize};

/// Outcome field of every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// The request succeeded.
    Success,
    /// The request failed.
    Error,
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// `success` or `error`.
    pub status: ResponseStatus,
    /// Payload of a successful request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// `bad_data`, `not_found` or `server_error`.
    #[serde(rename = "errorType", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    /// A success envelope carrying `data`.
    pub const fn success(data: T) -> Self {
        Self {
            status: ResponseStatus::Success,
            data: Some(data),
            error_type: None,
            error: None,
        }
    }

    /// A success envelope without payload.
    pub const fn empty() -> Self {
        Self {
            status: ResponseStatus::Success,
            data: None,
            error_type: None,
            error: None,
        }
    }
}

impl Envelope<()> {
    /// An error envelope.
    pub fn error(error_type: &str, message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            data: None,
            error_type: Some(error_type.to_string()),
            error: Some(message.into()),
        }
    }
}

/// Body of `DELETE /receivers/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReceiverRequest {
    /// Name of the receiver to delete.
    pub name: String,
}

/// Payload of `POST /silences`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilenceCreated {
    /// ID of the created or updated silence.
    #[serde(rename = "silenceId")]
    pub silence_id: String,
}

/// Query parameters of `GET /alerts`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertQuery {
    /// Matcher expression, e.g. `{alertname="X"}`.
    pub filter: Option<String>,
    /// Receiver name pattern.
    pub receiver: Option<String>,
    /// Include active alerts.
    pub active: Option<String>,
    /// Include silenced alerts.
    pub silenced: Option<String>,
    /// Include inhibited alerts.
    pub inhibited: Option<String>,
    /// Include unprocessed alerts.
    pub unprocessed: Option<String>,
}

/// Query parameters of `GET /silences`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SilenceQuery {
    /// Matcher expression applied to silence matchers.
    pub filter: Option<String>,
}
