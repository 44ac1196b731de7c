//! Persistence endpoint plumbing.
//!
//! The endpoint answers every request with a JSON object whose `success`
//! member is truthy on success. For a create, a truthy `success` that is a
//! number or string is the identifier assigned to the new row.
//!
//! The transport is abstracted by [`PersistenceClient`]: [`HttpClient`]
//! talks to a real server, [`RecordingClient`] replays scripted outcomes.

pub mod http;
pub mod recording;

pub use http::HttpClient;
pub use recording::RecordingClient;

use serde_json::Value;

use crate::error::ErrorCode;
use crate::intent::PersistRequest;
use crate::model::TaskId;

/// Abstraction over the wire to the persistence endpoint.
pub trait PersistenceClient {
    /// Submit one request and wait for its response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no decodable response arrived.
    fn submit(&mut self, request: &PersistRequest) -> Result<PersistResponse, TransportError>;
}

/// Errors below the application protocol: the request never produced a
/// usable response object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("{url} answered HTTP {status}")]
    Status { status: u16, url: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl TransportError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Status { .. } => ErrorCode::ServerRejected,
            Self::Transport(_) => ErrorCode::EndpointUnreachable,
            Self::Decode(_) => ErrorCode::MalformedResponse,
        }
    }
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => Self::Status {
                status,
                url: response.get_url().to_string(),
            },
            ureq::Error::Transport(transport) => Self::Transport(transport.to_string()),
        }
    }
}

/// A decoded response object.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistResponse {
    body: Value,
}

impl PersistResponse {
    /// Wrap a decoded body.
    ///
    /// # Errors
    ///
    /// [`TransportError::Decode`] when the body is not a JSON object.
    pub fn from_value(body: Value) -> Result<Self, TransportError> {
        if body.is_object() {
            Ok(Self { body })
        } else {
            Err(TransportError::Decode(format!("expected a JSON object, got {body}")))
        }
    }

    /// `{"success": true}`
    #[must_use]
    pub fn ok() -> Self {
        Self {
            body: serde_json::json!({ "success": true }),
        }
    }

    /// `{"success": <id>}` as returned for a confirmed create.
    #[must_use]
    pub fn with_id(id: u64) -> Self {
        Self {
            body: serde_json::json!({ "success": id }),
        }
    }

    /// `{"success": false, "error": <reason>}`
    #[must_use]
    pub fn failure(reason: &str) -> Self {
        Self {
            body: serde_json::json!({ "success": false, "error": reason }),
        }
    }

    #[must_use]
    pub const fn body(&self) -> &Value {
        &self.body
    }

    /// Whether `success` is present and truthy.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.body.get("success").is_some_and(is_truthy)
    }

    /// Identifier assigned by a create, when `success` carries one.
    #[must_use]
    pub fn assigned_id(&self) -> Option<TaskId> {
        match self.body.get("success")? {
            Value::Number(n) if n.as_f64().is_some_and(|x| x != 0.0) => {
                Some(TaskId::persistent(number_text(n)))
            }
            Value::String(s) if !s.trim().is_empty() => Some(TaskId::persistent(s.trim())),
            _ => None,
        }
    }

    /// Failure detail for logs.
    #[must_use]
    pub fn reason(&self) -> String {
        self.body
            .get("error")
            .or_else(|| self.body.get("fail"))
            .map_or_else(|| self.body.to_string(), ToString::to_string)
    }
}

/// Integer-valued numbers render without a fraction (`42.0` becomes `42`).
fn number_text(n: &serde_json::Number) -> String {
    if let Some(int) = n.as_u64() {
        return int.to_string();
    }
    if let Some(int) = n.as_i64() {
        return int.to_string();
    }
    match n.as_f64() {
        Some(x) if x.fract() == 0.0 && x.abs() < 1e15 => format!("{x:.0}"),
        _ => n.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|x| x != 0.0 && !x.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
