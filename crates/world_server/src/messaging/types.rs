//! Message type definitions for client-server communication.
//!
//! Both directions use the same `{namespace, event, data}` envelope. Errors
//! travel in the `error` namespace with the failed request as the event name.

use crate::error::ServerError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message sent from a client to the server.
///
/// # Examples
///
/// Joining a world:
/// ```json
/// {
///   "namespace": "session",
///   "event": "join",
///   "data": {
///     "discordId": "80351110224678912",
///     "name": "Ash",
///     "worldId": "6f1c1f2e-8f0e-4e57-9d8b-3f1d2b7a9c10"
///   }
/// }
/// ```
///
/// Rolling dice:
/// ```json
/// {
///   "namespace": "dice",
///   "event": "roll",
///   "data": { "count": 3, "intent": "Kael: Notice" }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    /// Area of the application the message belongs to
    pub namespace: String,

    /// The specific event type within the namespace
    pub event: String,

    /// The message payload as a JSON value
    #[serde(default)]
    pub data: Value,
}

impl ClientMessage {
    /// `namespace:event`, as used in logs and error envelopes.
    pub fn route(&self) -> String {
        format!("{}:{}", self.namespace, self.event)
    }
}

/// A message sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub namespace: String,
    pub event: String,
    pub data: Value,
}

impl ServerMessage {
    pub fn new(namespace: &str, event: &str, data: Value) -> Self {
        Self {
            namespace: namespace.to_string(),
            event: event.to_string(),
            data,
        }
    }

    /// Error envelope for a failed request.
    ///
    /// The message is omitted when the error has no body, which is how a
    /// gate denial is reported.
    pub fn error(route: &str, err: &ServerError) -> Self {
        let message = match err {
            ServerError::Request { message, .. } => message.clone(),
            ServerError::Internal(_) => Some("Internal Server Error".to_string()),
            ServerError::Network(e) => Some(e.clone()),
        };
        let body = ErrorBody {
            status: err.status_code(),
            message,
        };
        Self::new("error", route, serde_json::to_value(body).unwrap_or(Value::Null))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ServerError> {
        serde_json::to_vec(self).map_err(|e| ServerError::Internal(e.to_string()))
    }
}

/// Payload of an `error` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use world_core::GateError;

    #[test]
    fn missing_data_defaults_to_null() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"namespace": "clocks", "event": "add"}"#).unwrap();
        assert_eq!(msg.route(), "clocks:add");
        assert!(msg.data.is_null());
    }

    #[test]
    fn denial_envelope_has_no_message() {
        let err = ServerError::from(GateError::AccessDenied);
        let envelope = ServerMessage::error("session:join", &err);
        assert_eq!(envelope.namespace, "error");
        assert_eq!(envelope.event, "session:join");
        assert_eq!(envelope.data, json!({"status": 403}));
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = ServerError::Internal("lock poisoned at store.rs".to_string());
        let envelope = ServerMessage::error("dice:roll", &err);
        assert_eq!(
            envelope.data,
            json!({"status": 500, "message": "Internal Server Error"})
        );
    }
}
