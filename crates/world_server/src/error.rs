//! Error types and handling for the world server.

use crate::security::SecurityError;
use tracing::error;
use world_core::{DiceError, GateError, RoomError};

/// Enumeration of possible server errors.
///
/// Network and internal errors end the connection handler. Request errors are
/// reported back to the client as an `error` envelope and the connection
/// stays open.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Network-related errors such as binding failures or connection issues
    #[error("Network error: {0}")]
    Network(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// A client request that could not be served
    #[error("request failed with status {status}")]
    Request { status: u16, message: Option<String> },
}

impl ServerError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Request {
            status: 400,
            message: Some(message.into()),
        }
    }

    pub fn unauthorized() -> Self {
        Self::Request {
            status: 401,
            message: Some("Unauthorized".to_string()),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::Request {
            status: 404,
            message: Some(message.into()),
        }
    }

    /// HTTP-style status for the client.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::Request { status, .. } => *status,
            ServerError::Network(_) => 400,
            ServerError::Internal(_) => 500,
        }
    }
}

impl From<GateError> for ServerError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Store(store_error) => {
                error!("💥 Membership store failure: {}", store_error);
                Self::Internal(store_error.to_string())
            }
            denied => Self::Request {
                status: denied.status_code(),
                message: denied.body(),
            },
        }
    }
}

impl From<RoomError> for ServerError {
    fn from(err: RoomError) -> Self {
        Self::Request {
            status: err.status_code(),
            message: Some(err.to_string()),
        }
    }
}

impl From<DiceError> for ServerError {
    fn from(err: DiceError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<SecurityError> for ServerError {
    fn from(err: SecurityError) -> Self {
        Self::Request {
            status: err.status_code(),
            message: Some(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::ServerMessage;
    use serde_json::json;
    use world_core::{DiscordId, StoreError, WorldId};

    #[test]
    fn gate_denial_keeps_an_empty_body() {
        let err = ServerError::from(GateError::AccessDenied);
        assert_eq!(err.status_code(), 403);
        assert!(matches!(err, ServerError::Request { message: None, .. }));
    }

    #[test]
    fn store_failures_surface_as_a_generic_500() {
        let conflict = StoreError::Conflict {
            world: WorldId::new(),
            user: DiscordId::new("1001"),
        };
        for store_error in [StoreError::Unavailable("connection reset".into()), conflict] {
            let err = ServerError::from(GateError::Store(store_error));
            assert_eq!(err.status_code(), 500);
            assert!(matches!(err, ServerError::Internal(_)));

            let envelope = ServerMessage::error("session:join", &err);
            assert_eq!(
                envelope.data,
                json!({"status": 500, "message": "Internal Server Error"})
            );
        }
    }
}
