use std::fmt;

use thiserror::Error;

/// Failure of a single gateway call, before it is mapped onto what the UI sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The credential was missing, expired or refused (401/403).
    #[error("not authorized")]
    Unauthorized,

    /// Network failure, timeout or 5xx.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// Any other non-success status.
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The response body could not be decoded into the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl GatewayError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

#[derive(uniffi::Enum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagingErrorKind {
    AuthRequired,
    GatewayUnavailable,
    ValidationFailed,
    SendFailed,
}

#[derive(uniffi::Record, Debug, Clone, PartialEq, Eq)]
pub struct MessagingError {
    pub kind: MessagingErrorKind,
    pub message: String,
}

impl MessagingError {
    pub fn new(kind: MessagingErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth_required(message: impl Into<String>) -> Self {
        Self::new(MessagingErrorKind::AuthRequired, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(MessagingErrorKind::ValidationFailed, message)
    }

    /// Maps a failed read (list, create/find, timeline, mark-read, search).
    pub fn from_gateway(err: &GatewayError) -> Self {
        match err {
            GatewayError::Unauthorized => Self::auth_required("session expired, sign in again"),
            other => Self::new(MessagingErrorKind::GatewayUnavailable, other.to_string()),
        }
    }

    /// Maps a failed send. Unauthorized still reports `AuthRequired`.
    pub fn from_send(err: &GatewayError) -> Self {
        match err {
            GatewayError::Unauthorized => Self::from_gateway(err),
            other => Self::new(MessagingErrorKind::SendFailed, other.to_string()),
        }
    }

    pub fn user_visible_message(&self) -> String {
        match self.kind {
            MessagingErrorKind::AuthRequired => "Please sign in to use messages".to_string(),
            MessagingErrorKind::GatewayUnavailable => {
                "Messages are unavailable right now, try again".to_string()
            }
            MessagingErrorKind::ValidationFailed => self.message.clone(),
            MessagingErrorKind::SendFailed => "Message not sent, try again".to_string(),
        }
    }
}

impl fmt::Display for MessagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.message.fmt(f)
    }
}

impl std::error::Error for MessagingError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_display() {
        assert_eq!(GatewayError::Unauthorized.to_string(), "not authorized");
        assert_eq!(
            GatewayError::Unavailable("connection refused".into()).to_string(),
            "gateway unavailable: connection refused"
        );
        assert_eq!(
            GatewayError::Rejected {
                status: 400,
                message: "bad id".into()
            }
            .to_string(),
            "request rejected (400): bad id"
        );
    }

    #[test]
    fn read_failures_map_to_gateway_unavailable() {
        let err = MessagingError::from_gateway(&GatewayError::Rejected {
            status: 404,
            message: "no such conversation".into(),
        });
        assert_eq!(err.kind, MessagingErrorKind::GatewayUnavailable);
        assert!(err.message.contains("404"));

        let err = MessagingError::from_gateway(&GatewayError::Unauthorized);
        assert_eq!(err.kind, MessagingErrorKind::AuthRequired);
    }

    #[test]
    fn send_failures_map_to_send_failed_except_auth() {
        let err = MessagingError::from_send(&GatewayError::Unavailable("timeout".into()));
        assert_eq!(err.kind, MessagingErrorKind::SendFailed);

        let err = MessagingError::from_send(&GatewayError::Unauthorized);
        assert_eq!(err.kind, MessagingErrorKind::AuthRequired);
    }
}
