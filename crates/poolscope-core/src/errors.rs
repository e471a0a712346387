//! Error types for the ingest pipeline
//!
//! Failures are classified into the families the host contract exposes
//! (auth, network, broker, decode) plus plumbing variants for channel and
//! configuration problems. Errors cross the isolation boundary only as
//! [`ErrorDetail`] values carried by error events, never as panics.

use serde::{Deserialize, Serialize};
use std::fmt;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Connection-phase failures, split along the line the host cares about:
/// bad credentials versus an unreachable broker.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Credential rejected by broker: {reason}")]
    Auth { reason: String },
    #[error("Broker unreachable: {reason}")]
    Network { reason: String },
}

/// Stream and consumer administration failures, and failures of an
/// established consumption path.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Failed to list streams: {reason}")]
    ListStreams { reason: String },
    #[error("Failed to delete stream '{stream}': {reason}")]
    DeleteStream { stream: String, reason: String },
    #[error("Failed to create stream '{stream}': {reason}")]
    CreateStream { stream: String, reason: String },
    #[error("Failed to look up stream '{stream}': {reason}")]
    GetStream { stream: String, reason: String },
    #[error("Failed to set up consumer '{consumer}' on stream '{stream}': {reason}")]
    Consumer {
        stream: String,
        consumer: String,
        reason: String,
    },
    #[error("Failed to subscribe to '{subject}': {reason}")]
    Subscribe { subject: String, reason: String },
    #[error("Consumption failed on '{subject}': {reason}")]
    Consume { subject: String, reason: String },
}

/// Per-message decode failures. These never terminate a consumption loop;
/// each one surfaces as a single error event and the loop moves on.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Payload on '{subject}' is not valid UTF-8")]
    PayloadNotUtf8 { subject: String },
    #[error("Broker timestamp {nanos} on '{subject}' is out of range")]
    BadBrokerTimestamp { subject: String, nanos: i128 },
    #[error("Receipt metadata missing on '{subject}': {reason}")]
    MissingMetadata { subject: String, reason: String },
}

// ----------------------------------------------------------------------------
// Top-Level Error Type
// ----------------------------------------------------------------------------

/// Unified error type for the ingest pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Connect failed: {0}")]
    Connect(#[from] ConnectError),
    #[error("Broker operation failed: {0}")]
    Broker(#[from] BrokerError),
    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("Channel error: {message}")]
    Channel { message: String },
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Convenience constructor for channel errors
    pub fn channel<T: Into<String>>(message: T) -> Self {
        PipelineError::Channel {
            message: message.into(),
        }
    }

    /// Convenience constructor for configuration errors
    pub fn configuration<T: Into<String>>(reason: T) -> Self {
        PipelineError::Configuration {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for auth failures at connect time
    pub fn auth<T: Into<String>>(reason: T) -> Self {
        PipelineError::Connect(ConnectError::Auth {
            reason: reason.into(),
        })
    }

    /// Convenience constructor for network failures at connect time
    pub fn network<T: Into<String>>(reason: T) -> Self {
        PipelineError::Connect(ConnectError::Network {
            reason: reason.into(),
        })
    }

    /// Coarse family this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Connect(ConnectError::Auth { .. }) => ErrorKind::Auth,
            PipelineError::Connect(ConnectError::Network { .. }) => ErrorKind::Network,
            PipelineError::Broker(_) => ErrorKind::Broker,
            PipelineError::Decode(_) => ErrorKind::Decode,
            PipelineError::Channel { .. } => ErrorKind::Channel,
            PipelineError::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    /// Serializable rendering carried by error events across the boundary
    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Wire Rendering
// ----------------------------------------------------------------------------

/// Coarse error family, stable across the isolation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Auth,
    Network,
    Broker,
    Decode,
    Channel,
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Auth => "auth",
            ErrorKind::Network => "network",
            ErrorKind::Broker => "broker",
            ErrorKind::Decode => "decode",
            ErrorKind::Channel => "channel",
            ErrorKind::Configuration => "configuration",
        };
        write!(f, "{}", name)
    }
}

/// Serializable error rendering for error events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_classification() {
        assert_eq!(PipelineError::auth("bad token").kind(), ErrorKind::Auth);
        assert_eq!(PipelineError::network("dns").kind(), ErrorKind::Network);
        assert_eq!(
            PipelineError::from(BrokerError::ListStreams {
                reason: "timeout".to_string()
            })
            .kind(),
            ErrorKind::Broker
        );
        assert_eq!(
            PipelineError::from(DecodeError::PayloadNotUtf8 {
                subject: "pools.eth".to_string()
            })
            .kind(),
            ErrorKind::Decode
        );
        assert_eq!(PipelineError::channel("closed").kind(), ErrorKind::Channel);
        assert_eq!(
            PipelineError::configuration("empty url").kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_detail_carries_full_message() {
        let err = PipelineError::from(BrokerError::DeleteStream {
            stream: "orders".to_string(),
            reason: "permission denied".to_string(),
        });
        let detail = err.detail();
        assert_eq!(detail.kind, ErrorKind::Broker);
        assert!(detail.message.contains("orders"));
        assert!(detail.message.contains("permission denied"));
        assert_eq!(detail.message, err.to_string());
    }

    #[test]
    fn test_detail_serializes() {
        let detail = ErrorDetail::new(ErrorKind::Decode, "bad payload");
        let json = serde_json::to_string(&detail).unwrap();
        let back: ErrorDetail = serde_json::from_str(&json).unwrap();
        assert_eq!(detail, back);
    }

    #[test]
    fn test_display_is_prefixed_by_family() {
        let err = PipelineError::auth("expired token");
        assert!(err.to_string().starts_with("Connect failed:"));
        let err = PipelineError::from(DecodeError::MissingMetadata {
            subject: "pools.eth".to_string(),
            reason: "no reply subject".to_string(),
        });
        assert!(err.to_string().starts_with("Decode failed:"));
    }
}
