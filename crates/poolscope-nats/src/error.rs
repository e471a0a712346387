//! Classification of NATS client failures into the pipeline taxonomy
//!
//! The host contract distinguishes credential rejections from everything
//! else that can go wrong while dialing. The client crate reports both
//! through one error type, so the split happens here, at the crate edge.

use async_nats::ConnectErrorKind;
use poolscope_core::ConnectError;

/// Classify a connect failure by its kind.
pub(crate) fn classify_connect(err: &async_nats::ConnectError) -> ConnectError {
    classify_connect_kind(err.kind(), err.to_string())
}

pub(crate) fn classify_connect_kind(kind: ConnectErrorKind, reason: String) -> ConnectError {
    match kind {
        ConnectErrorKind::Authentication | ConnectErrorKind::AuthorizationViolation => {
            ConnectError::Auth { reason }
        }
        _ => ConnectError::Network { reason },
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_failures_classify_as_auth() {
        for kind in [
            ConnectErrorKind::Authentication,
            ConnectErrorKind::AuthorizationViolation,
        ] {
            let classified = classify_connect_kind(kind, "denied".to_string());
            assert!(matches!(classified, ConnectError::Auth { .. }));
        }
    }

    #[test]
    fn test_transport_failures_classify_as_network() {
        for kind in [
            ConnectErrorKind::Dns,
            ConnectErrorKind::TimedOut,
            ConnectErrorKind::Tls,
            ConnectErrorKind::Io,
            ConnectErrorKind::ServerParse,
        ] {
            let classified = classify_connect_kind(kind, "unreachable".to_string());
            assert!(matches!(classified, ConnectError::Network { .. }));
        }
    }

    #[test]
    fn test_reason_text_is_preserved() {
        let classified =
            classify_connect_kind(ConnectErrorKind::Dns, "no such host".to_string());
        match classified {
            ConnectError::Network { reason } => assert_eq!(reason, "no such host"),
            other => panic!("unexpected classification: {:?}", other),
        }
    }
}
