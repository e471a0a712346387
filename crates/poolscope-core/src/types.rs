//! Core Data Types for the Ingest Pipeline
//!
//! The pipeline moves exactly one shape of data toward the host: the decoded
//! [`PoolEvent`]. Everything else here describes broker-side configuration
//! ([`StreamSpec`]) and routing verdicts ([`SubscriptionKind`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ----------------------------------------------------------------------------
// PoolEvent
// ----------------------------------------------------------------------------

/// A decoded broker message in the uniform shape the host consumes.
///
/// The payload is carried as opaque UTF-8 text and is never parsed or
/// re-encoded by the pipeline; interpreting it is the host's business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEvent {
    /// Unique id assigned at decode time
    pub id: String,
    /// ISO-8601 timestamp with millisecond precision, UTC
    pub timestamp: String,
    /// Broker subject the message arrived on
    pub subject: String,
    /// Raw message body, passed through byte-for-byte
    pub payload: String,
}

impl PoolEvent {
    pub fn new(
        id: impl Into<String>,
        timestamp: impl Into<String>,
        subject: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp: timestamp.into(),
            subject: subject.into(),
            payload: payload.into(),
        }
    }
}

impl fmt::Display for PoolEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event {} on '{}' at {}", self.id, self.subject, self.timestamp)
    }
}

// ----------------------------------------------------------------------------
// StreamSpec
// ----------------------------------------------------------------------------

/// Desired configuration of one durable broker stream.
///
/// The reconciler drives the broker toward the declared set of specs before
/// every subscription attempt, and the router uses the subject patterns to
/// decide whether a subscription is durable or live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSpec {
    /// Stream name, unique per broker
    pub name: String,
    /// Subject patterns captured by the stream (NATS wildcards allowed)
    pub subjects: Vec<String>,
    /// Retention age limit for messages in the stream
    pub max_age: Duration,
}

impl StreamSpec {
    pub fn new(name: impl Into<String>, subjects: Vec<String>, max_age: Duration) -> Self {
        Self {
            name: name.into(),
            subjects,
            max_age,
        }
    }

    /// Whether this stream captures the given subject, either by exact
    /// membership or because a declared wildcard pattern covers it.
    pub fn covers(&self, subject: &str) -> bool {
        self.subjects
            .iter()
            .any(|pattern| pattern == subject || subject_matches(pattern, subject))
    }

    /// Deterministic name of the durable pull consumer bound to this stream.
    pub fn consumer_name(&self) -> String {
        format!("{}-pull", self.name)
    }
}

impl fmt::Display for StreamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stream '{}' ({} subjects, max age {:?})",
            self.name,
            self.subjects.len(),
            self.max_age
        )
    }
}

// ----------------------------------------------------------------------------
// Subject Matching
// ----------------------------------------------------------------------------

/// NATS subject pattern matching: `*` matches exactly one token, `>` matches
/// one or more trailing tokens. Tokens are dot-separated.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split('.');
    let mut subject_tokens = subject.split('.');

    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            // '>' requires at least one remaining subject token
            (Some(">"), Some(_)) => return true,
            (Some(">"), None) => return false,
            (Some("*"), Some(_)) => continue,
            (Some(p), Some(s)) if p == s => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

// ----------------------------------------------------------------------------
// SubscriptionKind
// ----------------------------------------------------------------------------

/// Routing verdict for a subscription request.
///
/// Consumption sites match on this exhaustively; adding a variant is a
/// deliberate API change, not a silent fallthrough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionKind {
    /// Plain core subscription, no persistence or replay
    Live,
    /// Pull consumer bound to the named durable stream
    Durable { stream: String },
}

impl SubscriptionKind {
    pub fn is_durable(&self) -> bool {
        matches!(self, SubscriptionKind::Durable { .. })
    }
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionKind::Live => write!(f, "live"),
            SubscriptionKind::Durable { stream } => write!(f, "durable via '{}'", stream),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
