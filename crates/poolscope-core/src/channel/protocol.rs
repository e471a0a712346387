//! Channel Communication Protocol Types
//!
//! This module defines the typed contract of the isolation boundary. The
//! host, the ingest task, and the source task share no state; everything
//! that crosses between them is one of these messages.

use crate::errors::ErrorDetail;
use crate::types::PoolEvent;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Command: Host → Ingest
// ----------------------------------------------------------------------------

/// Commands sent from the host into the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    /// Open a subscription: connect, reconcile streams, route, consume
    Subscribe {
        /// Opaque bearer credential presented to the broker
        credential: String,
        /// Subject (or subject pattern) to consume
        subject: String,
    },
    /// Tear down the active subscription and close the broker connection
    Unsubscribe,
    /// Shut the pipeline down gracefully
    Shutdown,
}

// ----------------------------------------------------------------------------
// Effect: Ingest → Source
// ----------------------------------------------------------------------------

/// Effects sent from the ingest task to the source task.
/// Effects describe external side effects only; the source holds all broker
/// state and the ingest task never sees a connection handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Effect {
    /// Establish (or reuse) the connection and start consuming the subject
    StartSubscription { credential: String, subject: String },
    /// Stop consuming and close the connection
    StopSubscription,
    /// Stop everything and exit the source task
    Shutdown,
}

// ----------------------------------------------------------------------------
// SourceEvent: Source → Ingest
// ----------------------------------------------------------------------------

/// Events sent from the source task to the ingest task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SourceEvent {
    /// A broker message was decoded into the uniform event shape
    MessageDecoded { event: PoolEvent },
    /// Something failed on the source side; the pipeline keeps running
    Error { text: String, detail: ErrorDetail },
}

// ----------------------------------------------------------------------------
// AppEvent: Ingest → Host
// ----------------------------------------------------------------------------

/// Events delivered to the host. This is the entire outbound contract:
/// shaped batches of decoded events, and error notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppEvent {
    /// One shaped delivery: a singleton during the immediate phase, a
    /// coalesced batch afterwards
    MessageBatch { events: Vec<PoolEvent> },
    /// A failure report; human-readable text plus the underlying detail
    Error { text: String, detail: ErrorDetail },
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
