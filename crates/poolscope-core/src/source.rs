//! Source Task Trait Definition
//!
//! Defines the common interface for source tasks. The broker-backed
//! implementation lives in `poolscope-nats`; the offline implementation is
//! [`MockSourceTask`](crate::mock::MockSourceTask) in this crate.

use crate::{
    channel::{EffectReceiver, SourceEventSender},
    Result,
};
use std::fmt;

// ----------------------------------------------------------------------------
// Source Task Trait
// ----------------------------------------------------------------------------

/// Common interface for source tasks
///
/// A source task is the only part of the pipeline that touches a broker. It
/// runs as an independent async task, receives [`Effect`](crate::Effect)s
/// from the ingest task, and emits [`SourceEvent`](crate::SourceEvent)s with
/// decoded messages and failures. It shares no state with the rest of the
/// pipeline; the runtime spawns it and manages its lifecycle.
#[async_trait::async_trait]
pub trait SourceTask: Send + Sync {
    /// Attach the channels created by the runtime
    ///
    /// Implementations store these handles and use them for all
    /// communication with the ingest task.
    fn attach_channels(
        &mut self,
        event_sender: SourceEventSender,
        effect_receiver: EffectReceiver,
    ) -> Result<()>;

    /// Run the source's main event loop
    ///
    /// Runs until an [`Effect::Shutdown`](crate::Effect::Shutdown) arrives
    /// or the effect channel closes. Subscription failures are reported as
    /// [`SourceEvent::Error`](crate::SourceEvent::Error)s, never as an early
    /// return; only channel loss ends the loop with an error.
    async fn run(&mut self) -> Result<()>;

    /// Identifier for the source implementation
    fn kind(&self) -> SourceKind;
}

// ----------------------------------------------------------------------------
// Source Kind
// ----------------------------------------------------------------------------

/// Identifies which source implementation a task belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// NATS JetStream broker source
    Nats,
    /// Pre-recorded offline source
    Mock,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Nats => write!(f, "nats"),
            SourceKind::Mock => write!(f, "mock"),
        }
    }
}
