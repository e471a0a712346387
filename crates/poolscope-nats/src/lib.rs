//! PoolScope NATS Source
//!
//! NATS JetStream implementation of the pipeline's
//! [`SourceTask`](poolscope_core::SourceTask). One task owns the broker
//! connection, self-heals stream configuration before every subscribe, and
//! consumes either durably (pull consumer) or live (core subscription)
//! depending on how the subject routes against the declared streams.
//!
//! The crate never talks to the host directly; everything it produces flows
//! through the channel contract defined in `poolscope-core`.

pub mod config;
pub mod connector;
pub mod error;
pub mod reconcile;
pub mod source;
pub mod subscribe;

// Re-export the source task and its configuration
pub use config::{default_stream_specs, NatsConfig};
pub use connector::Connector;
pub use reconcile::{plan, reconcile_streams, ReconcilePlan, ReconcileReport, StreamState};
pub use source::NatsSourceTask;
pub use subscribe::route;
