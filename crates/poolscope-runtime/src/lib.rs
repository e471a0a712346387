//! PoolScope Runtime
//!
//! Task orchestration for the PoolScope ingest pipeline. The
//! [`IngestRuntime`] spawns a source task (broker or mock) and the
//! [`IngestTask`], connects them with bounded channels, and hands the host
//! the two ends it is allowed to touch: a command sender and an app event
//! receiver.

pub mod ingest;
pub mod runtime;

pub use ingest::{IngestStats, IngestTask, SubscriptionState};
pub use runtime::IngestRuntime;
