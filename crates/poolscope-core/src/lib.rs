//! PoolScope Core
//!
//! Core building blocks of the PoolScope ingest pipeline: the uniform event
//! shape, the typed channel protocol of the isolation boundary, message
//! decoding, delivery shaping, and the [`SourceTask`] trait that broker
//! implementations plug into.
//!
//! ## Architecture
//!
//! The pipeline is three independent tasks connected only by bounded
//! channels:
//!
//! ```text
//! Host ──Command──▶ Ingest ──Effect──▶ Source (broker or mock)
//! Host ◀─AppEvent── Ingest ◀─SourceEvent── Source
//! ```
//!
//! The source owns all broker state. The ingest task owns delivery policy
//! (the [`DeliveryShaper`]). The host sees decoded [`PoolEvent`] batches and
//! error events, nothing else. This crate defines the contract; the broker
//! implementation lives in `poolscope-nats` and the runtime wiring in
//! `poolscope-runtime`.

pub mod channel;
pub mod codec;
pub mod config;
pub mod errors;
pub mod mock;
pub mod shaper;
pub mod source;
pub mod types;

// Re-export the channel protocol and utilities
pub use channel::{
    create_app_event_channel, create_command_channel, create_effect_channel,
    create_source_event_channel, AppEvent, AppEventReceiver, AppEventSender, Command,
    CommandReceiver, CommandSender, Effect, EffectReceiver, EffectSender, SourceEvent,
    SourceEventReceiver, SourceEventSender,
};

// Re-export configuration
pub use config::{ChannelConfig, MAX_FLUSH_WINDOW, PipelineConfig, ShaperConfig};

// Re-export error types
pub use errors::{
    BrokerError, ConnectError, DecodeError, ErrorDetail, ErrorKind, PipelineError, Result,
};

// Re-export core functionality
pub use codec::{decode_durable, decode_live};
pub use mock::MockSourceTask;
pub use shaper::{DeliveryShaper, ShaperStats};
pub use source::{SourceKind, SourceTask};
pub use types::{subject_matches, PoolEvent, StreamSpec, SubscriptionKind};
