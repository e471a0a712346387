//! Channel Module
//!
//! CSP-style channel infrastructure for the isolation boundary:
//! - `protocol`: the typed messages that cross the boundary
//! - `utils`: channel aliases and bounded-channel constructors

pub mod protocol;
pub mod utils;

// Re-export protocol types
pub use protocol::{AppEvent, Command, Effect, SourceEvent};

// Re-export ChannelConfig from config module
pub use crate::config::ChannelConfig;

// Re-export utility types
pub use utils::{
    create_app_event_channel, create_command_channel, create_effect_channel,
    create_source_event_channel, AppEventReceiver, AppEventSender, CommandReceiver, CommandSender,
    EffectReceiver, EffectSender, SourceEventReceiver, SourceEventSender,
};
