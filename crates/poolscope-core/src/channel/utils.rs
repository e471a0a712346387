//! Channel Utilities for the Isolation Boundary
//!
//! Bounded tokio mpsc channels throughout. Every channel is created from the
//! same [`ChannelConfig`] so buffer sizing stays in one place.

use crate::channel::protocol::{AppEvent, Command, Effect, SourceEvent};
use crate::config::ChannelConfig;

// ----------------------------------------------------------------------------
// Channel Type Aliases
// ----------------------------------------------------------------------------

pub type CommandSender = tokio::sync::mpsc::Sender<Command>;
pub type CommandReceiver = tokio::sync::mpsc::Receiver<Command>;
pub type SourceEventSender = tokio::sync::mpsc::Sender<SourceEvent>;
pub type SourceEventReceiver = tokio::sync::mpsc::Receiver<SourceEvent>;
pub type EffectSender = tokio::sync::mpsc::Sender<Effect>;
pub type EffectReceiver = tokio::sync::mpsc::Receiver<Effect>;
pub type AppEventSender = tokio::sync::mpsc::Sender<AppEvent>;
pub type AppEventReceiver = tokio::sync::mpsc::Receiver<AppEvent>;

// ----------------------------------------------------------------------------
// Channel Creation Utilities
// ----------------------------------------------------------------------------

/// Create bounded command channel (Host → Ingest)
pub fn create_command_channel(config: &ChannelConfig) -> (CommandSender, CommandReceiver) {
    tokio::sync::mpsc::channel(config.command_buffer_size)
}

/// Create bounded source event channel (Source → Ingest)
pub fn create_source_event_channel(
    config: &ChannelConfig,
) -> (SourceEventSender, SourceEventReceiver) {
    tokio::sync::mpsc::channel(config.source_event_buffer_size)
}

/// Create bounded effect channel (Ingest → Source)
pub fn create_effect_channel(config: &ChannelConfig) -> (EffectSender, EffectReceiver) {
    tokio::sync::mpsc::channel(config.effect_buffer_size)
}

/// Create bounded app event channel (Ingest → Host)
pub fn create_app_event_channel(config: &ChannelConfig) -> (AppEventSender, AppEventReceiver) {
    tokio::sync::mpsc::channel(config.app_event_buffer_size)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
