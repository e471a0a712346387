//! Centralized Configuration for the Ingest Pipeline
//!
//! Plain structs with sensible defaults. There is no file or environment
//! loading here; hosts construct a config, tweak fields, and hand it to the
//! runtime, which validates it once at start.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest accepted flush window. Deadlines are computed as
/// `Instant + flush_window`, which panics on overflow, so unbounded
/// windows are rejected up front.
pub const MAX_FLUSH_WINDOW: Duration = Duration::from_secs(60 * 60);

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the bounded channels crossing the isolation boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Buffer size for Command channels (Host → Ingest)
    pub command_buffer_size: usize,
    /// Buffer size for SourceEvent channels (Source → Ingest)
    pub source_event_buffer_size: usize,
    /// Buffer size for Effect channels (Ingest → Source)
    pub effect_buffer_size: usize,
    /// Buffer size for AppEvent channels (Ingest → Host)
    pub app_event_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,       // host commands are infrequent
            source_event_buffer_size: 256, // broker traffic can be bursty
            effect_buffer_size: 16,        // one in-flight effect at a time in practice
            app_event_buffer_size: 64,     // batches amortize host-side pressure
        }
    }
}

// ----------------------------------------------------------------------------
// Delivery Shaper Configuration
// ----------------------------------------------------------------------------

/// Policy knobs for the delivery shaper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaperConfig {
    /// Number of leading events per subscription delivered immediately,
    /// each as a singleton batch
    pub immediate_count: usize,
    /// Coalescing window for everything after the immediate phase
    pub flush_window: Duration,
}

impl Default for ShaperConfig {
    fn default() -> Self {
        Self {
            immediate_count: 5,                       // first paint fills fast
            flush_window: Duration::from_millis(500), // then batch at 2 Hz
        }
    }
}

impl ShaperConfig {
    /// Deliver every event as its own batch, never arming the timer.
    /// Useful in tests that assert on per-event behavior.
    pub fn unbuffered() -> Self {
        Self {
            immediate_count: usize::MAX,
            flush_window: Duration::from_millis(500),
        }
    }
}

// ----------------------------------------------------------------------------
// Pipeline Configuration
// ----------------------------------------------------------------------------

/// Top-level configuration handed to the runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub channels: ChannelConfig,
    pub shaper: ShaperConfig,
}

impl PipelineConfig {
    /// Validate configuration consistency. Called by the runtime at start.
    pub fn validate(&self) -> Result<(), String> {
        if self.channels.command_buffer_size == 0 {
            return Err("command_buffer_size must be greater than 0".to_string());
        }
        if self.channels.source_event_buffer_size == 0 {
            return Err("source_event_buffer_size must be greater than 0".to_string());
        }
        if self.channels.effect_buffer_size == 0 {
            return Err("effect_buffer_size must be greater than 0".to_string());
        }
        if self.channels.app_event_buffer_size == 0 {
            return Err("app_event_buffer_size must be greater than 0".to_string());
        }
        if self.shaper.flush_window.is_zero() {
            return Err("flush_window must be greater than 0".to_string());
        }
        if self.shaper.flush_window > MAX_FLUSH_WINDOW {
            return Err(format!(
                "flush_window must not exceed {:?}",
                MAX_FLUSH_WINDOW
            ));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
