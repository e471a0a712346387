//! Delivery Shaping
//!
//! Controls how decoded events reach the host: the first
//! `immediate_count` events of a subscription are forwarded at once, each as
//! a singleton batch, so the first paint happens without waiting. Everything
//! after that is coalesced: the first buffered event arms a flush deadline
//! one window ahead, and when it expires the whole buffer goes out as a
//! single batch.
//!
//! The shaper is a synchronous state machine. The task driving it owns the
//! clock: it passes `now` into [`DeliveryShaper::push`], sleeps until
//! [`DeliveryShaper::deadline`], and calls [`DeliveryShaper::flush`] when the
//! deadline passes. Because a single task performs all three steps, buffer
//! appends and timer arming are atomic with respect to delivery. The
//! deadline is a single `Option<Instant>`, so a second timer can never be
//! pending while one is armed.

use crate::config::ShaperConfig;
use crate::types::PoolEvent;
use std::time::Instant;

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

/// Counters for shaper activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaperStats {
    /// Events delivered as singleton batches during the immediate phase
    pub immediate_deliveries: u64,
    /// Coalesced batches flushed at deadline
    pub batches_flushed: u64,
    /// Events that passed through the buffer
    pub events_buffered: u64,
    /// Buffered events discarded by a reset before their flush
    pub events_discarded: u64,
}

// ----------------------------------------------------------------------------
// DeliveryShaper
// ----------------------------------------------------------------------------

/// Per-subscription delivery policy state.
#[derive(Debug)]
pub struct DeliveryShaper {
    config: ShaperConfig,
    delivered_immediately: usize,
    pending: Vec<PoolEvent>,
    deadline: Option<Instant>,
    stats: ShaperStats,
}

impl DeliveryShaper {
    pub fn new(config: ShaperConfig) -> Self {
        Self {
            config,
            delivered_immediately: 0,
            pending: Vec::new(),
            deadline: None,
            stats: ShaperStats::default(),
        }
    }

    /// Accept one event. Returns a batch to deliver right now (always a
    /// singleton, only during the immediate phase), or `None` when the event
    /// was buffered for the next flush.
    pub fn push(&mut self, event: PoolEvent, now: Instant) -> Option<Vec<PoolEvent>> {
        if self.delivered_immediately < self.config.immediate_count {
            self.delivered_immediately += 1;
            self.stats.immediate_deliveries += 1;
            return Some(vec![event]);
        }

        self.pending.push(event);
        self.stats.events_buffered += 1;
        if self.deadline.is_none() {
            self.deadline = Some(now + self.config.flush_window);
        }
        None
    }

    /// Deadline of the pending flush, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drain the buffer as one batch and disarm the deadline. Called by the
    /// driving task when the deadline passes.
    pub fn flush(&mut self) -> Vec<PoolEvent> {
        self.deadline = None;
        if !self.pending.is_empty() {
            self.stats.batches_flushed += 1;
        }
        std::mem::take(&mut self.pending)
    }

    /// Restart the policy for a new subscription: the immediate phase begins
    /// again and anything still buffered is discarded, never delivered.
    pub fn reset(&mut self) {
        self.delivered_immediately = 0;
        self.stats.events_discarded += self.pending.len() as u64;
        self.pending.clear();
        self.deadline = None;
    }

    /// Number of events waiting for the next flush
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> &ShaperStats {
        &self.stats
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
