//! Mock Source
//!
//! An offline [`SourceTask`] that stands in for the broker entirely: no
//! connection, no stream reconciliation, no routing. It carries an ordered,
//! already-decoded recording and plays the whole thing through the normal
//! outbound contract whenever a subscription starts, then idles. Downstream
//! shaping and delivery behave exactly as they would with live traffic,
//! which is what makes it useful for demos and end-to-end tests.

use crate::channel::{Effect, EffectReceiver, SourceEvent, SourceEventSender};
use crate::errors::PipelineError;
use crate::source::{SourceKind, SourceTask};
use crate::types::PoolEvent;
use crate::Result;
use chrono::{DateTime, SecondsFormat};
use serde_json::json;
use tracing::{debug, info};

// ----------------------------------------------------------------------------
// MockSourceTask
// ----------------------------------------------------------------------------

/// Source task that replays a pre-recorded event sequence.
pub struct MockSourceTask {
    events: Vec<PoolEvent>,
    event_sender: Option<SourceEventSender>,
    effect_receiver: Option<EffectReceiver>,
}

impl MockSourceTask {
    /// Create a mock source from an explicit recording.
    pub fn new(events: Vec<PoolEvent>) -> Self {
        Self {
            events,
            event_sender: None,
            effect_receiver: None,
        }
    }

    /// Create a mock source carrying the built-in liquidity-pool recording.
    pub fn with_fixture() -> Self {
        Self::new(fixture_events())
    }

    /// Number of events in the recording
    pub fn recorded_len(&self) -> usize {
        self.events.len()
    }
}

#[async_trait::async_trait]
impl SourceTask for MockSourceTask {
    fn attach_channels(
        &mut self,
        event_sender: SourceEventSender,
        effect_receiver: EffectReceiver,
    ) -> Result<()> {
        self.event_sender = Some(event_sender);
        self.effect_receiver = Some(effect_receiver);
        Ok(())
    }

    async fn run(&mut self) -> Result<()> {
        let sender = self
            .event_sender
            .take()
            .ok_or_else(|| PipelineError::channel("Mock source started without channels"))?;
        let mut effects = self
            .effect_receiver
            .take()
            .ok_or_else(|| PipelineError::channel("Mock source started without channels"))?;

        info!("Mock source running with {} recorded events", self.events.len());

        while let Some(effect) = effects.recv().await {
            match effect {
                // credential and subject are irrelevant offline; every
                // subscription replays the recording from the start
                Effect::StartSubscription { subject, .. } => {
                    debug!("Mock source replaying recording for '{}'", subject);
                    for event in &self.events {
                        sender
                            .send(SourceEvent::MessageDecoded {
                                event: event.clone(),
                            })
                            .await
                            .map_err(|_| {
                                PipelineError::channel("Source event receiver dropped")
                            })?;
                    }
                }
                Effect::StopSubscription => {
                    debug!("Mock source subscription stopped");
                }
                Effect::Shutdown => {
                    debug!("Mock source shutting down");
                    break;
                }
            }
        }

        info!("Mock source stopped");
        Ok(())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Mock
    }
}

// ----------------------------------------------------------------------------
// Built-in Recording
// ----------------------------------------------------------------------------

// 2023-10-11T00:00:00Z
const FIXTURE_BASE_SECS: i64 = 1_696_982_400;

struct FixtureEntry {
    subject: &'static str,
    address: &'static str,
    lower: f64,
    current: f64,
    upper: f64,
    total_usd: f64,
    pair: [(&'static str, f64, f64); 2],
    tx_hash: &'static str,
}

/// Build the built-in recording: a short history of position additions and
/// removals across a few pools, one second apart.
pub fn fixture_events() -> Vec<PoolEvent> {
    let entries = [
        FixtureEntry {
            subject: "poolscope.pools.addition",
            address: "0x8731d54e9d02c286767d56ac03e8037c07e01e98",
            lower: 0.82,
            current: 0.97,
            upper: 1.12,
            total_usd: 15_230.44,
            pair: [("WETH", 4.21, 1_810.55), ("USDC", 7_608.12, 1.0)],
            tx_hash: "0x6dd9fb01f9f93f0ef1f1e6dd5e39f93ab7a7d1af56f42da87ad32a47e5a2cf01",
        },
        FixtureEntry {
            subject: "poolscope.pools.addition",
            address: "0x23f4569002a5a07f0ecf688142cef6c16c05e5bd",
            lower: 0.64,
            current: 0.71,
            upper: 0.94,
            total_usd: 88_104.09,
            pair: [("WBTC", 1.62, 27_310.8), ("DAI", 43_861.5, 0.9998)],
            tx_hash: "0x1be30a1a3b9ff2c8a80ad01d58c1a3eb33e11c2a734b12e555a30c9991f0f67a",
        },
        FixtureEntry {
            subject: "poolscope.pools.removal",
            address: "0x8731d54e9d02c286767d56ac03e8037c07e01e98",
            lower: 0.82,
            current: 1.15,
            upper: 1.12,
            total_usd: 14_990.02,
            pair: [("WETH", 4.18, 1_795.1), ("USDC", 7_489.33, 1.0)],
            tx_hash: "0x93ac1c60d1bb211d1a4f302cba7c29a3cbfa19fca55121ca636c43a2a08ae26b",
        },
        FixtureEntry {
            subject: "poolscope.pools.addition",
            address: "0xa0c68c638235ee32657e8f720a23cec1bfc77c77",
            lower: 0.31,
            current: 0.5,
            upper: 0.77,
            total_usd: 2_305.67,
            pair: [("UNI", 301.4, 4.32), ("WETH", 0.56, 1_812.0)],
            tx_hash: "0x0f7a9c4b6ff0f0bb6e1e9a3c9e97b6a3824fd6c9ddca1be1b7e733d4fbc44d30",
        },
        FixtureEntry {
            subject: "poolscope.pools.addition",
            address: "0x5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f",
            lower: 0.9,
            current: 1.01,
            upper: 1.1,
            total_usd: 120_482.91,
            pair: [("WETH", 33.2, 1_808.77), ("USDT", 60_311.0, 1.0002)],
            tx_hash: "0x4b1e9a6c2d8f0357a1c9e8b7d6f5a4c3b2a190887766554433221100ffeeddcc",
        },
        FixtureEntry {
            subject: "poolscope.pools.removal",
            address: "0x23f4569002a5a07f0ecf688142cef6c16c05e5bd",
            lower: 0.64,
            current: 0.6,
            upper: 0.94,
            total_usd: 87_650.2,
            pair: [("WBTC", 1.6, 27_150.25), ("DAI", 44_217.8, 0.9999)],
            tx_hash: "0x7e3f2b9d1c5a6e8f90a1b2c3d4e5f60718293a4b5c6d7e8f9012a3b4c5d6e7f8",
        },
    ];

    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let seconds = FIXTURE_BASE_SECS + idx as i64;
            let timestamp = DateTime::from_timestamp(seconds, 0)
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
                .unwrap_or_default();
            let payload = json!({
                "timestamp": seconds,
                "address": entry.address,
                "lowerTokenRatio": entry.lower,
                "currentTokenRatio": entry.current,
                "upperTokenRatio": entry.upper,
                "totalValueUSD": entry.total_usd,
                "pair": [
                    {
                        "symbol": entry.pair[0].0,
                        "amount": entry.pair[0].1,
                        "priceUSD": entry.pair[0].2,
                    },
                    {
                        "symbol": entry.pair[1].0,
                        "amount": entry.pair[1].1,
                        "priceUSD": entry.pair[1].2,
                    },
                ],
                "txHash": entry.tx_hash,
            });
            PoolEvent {
                id: format!("mock-{}", idx),
                timestamp,
                subject: entry.subject.to_string(),
                payload: payload.to_string(),
            }
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
