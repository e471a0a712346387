//! NATS Source Configuration

use poolscope_core::StreamSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

// ----------------------------------------------------------------------------
// NatsConfig
// ----------------------------------------------------------------------------

/// Configuration for the NATS JetStream source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatsConfig {
    /// Broker URL, e.g. `nats://localhost:4222`
    pub url: String,
    /// Durable streams the reconciler drives the broker toward. Subjects
    /// covered by one of these specs get durable subscriptions; everything
    /// else is consumed live.
    pub streams: Vec<StreamSpec>,
    /// Client name reported to the broker
    pub client_name: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            streams: default_stream_specs(),
            client_name: "poolscope".to_string(),
        }
    }
}

impl NatsConfig {
    /// Validate configuration consistency. Called when the source task is
    /// constructed, so a bad config fails fast instead of at subscribe time.
    pub fn validate(&self) -> Result<(), String> {
        Url::parse(&self.url)
            .map_err(|err| format!("Invalid broker URL '{}': {}", self.url, err))?;
        for spec in &self.streams {
            if spec.name.is_empty() {
                return Err("Stream name must not be empty".to_string());
            }
            if spec.subjects.is_empty() {
                return Err(format!("Stream '{}' declares no subjects", spec.name));
            }
            if spec.max_age.is_zero() {
                return Err(format!("Stream '{}' has a zero max age", spec.name));
            }
            let distinct: HashSet<&str> = spec.subjects.iter().map(String::as_str).collect();
            if distinct.len() != spec.subjects.len() {
                return Err(format!("Stream '{}' repeats a subject", spec.name));
            }
        }
        Ok(())
    }
}

/// The stream layout the dashboard ships with: one durable stream capturing
/// every pool event, retained for two days.
pub fn default_stream_specs() -> Vec<StreamSpec> {
    vec![StreamSpec::new(
        "poolscope",
        vec!["poolscope.pools.>".to_string()],
        Duration::from_secs(48 * 60 * 60),
    )]
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
