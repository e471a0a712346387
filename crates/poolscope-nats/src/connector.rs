//! Transport Connector
//!
//! Owns the single broker connection of a source task. Connect is
//! idempotent: while a handle is open, further connect calls return the same
//! handle and never dial (so a second subscribe cannot race a fresh
//! connection into existence). Close tears the handle down; the next
//! connect dials from scratch.

use crate::config::NatsConfig;
use crate::error::classify_connect;
use async_nats::{Client, ConnectOptions};
use poolscope_core::{PipelineError, Result};
use tracing::{info, warn};

pub struct Connector {
    url: String,
    client_name: String,
    client: Option<Client>,
}

impl Connector {
    pub fn new(url: impl Into<String>, client_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client_name: client_name.into(),
            client: None,
        }
    }

    pub fn from_config(config: &NatsConfig) -> Self {
        Self::new(config.url.clone(), config.client_name.clone())
    }

    /// Whether a connection handle is currently open
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Connect with the given bearer credential, or return the open handle.
    ///
    /// The credential is only consulted when dialing; a handle opened with
    /// one credential is reused as-is by later calls.
    pub async fn connect(&mut self, credential: &str) -> Result<Client> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }

        let client = ConnectOptions::with_token(credential.to_string())
            .name(&self.client_name)
            .connect(self.url.as_str())
            .await
            .map_err(|err| PipelineError::Connect(classify_connect(&err)))?;

        info!("Connected to broker at {}", self.url);
        self.client = Some(client.clone());
        Ok(client)
    }

    /// Close the connection if one is open. Never fails; a drain error at
    /// teardown is logged and the handle is dropped regardless.
    pub async fn close(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(err) = client.drain().await {
                warn!("Error draining broker connection: {}", err);
            }
            info!("Broker connection closed");
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_disconnected() {
        let connector = Connector::from_config(&NatsConfig::default());
        assert!(!connector.is_connected());
    }

    #[tokio::test]
    async fn test_close_when_disconnected_is_a_noop() {
        let mut connector = Connector::new("nats://localhost:4222", "poolscope");
        connector.close().await;
        assert!(!connector.is_connected());
    }

    #[tokio::test]
    async fn test_connect_failure_classifies_as_network() {
        // nothing listens on this port; the dial must fail without panicking
        let mut connector = Connector::new("nats://127.0.0.1:1", "poolscope-test");
        let err = connector.connect("some-token").await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Connect(poolscope_core::ConnectError::Network { .. })
        ));
        assert!(!connector.is_connected());
    }
}
