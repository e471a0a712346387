//! NATS Source Task
//!
//! The broker-facing half of the pipeline. Runs one `tokio::select!` loop
//! over two inputs: effects from the ingest task and raw deliveries from the
//! active subscription (when one exists). All broker state (the connection,
//! the open consumption path) lives inside this task and never crosses a
//! channel.
//!
//! Subscribe cycle, in order: connect (idempotent), reconcile streams
//! against the declared specs, route the subject, open the consumption
//! path. A failure at any step abandons the cycle, surfaces one error
//! event, and leaves the task idle; the host decides whether to retry.
//! There is no automatic reconnect: a consumption path that ends on the
//! broker side reports a network error and the task idles.

use crate::config::NatsConfig;
use crate::connector::Connector;
use crate::reconcile::reconcile_streams;
use crate::subscribe::ActiveSubscription;
use async_nats::jetstream;
use poolscope_core::{
    Effect, EffectReceiver, ErrorKind, PipelineError, Result, SourceEvent, SourceEventSender,
    SourceKind, SourceTask,
};
use tracing::{debug, error, info, warn};

// ----------------------------------------------------------------------------
// NatsSourceTask
// ----------------------------------------------------------------------------

pub struct NatsSourceTask {
    config: NatsConfig,
    connector: Connector,
    event_sender: Option<SourceEventSender>,
    effect_receiver: Option<EffectReceiver>,
}

impl NatsSourceTask {
    pub fn new(config: NatsConfig) -> Result<Self> {
        config.validate().map_err(PipelineError::configuration)?;
        let connector = Connector::from_config(&config);
        Ok(Self {
            config,
            connector,
            event_sender: None,
            effect_receiver: None,
        })
    }

    pub fn config(&self) -> &NatsConfig {
        &self.config
    }

    /// Full subscribe cycle: connect, reconcile, route, open.
    async fn open_subscription(
        &mut self,
        credential: &str,
        subject: &str,
    ) -> Result<ActiveSubscription> {
        let client = self.connector.connect(credential).await?;
        let js = jetstream::new(client.clone());
        reconcile_streams(&js, &self.config.streams).await?;
        ActiveSubscription::open(&client, &js, subject, &self.config.streams).await
    }

    async fn run_loop(
        &mut self,
        sender: SourceEventSender,
        mut effects: EffectReceiver,
    ) -> Result<()> {
        let mut active: Option<ActiveSubscription> = None;

        loop {
            tokio::select! {
                effect = effects.recv() => match effect {
                    Some(Effect::StartSubscription { credential, subject }) => {
                        // a second subscribe replaces the active path; the
                        // host is expected to unsubscribe first
                        if let Some(previous) = active.take() {
                            warn!(
                                "New subscription for '{}' replaces active one on '{}'",
                                subject,
                                previous.subject()
                            );
                            previous.stop().await;
                        }
                        match self.open_subscription(&credential, &subject).await {
                            Ok(subscription) => active = Some(subscription),
                            Err(err) => report_error(&sender, &err).await?,
                        }
                    }
                    Some(Effect::StopSubscription) => {
                        if let Some(subscription) = active.take() {
                            subscription.stop().await;
                        }
                        self.connector.close().await;
                    }
                    Some(Effect::Shutdown) | None => {
                        if let Some(subscription) = active.take() {
                            subscription.stop().await;
                        }
                        self.connector.close().await;
                        break;
                    }
                },
                raw = next_raw(active.as_mut()), if active.is_some() => match raw {
                    Some(Ok(message)) => match message.decode().await {
                        Ok(event) => {
                            debug!("Decoded message on '{}'", event.subject);
                            sender
                                .send(SourceEvent::MessageDecoded { event })
                                .await
                                .map_err(|_| {
                                    PipelineError::channel("Source event receiver dropped")
                                })?;
                        }
                        // decode failures never stop the loop
                        Err(err) => report_error(&sender, &err).await?,
                    },
                    Some(Err(err)) => report_error(&sender, &err).await?,
                    None => {
                        // broker closed the path underneath us; no reconnect
                        active = None;
                        self.connector.close().await;
                        let err = PipelineError::network("Subscription ended unexpectedly");
                        report_error(&sender, &err).await?;
                    }
                },
            }
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl SourceTask for NatsSourceTask {
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
            .ok_or_else(|| PipelineError::channel("NATS source started without channels"))?;
        let effects = self
            .effect_receiver
            .take()
            .ok_or_else(|| PipelineError::channel("NATS source started without channels"))?;

        info!(
            "NATS source running against {} ({} declared streams)",
            self.config.url,
            self.config.streams.len()
        );
        let result = self.run_loop(sender, effects).await;
        info!("NATS source stopped");
        result
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Nats
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

async fn next_raw(
    active: Option<&mut ActiveSubscription>,
) -> Option<Result<crate::subscribe::RawMessage>> {
    match active {
        Some(subscription) => subscription.next_raw().await,
        // branch is guarded off when idle; never resolve
        None => std::future::pending().await,
    }
}

/// Human-readable summary for the host, alongside the structured detail.
fn error_text(err: &PipelineError) -> &'static str {
    match err.kind() {
        ErrorKind::Auth | ErrorKind::Network => "Unable to connect to NATS.",
        ErrorKind::Broker => "NATS subscription error.",
        ErrorKind::Decode => "Failed to decode message.",
        ErrorKind::Channel => "Internal channel error.",
        ErrorKind::Configuration => "Invalid configuration.",
    }
}

async fn report_error(sender: &SourceEventSender, err: &PipelineError) -> Result<()> {
    error!("{}", err);
    sender
        .send(SourceEvent::Error {
            text: error_text(err).to_string(),
            detail: err.detail(),
        })
        .await
        .map_err(|_| PipelineError::channel("Source event receiver dropped"))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use poolscope_core::{create_effect_channel, create_source_event_channel, ChannelConfig};
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let config = NatsConfig {
            url: "definitely not a url".to_string(),
            ..Default::default()
        };
        assert!(NatsSourceTask::new(config).is_err());
    }

    #[test]
    fn test_error_text_by_family() {
        assert_eq!(
            error_text(&PipelineError::auth("denied")),
            "Unable to connect to NATS."
        );
        assert_eq!(
            error_text(&PipelineError::network("refused")),
            "Unable to connect to NATS."
        );
        assert_eq!(
            error_text(&PipelineError::from(poolscope_core::DecodeError::PayloadNotUtf8 {
                subject: "pools.eth".to_string()
            })),
            "Failed to decode message."
        );
    }

    #[tokio::test]
    async fn test_run_without_channels_fails() {
        let mut source = NatsSourceTask::new(NatsConfig::default()).unwrap();
        let err = source.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::Channel { .. }));
    }

    #[tokio::test]
    async fn test_connect_failure_surfaces_as_error_event() {
        // nothing listens on this port; subscribe must fail as an event,
        // not a task exit
        let config = NatsConfig {
            url: "nats://127.0.0.1:1".to_string(),
            ..Default::default()
        };
        let channels = ChannelConfig::default();
        let (event_sender, mut event_receiver) = create_source_event_channel(&channels);
        let (effect_sender, effect_receiver) = create_effect_channel(&channels);

        let mut source = NatsSourceTask::new(config).unwrap();
        source
            .attach_channels(event_sender, effect_receiver)
            .unwrap();
        let handle = tokio::spawn(async move { source.run().await });

        effect_sender
            .send(Effect::StartSubscription {
                credential: "token".to_string(),
                subject: "pools.eth".to_string(),
            })
            .await
            .unwrap();

        let received = timeout(Duration::from_secs(5), event_receiver.recv())
            .await
            .expect("timed out waiting for error event")
            .expect("source closed its event channel");
        match received {
            SourceEvent::Error { text, detail } => {
                assert_eq!(text, "Unable to connect to NATS.");
                assert_eq!(detail.kind, ErrorKind::Network);
            }
            other => panic!("unexpected source event: {:?}", other),
        }

        // task is still alive and shuts down cleanly
        effect_sender.send(Effect::Shutdown).await.unwrap();
        let result = timeout(Duration::from_secs(1), handle).await.unwrap();
        assert!(result.unwrap().is_ok());
    }
}
