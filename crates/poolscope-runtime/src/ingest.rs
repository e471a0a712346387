//! Ingest Task
//!
//! The policy half of the pipeline. Sits between the host and the source,
//! owns the delivery shaper and the subscription state machine, and is the
//! only place where host-bound traffic is produced. One `tokio::select!`
//! loop over three inputs: commands from the host, events from the source,
//! and the shaper's flush deadline.
//!
//! Error triage follows one rule: losing a channel peer (or a broken
//! configuration) is unrecoverable and ends the task; everything else is
//! logged or forwarded and the loop keeps going.

use poolscope_core::{
    AppEvent, AppEventSender, Command, CommandReceiver, DeliveryShaper, Effect, EffectSender,
    PipelineError, PoolEvent, Result, ShaperConfig, SourceEvent, SourceEventReceiver,
};
use std::time::Instant;
use tracing::{debug, error, info, warn};

// ----------------------------------------------------------------------------
// Subscription State
// ----------------------------------------------------------------------------

/// Host-visible lifecycle: idle until a subscribe command arrives, back to
/// idle on unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    Idle,
    Subscribed { subject: String },
}

impl SubscriptionState {
    pub fn is_subscribed(&self) -> bool {
        matches!(self, SubscriptionState::Subscribed { .. })
    }
}

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

/// Counters for ingest activity, logged when the task stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub commands_processed: u64,
    pub events_received: u64,
    pub batches_delivered: u64,
    pub errors_forwarded: u64,
    pub events_dropped_idle: u64,
}

// ----------------------------------------------------------------------------
// IngestTask
// ----------------------------------------------------------------------------

pub struct IngestTask {
    command_receiver: CommandReceiver,
    source_event_receiver: SourceEventReceiver,
    effect_sender: EffectSender,
    app_event_sender: AppEventSender,
    shaper: DeliveryShaper,
    state: SubscriptionState,
    stats: IngestStats,
    running: bool,
}

impl IngestTask {
    pub fn new(
        command_receiver: CommandReceiver,
        source_event_receiver: SourceEventReceiver,
        effect_sender: EffectSender,
        app_event_sender: AppEventSender,
        shaper_config: ShaperConfig,
    ) -> Self {
        Self {
            command_receiver,
            source_event_receiver,
            effect_sender,
            app_event_sender,
            shaper: DeliveryShaper::new(shaper_config),
            state: SubscriptionState::Idle,
            stats: IngestStats::default(),
            running: true,
        }
    }

    /// Run the ingest loop until shutdown or channel loss.
    pub async fn run(&mut self) -> Result<()> {
        info!("Ingest task starting");

        while self.running {
            let flush_at = self.shaper.deadline();
            tokio::select! {
                command = self.command_receiver.recv() => match command {
                    Some(command) => {
                        if let Err(err) = self.process_command(command).await {
                            self.triage(err);
                        }
                    }
                    None => {
                        debug!("Command channel closed; stopping ingest task");
                        self.running = false;
                    }
                },
                source_event = self.source_event_receiver.recv() => match source_event {
                    Some(event) => {
                        if let Err(err) = self.process_source_event(event).await {
                            self.triage(err);
                        }
                    }
                    None => {
                        debug!("Source event channel closed; stopping ingest task");
                        self.running = false;
                    }
                },
                _ = tokio::time::sleep_until(as_tokio_deadline(flush_at)),
                    if flush_at.is_some() =>
                {
                    if let Err(err) = self.flush_pending().await {
                        self.triage(err);
                    }
                }
            }
        }

        info!("Ingest task stopped: {:?}", self.stats);
        Ok(())
    }

    /// Unrecoverable errors end the loop; everything else is logged.
    fn triage(&mut self, err: PipelineError) {
        match err {
            PipelineError::Channel { .. } | PipelineError::Configuration { .. } => {
                error!("Unrecoverable ingest error, shutting down: {}", err);
                self.running = false;
            }
            other => warn!("Ingest error (continuing): {}", other),
        }
    }

    async fn process_command(&mut self, command: Command) -> Result<()> {
        self.stats.commands_processed += 1;
        match command {
            Command::Subscribe { credential, subject } => {
                if let SubscriptionState::Subscribed { subject: current } = &self.state {
                    // not guarded against: the source replaces its active
                    // loop and the old subscription is torn down
                    warn!(
                        "Subscribe to '{}' while '{}' is active",
                        subject, current
                    );
                }
                self.shaper.reset();
                self.effect_sender
                    .send(Effect::StartSubscription {
                        credential,
                        subject: subject.clone(),
                    })
                    .await
                    .map_err(|_| PipelineError::channel("Source task unavailable"))?;
                info!("Subscribed to '{}'", subject);
                self.state = SubscriptionState::Subscribed { subject };
            }
            Command::Unsubscribe => {
                let discarded = self.shaper.pending_len();
                self.shaper.reset();
                if discarded > 0 {
                    debug!("Discarded {} buffered events on unsubscribe", discarded);
                }
                self.effect_sender
                    .send(Effect::StopSubscription)
                    .await
                    .map_err(|_| PipelineError::channel("Source task unavailable"))?;
                info!("Unsubscribed");
                self.state = SubscriptionState::Idle;
            }
            Command::Shutdown => {
                // best effort; the source may already be gone
                if self.effect_sender.send(Effect::Shutdown).await.is_err() {
                    debug!("Source task already stopped");
                }
                info!("Shutdown requested");
                self.running = false;
            }
        }
        Ok(())
    }

    async fn process_source_event(&mut self, source_event: SourceEvent) -> Result<()> {
        match source_event {
            SourceEvent::MessageDecoded { event } => {
                self.stats.events_received += 1;
                if !self.state.is_subscribed() {
                    // trailing deliveries after unsubscribe are dropped
                    self.stats.events_dropped_idle += 1;
                    debug!("Dropping event received while idle: {}", event.id);
                    return Ok(());
                }
                if let Some(batch) = self.shaper.push(event, Instant::now()) {
                    self.deliver(batch).await?;
                }
            }
            SourceEvent::Error { text, detail } => {
                self.stats.errors_forwarded += 1;
                self.app_event_sender
                    .send(AppEvent::Error { text, detail })
                    .await
                    .map_err(|_| PipelineError::channel("Host receiver dropped"))?;
            }
        }
        Ok(())
    }

    async fn flush_pending(&mut self) -> Result<()> {
        let batch = self.shaper.flush();
        if batch.is_empty() {
            return Ok(());
        }
        self.deliver(batch).await
    }

    async fn deliver(&mut self, events: Vec<PoolEvent>) -> Result<()> {
        self.stats.batches_delivered += 1;
        debug!("Delivering batch of {}", events.len());
        self.app_event_sender
            .send(AppEvent::MessageBatch { events })
            .await
            .map_err(|_| PipelineError::channel("Host receiver dropped"))
    }

    pub fn state(&self) -> &SubscriptionState {
        &self.state
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }
}

fn as_tokio_deadline(deadline: Option<Instant>) -> tokio::time::Instant {
    // the select branch is disabled when no deadline is armed; the fallback
    // value is never slept on
    tokio::time::Instant::from_std(deadline.unwrap_or_else(Instant::now))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
