//! PoolScope Ingest Runtime
//!
//! Wires one source task to the ingest task and exposes the host-facing
//! surface: a command sender for `subscribe`/`unsubscribe`/`shutdown` and an
//! app event receiver for message batches and error events.
//!
//! The runtime accepts any [`SourceTask`] implementation, so hosts choose at
//! wiring time whether they talk to a real broker (`poolscope-nats`) or to
//! the recorded mock source:
//!
//! ```rust,no_run
//! use poolscope_core::{AppEvent, MockSourceTask, PipelineConfig};
//! use poolscope_runtime::IngestRuntime;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut runtime = IngestRuntime::new(PipelineConfig::default());
//! runtime.set_source(MockSourceTask::with_fixture())?;
//! runtime.start().await?;
//!
//! let mut app_events = runtime
//!     .take_app_events()
//!     .ok_or("app events already taken")?;
//! runtime.subscribe("dev-token", "poolscope.pools.>").await?;
//!
//! while let Some(app_event) = app_events.recv().await {
//!     match app_event {
//!         AppEvent::MessageBatch { events } => println!("batch of {}", events.len()),
//!         AppEvent::Error { text, .. } => eprintln!("{}", text),
//!     }
//! }
//!
//! runtime.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use crate::ingest::IngestTask;
use poolscope_core::{
    create_app_event_channel, create_command_channel, create_effect_channel,
    create_source_event_channel, AppEventReceiver, Command, CommandSender, PipelineConfig,
    PipelineError, Result, SourceKind, SourceTask,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long `shutdown()` waits for a task to exit before aborting it
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// ----------------------------------------------------------------------------
// Ingest Runtime
// ----------------------------------------------------------------------------

/// Orchestrates the ingest pipeline: one source task, one ingest task, and
/// the four bounded channels between them and the host.
pub struct IngestRuntime {
    /// Pipeline configuration
    config: PipelineConfig,
    /// Registered source task (before start)
    pending_source: Option<Box<dyn SourceTask>>,
    /// Kind tag of the registered source
    source_kind: Option<SourceKind>,
    /// Source task handle (after start)
    source_handle: Option<JoinHandle<Result<()>>>,
    /// Ingest task handle (after start)
    ingest_handle: Option<JoinHandle<Result<()>>>,
    /// Command sender for external use
    command_sender: Option<CommandSender>,
    /// App event receiver for external use
    app_event_receiver: Option<AppEventReceiver>,
    /// Running state
    running: bool,
}

impl IngestRuntime {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            pending_source: None,
            source_kind: None,
            source_handle: None,
            ingest_handle: None,
            command_sender: None,
            app_event_receiver: None,
            running: false,
        }
    }

    /// Register the source task. Must be called before `start()`, and only
    /// one source can be registered per runtime.
    pub fn set_source<T: SourceTask + 'static>(&mut self, source: T) -> Result<()> {
        if self.running {
            return Err(PipelineError::configuration(
                "Cannot set a source on a running runtime",
            ));
        }
        if self.pending_source.is_some() {
            return Err(PipelineError::configuration(
                "A source task is already registered",
            ));
        }
        self.source_kind = Some(source.kind());
        self.pending_source = Some(Box::new(source));
        Ok(())
    }

    /// Start the pipeline: create channels, attach them to the source, and
    /// spawn the source and ingest tasks.
    pub async fn start(&mut self) -> Result<()> {
        if self.running {
            return Err(PipelineError::configuration("Runtime already running"));
        }
        self.config
            .validate()
            .map_err(PipelineError::configuration)?;

        let mut source = self.pending_source.take().ok_or_else(|| {
            PipelineError::configuration(
                "No source task registered. Use set_source() before start()",
            )
        })?;

        let (command_sender, command_receiver) = create_command_channel(&self.config.channels);
        let (source_event_sender, source_event_receiver) =
            create_source_event_channel(&self.config.channels);
        let (effect_sender, effect_receiver) = create_effect_channel(&self.config.channels);
        let (app_event_sender, app_event_receiver) =
            create_app_event_channel(&self.config.channels);

        source.attach_channels(source_event_sender, effect_receiver)?;
        let source_handle = tokio::spawn(async move { source.run().await });

        let mut ingest = IngestTask::new(
            command_receiver,
            source_event_receiver,
            effect_sender,
            app_event_sender,
            self.config.shaper.clone(),
        );
        let ingest_handle = tokio::spawn(async move { ingest.run().await });

        self.command_sender = Some(command_sender);
        self.app_event_receiver = Some(app_event_receiver);
        self.source_handle = Some(source_handle);
        self.ingest_handle = Some(ingest_handle);
        self.running = true;

        info!(
            "Ingest runtime started with {} source",
            self.source_kind
                .as_ref()
                .map(|k| k.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
        Ok(())
    }

    /// Open a subscription for `subject`, authenticating with `credential`.
    pub async fn subscribe<C, S>(&self, credential: C, subject: S) -> Result<()>
    where
        C: Into<String>,
        S: Into<String>,
    {
        self.send_command(Command::Subscribe {
            credential: credential.into(),
            subject: subject.into(),
        })
        .await
    }

    /// Close the current subscription, if any.
    pub async fn unsubscribe(&self) -> Result<()> {
        self.send_command(Command::Unsubscribe).await
    }

    async fn send_command(&self, command: Command) -> Result<()> {
        let sender = self
            .command_sender
            .as_ref()
            .ok_or_else(|| PipelineError::configuration("Runtime is not running"))?;
        sender
            .send(command)
            .await
            .map_err(|_| PipelineError::channel("Ingest task unavailable"))
    }

    /// Stop the pipeline. Signals both tasks, waits up to [`SHUTDOWN_GRACE`]
    /// for each to exit, and aborts any that do not. Safe to call twice.
    pub async fn shutdown(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }
        self.running = false;

        if let Some(sender) = &self.command_sender {
            if sender.send(Command::Shutdown).await.is_err() {
                debug!("Ingest task already stopped");
            }
        }

        if let Some(handle) = self.source_handle.take() {
            join_with_grace("source", handle).await;
        }
        if let Some(handle) = self.ingest_handle.take() {
            join_with_grace("ingest", handle).await;
        }

        self.command_sender = None;
        self.app_event_receiver = None;

        info!("Ingest runtime stopped");
        Ok(())
    }

    /// Get command sender for external use
    pub fn command_sender(&self) -> Option<&CommandSender> {
        self.command_sender.as_ref()
    }

    /// Take the app event receiver. Returns `None` once taken.
    pub fn take_app_events(&mut self) -> Option<AppEventReceiver> {
        self.app_event_receiver.take()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn source_kind(&self) -> Option<&SourceKind> {
        self.source_kind.as_ref()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl Drop for IngestRuntime {
    fn drop(&mut self) {
        if self.running {
            // Abort tasks if the runtime is dropped while running
            if let Some(ref handle) = self.source_handle {
                handle.abort();
            }
            if let Some(ref handle) = self.ingest_handle {
                handle.abort();
            }
        }
    }
}

async fn join_with_grace(name: &str, handle: JoinHandle<Result<()>>) {
    let abort_handle = handle.abort_handle();
    match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
        Ok(Ok(Ok(()))) => debug!("{} task exited cleanly", name),
        Ok(Ok(Err(err))) => warn!("{} task exited with error: {}", name, err),
        Ok(Err(join_err)) => warn!("{} task panicked: {}", name, join_err),
        Err(_) => {
            warn!(
                "{} task did not stop within {:?}, aborting",
                name, SHUTDOWN_GRACE
            );
            abort_handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolscope_core::MockSourceTask;

    #[tokio::test]
    async fn test_runtime_lifecycle() {
        let mut runtime = IngestRuntime::new(PipelineConfig::default());
        assert!(!runtime.is_running());

        runtime.set_source(MockSourceTask::with_fixture()).unwrap();
        assert!(matches!(runtime.source_kind(), Some(SourceKind::Mock)));

        runtime.start().await.unwrap();
        assert!(runtime.is_running());
        assert!(runtime.command_sender().is_some());

        runtime.shutdown().await.unwrap();
        assert!(!runtime.is_running());
        assert!(runtime.command_sender().is_none());

        // second shutdown is a no-op
        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_without_source_fails() {
        let mut runtime = IngestRuntime::new(PipelineConfig::default());
        let err = runtime.start().await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn test_double_start_fails() {
        let mut runtime = IngestRuntime::new(PipelineConfig::default());
        runtime.set_source(MockSourceTask::new(Vec::new())).unwrap();
        runtime.start().await.unwrap();

        let err = runtime.start().await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_set_source_twice_fails() {
        let mut runtime = IngestRuntime::new(PipelineConfig::default());
        runtime.set_source(MockSourceTask::new(Vec::new())).unwrap();

        let err = runtime
            .set_source(MockSourceTask::new(Vec::new()))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_subscribe_before_start_fails() {
        let runtime = IngestRuntime::new(PipelineConfig::default());
        let err = runtime.subscribe("token", "pools.>").await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_at_start() {
        let mut config = PipelineConfig::default();
        config.channels.command_buffer_size = 0;

        let mut runtime = IngestRuntime::new(config);
        runtime.set_source(MockSourceTask::new(Vec::new())).unwrap();

        let err = runtime.start().await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
        assert!(!runtime.is_running());
    }
}
