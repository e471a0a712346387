//! Integration Tests for the Ingest Pipeline
//!
//! Runs the full runtime (source task + ingest task + channels) against the
//! recorded mock source and against a scripted stub source, and checks the
//! host-visible contract: delivery shaping, error pass-through, unsubscribe
//! semantics, and graceful shutdown. No broker is involved.

use async_trait::async_trait;
use poolscope_core::{
    AppEvent, AppEventReceiver, Effect, EffectReceiver, ErrorDetail, ErrorKind, MockSourceTask,
    PipelineConfig, PoolEvent, Result, SourceEvent, SourceEventSender, SourceKind, SourceTask,
};
use poolscope_runtime::IngestRuntime;
use std::time::Duration;
use tokio::time::timeout;

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

fn test_config(immediate_count: usize, flush_window_ms: u64) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.shaper.immediate_count = immediate_count;
    config.shaper.flush_window = Duration::from_millis(flush_window_ms);
    config
}

fn recorded_events(count: usize) -> Vec<PoolEvent> {
    (0..count)
        .map(|n| {
            PoolEvent::new(
                format!("evt-{}", n),
                format!("2024-05-01T00:00:{:02}.000Z", n),
                "poolscope.pools.addition",
                serde_json::json!({
                    "address": format!("0x{:040x}", n),
                    "totalValueUSD": 1000.0 + n as f64,
                })
                .to_string(),
            )
        })
        .collect()
}

/// Receive the next app event and require it to be a message batch.
async fn next_batch(app_events: &mut AppEventReceiver, wait_ms: u64) -> Vec<PoolEvent> {
    let received = timeout(Duration::from_millis(wait_ms), app_events.recv())
        .await
        .expect("App event should arrive within timeout")
        .expect("App event channel should stay open");

    match received {
        AppEvent::MessageBatch { events } => events,
        other => panic!("Expected MessageBatch, got {:?}", other),
    }
}

/// Source that plays a fixed script of source events on every subscription
/// start. Lets tests interleave decoded events and errors deterministically.
struct ScriptedSourceTask {
    script: Vec<SourceEvent>,
    source_event_sender: Option<SourceEventSender>,
    effect_receiver: Option<EffectReceiver>,
}

impl ScriptedSourceTask {
    fn new(script: Vec<SourceEvent>) -> Self {
        Self {
            script,
            source_event_sender: None,
            effect_receiver: None,
        }
    }
}

#[async_trait]
impl SourceTask for ScriptedSourceTask {
    fn attach_channels(
        &mut self,
        source_event_sender: SourceEventSender,
        effect_receiver: EffectReceiver,
    ) -> Result<()> {
        self.source_event_sender = Some(source_event_sender);
        self.effect_receiver = Some(effect_receiver);
        Ok(())
    }

    async fn run(&mut self) -> Result<()> {
        let sender = self.source_event_sender.take().unwrap();
        let mut effects = self.effect_receiver.take().unwrap();

        while let Some(effect) = effects.recv().await {
            match effect {
                Effect::StartSubscription { .. } => {
                    for item in self.script.clone() {
                        if sender.send(item).await.is_err() {
                            return Ok(());
                        }
                    }
                }
                Effect::StopSubscription => {}
                Effect::Shutdown => break,
            }
        }
        Ok(())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Mock
    }
}

// ----------------------------------------------------------------------------
// Delivery Shaping Tests
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_mock_fixture_delivers_singletons_then_flush_batch() {
    // default shaping: 5 immediate singletons, 500ms window
    let mut runtime = IngestRuntime::new(PipelineConfig::default());
    runtime.set_source(MockSourceTask::with_fixture()).unwrap();
    runtime.start().await.unwrap();

    let mut app_events = runtime.take_app_events().unwrap();
    runtime.subscribe("dev-token", "poolscope.pools.>").await.unwrap();

    // the first five fixture events each arrive alone
    for n in 0..5 {
        let batch = next_batch(&mut app_events, 1_000).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, format!("mock-{}", n));
    }

    // the sixth is held back until the flush window elapses
    let batch = next_batch(&mut app_events, 2_000).await;
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].id, "mock-5");

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_batches_preserve_order_and_content() {
    let input = recorded_events(12);
    let mut runtime = IngestRuntime::new(test_config(3, 200));
    runtime
        .set_source(MockSourceTask::new(input.clone()))
        .unwrap();
    runtime.start().await.unwrap();

    let mut app_events = runtime.take_app_events().unwrap();
    runtime.subscribe("dev-token", "poolscope.pools.>").await.unwrap();

    let mut delivered = Vec::new();
    let mut batch_sizes = Vec::new();
    while delivered.len() < input.len() {
        let batch = next_batch(&mut app_events, 2_000).await;
        batch_sizes.push(batch.len());
        delivered.extend(batch);
    }

    // three immediate singletons, then one coalesced batch with the rest
    assert_eq!(batch_sizes, vec![1, 1, 1, 9]);
    assert_eq!(delivered, input);

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_resubscribe_replays_recording_and_restarts_shaping() {
    let input = recorded_events(2);
    let mut runtime = IngestRuntime::new(test_config(10, 500));
    runtime
        .set_source(MockSourceTask::new(input.clone()))
        .unwrap();
    runtime.start().await.unwrap();

    let mut app_events = runtime.take_app_events().unwrap();

    runtime.subscribe("dev-token", "poolscope.pools.>").await.unwrap();
    for n in 0..2 {
        let batch = next_batch(&mut app_events, 1_000).await;
        assert_eq!(batch[0].id, format!("evt-{}", n));
    }

    // subscribing again is not rejected; the recording plays from the top
    runtime.subscribe("dev-token", "poolscope.pools.>").await.unwrap();
    for n in 0..2 {
        let batch = next_batch(&mut app_events, 1_000).await;
        assert_eq!(batch[0].id, format!("evt-{}", n));
    }

    runtime.shutdown().await.unwrap();
}

// ----------------------------------------------------------------------------
// Error Pass-Through Tests
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_source_errors_surface_without_stopping_delivery() {
    let events = recorded_events(2);
    let script = vec![
        SourceEvent::MessageDecoded {
            event: events[0].clone(),
        },
        SourceEvent::Error {
            text: "Failed to decode message.".to_string(),
            detail: ErrorDetail::new(ErrorKind::Decode, "Payload is not valid UTF-8"),
        },
        SourceEvent::MessageDecoded {
            event: events[1].clone(),
        },
    ];

    let mut runtime = IngestRuntime::new(test_config(10, 500));
    runtime.set_source(ScriptedSourceTask::new(script)).unwrap();
    runtime.start().await.unwrap();

    let mut app_events = runtime.take_app_events().unwrap();
    runtime.subscribe("dev-token", "poolscope.pools.>").await.unwrap();

    let batch = next_batch(&mut app_events, 1_000).await;
    assert_eq!(batch[0].id, "evt-0");

    match timeout(Duration::from_millis(1_000), app_events.recv())
        .await
        .unwrap()
        .unwrap()
    {
        AppEvent::Error { text, detail } => {
            assert_eq!(text, "Failed to decode message.");
            assert_eq!(detail.kind, ErrorKind::Decode);
        }
        other => panic!("Expected Error app event, got {:?}", other),
    }

    // delivery continues after the error
    let batch = next_batch(&mut app_events, 1_000).await;
    assert_eq!(batch[0].id, "evt-1");

    runtime.shutdown().await.unwrap();
}

// ----------------------------------------------------------------------------
// Lifecycle Tests
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_unsubscribe_discards_buffered_events() {
    // nothing immediate, a window far longer than the test
    let mut runtime = IngestRuntime::new(test_config(0, 10_000));
    runtime
        .set_source(MockSourceTask::new(recorded_events(4)))
        .unwrap();
    runtime.start().await.unwrap();

    let mut app_events = runtime.take_app_events().unwrap();
    runtime.subscribe("dev-token", "poolscope.pools.>").await.unwrap();

    // let the replay land in the shaper buffer, then cancel
    tokio::time::sleep(Duration::from_millis(150)).await;
    runtime.unsubscribe().await.unwrap();

    let quiet = timeout(Duration::from_millis(600), app_events.recv()).await;
    assert!(quiet.is_err(), "No batch may be delivered after unsubscribe");

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_with_active_subscription_is_clean() {
    let mut runtime = IngestRuntime::new(PipelineConfig::default());
    runtime.set_source(MockSourceTask::with_fixture()).unwrap();
    runtime.start().await.unwrap();

    let mut app_events = runtime.take_app_events().unwrap();
    runtime.subscribe("dev-token", "poolscope.pools.>").await.unwrap();

    // consume part of the stream, then stop mid-flight
    let _ = next_batch(&mut app_events, 1_000).await;
    runtime.shutdown().await.unwrap();
    assert!(!runtime.is_running());

    // both tasks are gone: the app event channel drains and closes
    loop {
        match timeout(Duration::from_millis(500), app_events.recv()).await {
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(_) => panic!("App event channel should close after shutdown"),
        }
    }

    // a second shutdown is a no-op
    runtime.shutdown().await.unwrap();
}
