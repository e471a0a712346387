//! Mock Ingest Example
//!
//! Runs the full ingest pipeline against the recorded mock source and prints
//! every batch the host would receive. No broker required.

use poolscope_core::{AppEvent, MockSourceTask, PipelineConfig};
use poolscope_runtime::IngestRuntime;
use std::time::Duration;
use tokio::time::timeout;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let _ = tracing_subscriber::fmt::try_init();

    println!("PoolScope Mock Ingest Example");
    println!("=============================");

    let mut runtime = IngestRuntime::new(PipelineConfig::default());
    runtime.set_source(MockSourceTask::with_fixture())?;
    runtime.start().await?;

    let mut app_events = runtime
        .take_app_events()
        .ok_or("app event receiver already taken")?;
    runtime.subscribe("demo-token", "poolscope.pools.>").await?;

    // The fixture holds six events: the first five arrive alone, the sixth
    // in a coalesced batch once the flush window elapses.
    let mut batches = 0;
    let mut total = 0;
    loop {
        match timeout(Duration::from_secs(2), app_events.recv()).await {
            Ok(Some(AppEvent::MessageBatch { events })) => {
                batches += 1;
                total += events.len();
                println!("\nBatch {} ({} event(s)):", batches, events.len());
                for event in &events {
                    println!("   [{}] {} {}", event.timestamp, event.subject, event.id);
                }
            }
            Ok(Some(AppEvent::Error { text, detail })) => {
                eprintln!("error: {} ({})", text, detail);
            }
            Ok(None) => break,
            Err(_) => break, // recording drained
        }
    }

    println!("\nReceived {} event(s) in {} batch(es)", total, batches);

    runtime.unsubscribe().await?;
    runtime.shutdown().await?;
    Ok(())
}
