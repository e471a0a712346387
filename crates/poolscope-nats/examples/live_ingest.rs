//! Live Ingest Example
//!
//! Connects the ingest pipeline to a real NATS server with JetStream enabled
//! and prints every batch until interrupted. Requires a running server:
//!
//! ```text
//! nats-server -js
//! NATS_URL=nats://localhost:4222 NATS_TOKEN=secret \
//!     cargo run --example live_ingest
//! ```

use poolscope_core::{AppEvent, PipelineConfig};
use poolscope_nats::{NatsConfig, NatsSourceTask};
use poolscope_runtime::IngestRuntime;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let _ = tracing_subscriber::fmt::try_init();

    let mut nats_config = NatsConfig::default();
    if let Ok(url) = std::env::var("NATS_URL") {
        nats_config.url = url;
    }
    let token = std::env::var("NATS_TOKEN").unwrap_or_default();

    let mut runtime = IngestRuntime::new(PipelineConfig::default());
    runtime.set_source(NatsSourceTask::new(nats_config)?)?;
    runtime.start().await?;

    let mut app_events = runtime
        .take_app_events()
        .ok_or("app event receiver already taken")?;
    runtime.subscribe(token, "poolscope.pools.>").await?;

    println!("Listening on 'poolscope.pools.>' (Ctrl-C to stop)");
    loop {
        tokio::select! {
            received = app_events.recv() => match received {
                Some(AppEvent::MessageBatch { events }) => {
                    for event in events {
                        println!("[{}] {} {}", event.timestamp, event.subject, event.payload);
                    }
                }
                Some(AppEvent::Error { text, detail }) => {
                    eprintln!("error: {} ({})", text, detail);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    runtime.shutdown().await?;
    Ok(())
}
