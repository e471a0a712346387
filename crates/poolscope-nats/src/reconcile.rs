//! Stream Reconciliation
//!
//! Drives the broker's stream configuration toward the declared
//! [`StreamSpec`] set. Runs before every subscription attempt, on a fresh
//! read of broker state.
//!
//! A broker stream survives only if a spec bears its name AND the subject
//! sets are equal (order-insensitive) AND the max-age matches. Everything
//! else is deleted; then every spec without a surviving stream is created,
//! with its default durable pull consumer attached. All deletions happen
//! before any creation.
//!
//! The decision is a pure function over `(current, desired)` so the
//! interesting properties hold by construction and are tested without a
//! broker: planning against a converged broker yields an empty plan, and
//! applying a plan then re-planning yields an empty plan.

use async_nats::jetstream::consumer::pull;
use async_nats::jetstream::{self, stream};
use futures::TryStreamExt;
use poolscope_core::{BrokerError, Result, StreamSpec};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

// ----------------------------------------------------------------------------
// Broker-Side State
// ----------------------------------------------------------------------------

/// Configuration of one stream as it exists on the broker right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamState {
    pub name: String,
    pub subjects: Vec<String>,
    pub max_age: Duration,
}

impl StreamState {
    pub fn new(name: impl Into<String>, subjects: Vec<String>, max_age: Duration) -> Self {
        Self {
            name: name.into(),
            subjects,
            max_age,
        }
    }
}

// ----------------------------------------------------------------------------
// Planning (pure)
// ----------------------------------------------------------------------------

/// Actions that bring the broker in line with the declared specs.
/// Deletions are applied before creations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub delete: Vec<String>,
    pub create: Vec<StreamSpec>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.create.is_empty()
    }
}

/// Compute the plan for the given broker state and declared specs.
pub fn plan(current: &[StreamState], desired: &[StreamSpec]) -> ReconcilePlan {
    let mut delete = Vec::new();
    let mut kept: Vec<&str> = Vec::new();

    for state in current {
        match desired.iter().find(|spec| spec.name == state.name) {
            Some(spec) if !is_outdated(state, spec) => kept.push(state.name.as_str()),
            _ => delete.push(state.name.clone()),
        }
    }

    let create = desired
        .iter()
        .filter(|spec| !kept.contains(&spec.name.as_str()))
        .cloned()
        .collect();

    ReconcilePlan { delete, create }
}

fn is_outdated(state: &StreamState, spec: &StreamSpec) -> bool {
    !same_subject_set(&state.subjects, &spec.subjects) || state.max_age != spec.max_age
}

/// Order-insensitive subject set equality. Both sides are deduplicated
/// first, so a repeated subject never masks a real difference.
fn same_subject_set(a: &[String], b: &[String]) -> bool {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    a == b
}

// ----------------------------------------------------------------------------
// Application (broker I/O)
// ----------------------------------------------------------------------------

/// Summary of one reconciliation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub deleted: usize,
    pub created: usize,
    pub kept: usize,
}

/// Read broker state, plan, and apply. Any failure aborts the cycle and the
/// caller abandons its subscribe attempt; broker state is left as-is and
/// the next cycle starts over from a fresh read.
pub async fn reconcile_streams(
    js: &jetstream::Context,
    desired: &[StreamSpec],
) -> Result<ReconcileReport> {
    let current = list_streams(js).await?;
    let actions = plan(&current, desired);
    let kept = current.len() - actions.delete.len();

    if actions.is_empty() {
        debug!("Stream configuration already converged ({} streams)", kept);
        return Ok(ReconcileReport {
            deleted: 0,
            created: 0,
            kept,
        });
    }

    let report = ReconcileReport {
        deleted: actions.delete.len(),
        created: actions.create.len(),
        kept,
    };
    apply(js, &actions).await?;
    info!(
        "Reconciled streams: {} deleted, {} created, {} kept",
        report.deleted, report.created, report.kept
    );
    Ok(report)
}

async fn list_streams(js: &jetstream::Context) -> Result<Vec<StreamState>> {
    let mut streams = js.streams();
    let mut current = Vec::new();
    while let Some(stream_info) = streams
        .try_next()
        .await
        .map_err(|err| BrokerError::ListStreams {
            reason: err.to_string(),
        })?
    {
        current.push(StreamState {
            name: stream_info.config.name.clone(),
            subjects: stream_info
                .config
                .subjects
                .iter()
                .map(|subject| subject.to_string())
                .collect(),
            max_age: stream_info.config.max_age,
        });
    }
    Ok(current)
}

async fn apply(js: &jetstream::Context, actions: &ReconcilePlan) -> Result<()> {
    for name in &actions.delete {
        js.delete_stream(name)
            .await
            .map_err(|err| BrokerError::DeleteStream {
                stream: name.clone(),
                reason: err.to_string(),
            })?;
        info!("Deleted outdated stream '{}'", name);
    }

    for spec in &actions.create {
        let mut created = js
            .create_stream(stream_config(spec))
            .await
            .map_err(|err| BrokerError::CreateStream {
                stream: spec.name.clone(),
                reason: err.to_string(),
            })?;

        let consumer_name = spec.consumer_name();
        created
            .get_or_create_consumer(
                &consumer_name,
                pull::Config {
                    durable_name: Some(consumer_name.clone()),
                    ..Default::default()
                },
            )
            .await
            .map_err(|err| BrokerError::Consumer {
                stream: spec.name.clone(),
                consumer: consumer_name.clone(),
                reason: err.to_string(),
            })?;
        info!(
            "Created stream '{}' with consumer '{}'",
            spec.name, consumer_name
        );
    }

    Ok(())
}

pub(crate) fn stream_config(spec: &StreamSpec) -> stream::Config {
    stream::Config {
        name: spec.name.clone(),
        subjects: spec.subjects.iter().cloned().map(Into::into).collect(),
        max_age: spec.max_age,
        ..Default::default()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, subjects: &[&str], max_age_secs: u64) -> StreamSpec {
        StreamSpec::new(
            name,
            subjects.iter().map(|s| s.to_string()).collect(),
            Duration::from_secs(max_age_secs),
        )
    }

    fn state(name: &str, subjects: &[&str], max_age_secs: u64) -> StreamState {
        StreamState::new(
            name,
            subjects.iter().map(|s| s.to_string()).collect(),
            Duration::from_secs(max_age_secs),
        )
    }

    /// Apply a plan to a model of broker state, the way the broker would.
    fn simulate(current: &[StreamState], actions: &ReconcilePlan) -> Vec<StreamState> {
        let mut next: Vec<StreamState> = current
            .iter()
            .filter(|s| !actions.delete.contains(&s.name))
            .cloned()
            .collect();
        for spec in &actions.create {
            next.push(StreamState::new(
                spec.name.clone(),
                spec.subjects.clone(),
                spec.max_age,
            ));
        }
        next
    }

    #[test]
    fn test_converged_broker_yields_empty_plan() {
        let desired = [spec("orders", &["orders.>"], 3600)];
        let current = [state("orders", &["orders.>"], 3600)];
        assert!(plan(&current, &desired).is_empty());
    }

    #[test]
    fn test_subject_order_does_not_matter() {
        let desired = [spec("orders", &["a", "b"], 3600)];
        let current = [state("orders", &["b", "a"], 3600)];
        assert!(plan(&current, &desired).is_empty());
    }

    #[test]
    fn test_unmatched_stream_is_deleted() {
        let desired = [spec("orders", &["orders.>"], 3600)];
        let current = [
            state("orders", &["orders.>"], 3600),
            state("leftover", &["junk.>"], 60),
        ];
        let actions = plan(&current, &desired);
        assert_eq!(actions.delete, vec!["leftover".to_string()]);
        assert!(actions.create.is_empty());
    }

    #[test]
    fn test_subject_set_change_recreates_stream() {
        let desired = [spec("orders", &["a", "b"], 3600)];
        let current = [state("orders", &["a"], 3600)];
        let actions = plan(&current, &desired);
        assert_eq!(actions.delete, vec!["orders".to_string()]);
        assert_eq!(actions.create, vec![desired[0].clone()]);
    }

    #[test]
    fn test_max_age_change_recreates_stream() {
        let desired = [spec("orders", &["a"], 7200)];
        let current = [state("orders", &["a"], 3600)];
        let actions = plan(&current, &desired);
        assert_eq!(actions.delete, vec!["orders".to_string()]);
        assert_eq!(actions.create.len(), 1);
    }

    #[test]
    fn test_empty_broker_creates_everything() {
        let desired = [spec("orders", &["a"], 3600), spec("pools", &["p.>"], 60)];
        let actions = plan(&[], &desired);
        assert!(actions.delete.is_empty());
        assert_eq!(actions.create.len(), 2);
    }

    #[test]
    fn test_plan_is_idempotent_after_application() {
        let desired = [
            spec("orders", &["orders.>", "audit.orders"], 3600),
            spec("pools", &["pools.>"], 172_800),
        ];
        let current = [
            state("orders", &["orders.>"], 3600), // subject set drifted
            state("stale", &["old.>"], 60),       // no longer declared
        ];

        let first = plan(&current, &desired);
        assert_eq!(first.delete.len(), 2);
        assert_eq!(first.create.len(), 2);

        let converged = simulate(&current, &first);
        assert!(plan(&converged, &desired).is_empty());
        // and once converged it stays converged
        let again = simulate(&converged, &plan(&converged, &desired));
        assert!(plan(&again, &desired).is_empty());
    }

    #[test]
    fn test_subject_count_difference_is_outdated() {
        // same elements plus an extra one is not set-equal
        assert!(is_outdated(
            &state("s", &["a", "b", "c"], 60),
            &spec("s", &["a", "b"], 60)
        ));
        assert!(is_outdated(
            &state("s", &["a"], 60),
            &spec("s", &["a", "b"], 60)
        ));
    }

    #[test]
    fn test_duplicate_subjects_compare_as_distinct_sets() {
        // a repeated subject must not hide a real difference behind equal
        // list lengths
        let actions = plan(
            &[state("orders", &["a", "b"], 60)],
            &[spec("orders", &["a", "a"], 60)],
        );
        assert_eq!(actions.delete, vec!["orders".to_string()]);
        assert_eq!(actions.create.len(), 1);

        // duplication alone changes nothing once deduplicated
        assert!(!is_outdated(
            &state("s", &["a", "a"], 60),
            &spec("s", &["a"], 60)
        ));
    }

    #[test]
    fn test_stream_config_mapping() {
        let stream_spec = spec("pools", &["pools.>"], 172_800);
        let config = stream_config(&stream_spec);
        assert_eq!(config.name, "pools");
        assert_eq!(config.max_age, Duration::from_secs(172_800));
        assert_eq!(config.subjects.len(), 1);
    }
}
