//! Subscription Routing and Consumption
//!
//! [`route`] decides, purely from the declared stream specs, whether a
//! subject is consumed durably (pull consumer on its stream) or live (plain
//! core subscription). [`ActiveSubscription`] owns whichever consumption
//! handle the verdict called for and yields raw messages one at a time; the
//! source task decodes them via [`RawMessage::decode`] outside the
//! cancellation window of its select loop.

use async_nats::jetstream::consumer::pull;
use async_nats::jetstream::{self, consumer::PullConsumer};
use async_nats::Client;
use futures::StreamExt;
use poolscope_core::codec::{decode_durable, decode_live};
use poolscope_core::{
    BrokerError, DecodeError, PipelineError, PoolEvent, StreamSpec, SubscriptionKind,
};
use tracing::{debug, info};

// ----------------------------------------------------------------------------
// Routing
// ----------------------------------------------------------------------------

/// Route a subject against the declared specs. Durable iff some spec's
/// subject set contains the subject (exact membership, or wildcard coverage
/// when the declared pattern is hierarchical). First matching spec wins.
pub fn route(subject: &str, specs: &[StreamSpec]) -> SubscriptionKind {
    specs
        .iter()
        .find(|spec| spec.covers(subject))
        .map(|spec| SubscriptionKind::Durable {
            stream: spec.name.clone(),
        })
        .unwrap_or(SubscriptionKind::Live)
}

// ----------------------------------------------------------------------------
// Active Subscription
// ----------------------------------------------------------------------------

/// One open consumption path, live or durable.
pub(crate) enum ActiveSubscription {
    Live {
        subject: String,
        subscriber: async_nats::Subscriber,
    },
    Durable {
        subject: String,
        stream: String,
        messages: pull::Stream,
    },
}

impl ActiveSubscription {
    /// Open the consumption path the router calls for. The stream and its
    /// consumer already exist when the verdict is durable; reconciliation
    /// ran in the same subscribe cycle.
    pub(crate) async fn open(
        client: &Client,
        js: &jetstream::Context,
        subject: &str,
        specs: &[StreamSpec],
    ) -> Result<Self, PipelineError> {
        match route(subject, specs) {
            SubscriptionKind::Live => {
                let subscriber = client.subscribe(subject.to_string()).await.map_err(|err| {
                    BrokerError::Subscribe {
                        subject: subject.to_string(),
                        reason: err.to_string(),
                    }
                })?;
                info!("Opened live subscription on '{}'", subject);
                Ok(ActiveSubscription::Live {
                    subject: subject.to_string(),
                    subscriber,
                })
            }
            SubscriptionKind::Durable { stream } => {
                let mut js_stream =
                    js.get_stream(&stream)
                        .await
                        .map_err(|err| BrokerError::GetStream {
                            stream: stream.clone(),
                            reason: err.to_string(),
                        })?;

                let consumer_name = consumer_name_for(specs, &stream);
                let consumer: PullConsumer = js_stream
                    .get_or_create_consumer(
                        &consumer_name,
                        pull::Config {
                            durable_name: Some(consumer_name.clone()),
                            ..Default::default()
                        },
                    )
                    .await
                    .map_err(|err| BrokerError::Consumer {
                        stream: stream.clone(),
                        consumer: consumer_name.clone(),
                        reason: err.to_string(),
                    })?;

                let messages = consumer.messages().await.map_err(|err| BrokerError::Consumer {
                    stream: stream.clone(),
                    consumer: consumer_name.clone(),
                    reason: err.to_string(),
                })?;

                info!(
                    "Opened durable subscription on '{}' via stream '{}'",
                    subject, stream
                );
                Ok(ActiveSubscription::Durable {
                    subject: subject.to_string(),
                    stream,
                    messages,
                })
            }
        }
    }

    pub(crate) fn subject(&self) -> &str {
        match self {
            ActiveSubscription::Live { subject, .. } => subject,
            ActiveSubscription::Durable { subject, .. } => subject,
        }
    }

    /// Wait for the next raw delivery. `None` means the consumption path
    /// ended on the broker side. Cancel-safe: the only await is on the
    /// underlying message stream.
    pub(crate) async fn next_raw(&mut self) -> Option<Result<RawMessage, PipelineError>> {
        match self {
            ActiveSubscription::Live { subscriber, .. } => subscriber
                .next()
                .await
                .map(|message| Ok(RawMessage::Live(message))),
            ActiveSubscription::Durable {
                subject, messages, ..
            } => messages.next().await.map(|delivery| {
                delivery.map(RawMessage::Durable).map_err(|err| {
                    PipelineError::from(BrokerError::Consume {
                        subject: subject.clone(),
                        reason: err.to_string(),
                    })
                })
            }),
        }
    }

    /// Tear the consumption path down. Dropping the pull stream stops
    /// durable delivery; live subscriptions are unsubscribed explicitly.
    pub(crate) async fn stop(self) {
        match self {
            ActiveSubscription::Live {
                subject,
                mut subscriber,
            } => {
                if let Err(err) = subscriber.unsubscribe().await {
                    debug!("Unsubscribe from '{}' failed: {}", subject, err);
                }
                info!("Live subscription on '{}' closed", subject);
            }
            ActiveSubscription::Durable {
                subject, messages, ..
            } => {
                drop(messages);
                info!("Durable subscription on '{}' closed", subject);
            }
        }
    }
}

fn consumer_name_for(specs: &[StreamSpec], stream: &str) -> String {
    specs
        .iter()
        .find(|spec| spec.name == stream)
        .map(|spec| spec.consumer_name())
        .unwrap_or_else(|| format!("{}-pull", stream))
}

// ----------------------------------------------------------------------------
// Raw Messages
// ----------------------------------------------------------------------------

/// An undecoded delivery pulled off one of the consumption paths.
pub(crate) enum RawMessage {
    Live(async_nats::Message),
    Durable(jetstream::Message),
}

impl RawMessage {
    /// Decode into the uniform event shape. Durable messages are acked
    /// after processing whether or not decode succeeded, so a poison
    /// payload cannot wedge the consumer's cursor.
    pub(crate) async fn decode(self) -> Result<PoolEvent, PipelineError> {
        match self {
            RawMessage::Live(message) => {
                decode_live(&message.subject, &message.payload).map_err(PipelineError::from)
            }
            RawMessage::Durable(message) => {
                let decoded = match message.info() {
                    Ok(receipt) => decode_durable(
                        &message.subject,
                        &message.payload,
                        receipt.published.unix_timestamp_nanos(),
                    )
                    .map_err(PipelineError::from),
                    Err(err) => Err(PipelineError::from(DecodeError::MissingMetadata {
                        subject: message.subject.to_string(),
                        reason: err.to_string(),
                    })),
                };

                if let Err(err) = message.ack().await {
                    debug!("Ack failed on '{}': {}", message.subject, err);
                }
                decoded
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn specs() -> Vec<StreamSpec> {
        vec![
            StreamSpec::new(
                "orders",
                vec!["orders.>".to_string()],
                Duration::from_secs(3600),
            ),
            StreamSpec::new(
                "pools",
                vec!["pools.eth".to_string(), "pools.btc".to_string()],
                Duration::from_secs(3600),
            ),
        ]
    }

    #[test]
    fn test_uncovered_subject_routes_live() {
        assert_eq!(route("X.foo", &specs()), SubscriptionKind::Live);
        assert_eq!(route("pools.sol", &specs()), SubscriptionKind::Live);
    }

    #[test]
    fn test_exact_membership_routes_durable() {
        assert_eq!(
            route("pools.eth", &specs()),
            SubscriptionKind::Durable {
                stream: "pools".to_string()
            }
        );
        // the requested subject may itself be the declared wildcard pattern
        assert_eq!(
            route("orders.>", &specs()),
            SubscriptionKind::Durable {
                stream: "orders".to_string()
            }
        );
    }

    #[test]
    fn test_wildcard_coverage_routes_durable() {
        assert_eq!(
            route("orders.eu.new", &specs()),
            SubscriptionKind::Durable {
                stream: "orders".to_string()
            }
        );
    }

    #[test]
    fn test_route_is_deterministic_and_first_match_wins() {
        let overlapping = vec![
            StreamSpec::new("first", vec!["a.>".to_string()], Duration::from_secs(60)),
            StreamSpec::new("second", vec!["a.b".to_string()], Duration::from_secs(60)),
        ];
        for _ in 0..10 {
            assert_eq!(
                route("a.b", &overlapping),
                SubscriptionKind::Durable {
                    stream: "first".to_string()
                }
            );
        }
    }

    #[test]
    fn test_no_specs_routes_live() {
        assert_eq!(route("anything.at.all", &[]), SubscriptionKind::Live);
    }

    #[test]
    fn test_consumer_name_follows_spec() {
        assert_eq!(consumer_name_for(&specs(), "pools"), "pools-pull");
        assert_eq!(consumer_name_for(&specs(), "unknown"), "unknown-pull");
    }
}
