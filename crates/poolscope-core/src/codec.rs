//! Message Decoding
//!
//! Turns raw broker messages into uniform [`PoolEvent`] records. The two
//! entry points differ only in where the timestamp comes from:
//!
//! - `decode_live`: client wall-clock at decode time (live messages carry no
//!   usable receipt metadata)
//! - `decode_durable`: broker receipt time in nanoseconds, truncated to
//!   millisecond precision
//!
//! Payload bytes must be valid UTF-8; beyond that the payload is opaque and
//! is passed through unaltered.

use crate::errors::DecodeError;
use crate::types::PoolEvent;
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Decode a live (core subscription) message.
///
/// Every decode mints a fresh id, so redelivery of an identical payload
/// yields a distinct event.
pub fn decode_live(subject: &str, payload: &[u8]) -> Result<PoolEvent, DecodeError> {
    let text = payload_text(subject, payload)?;
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    Ok(PoolEvent {
        id: Uuid::new_v4().to_string(),
        timestamp,
        subject: subject.to_string(),
        payload: text,
    })
}

/// Decode a durable (stream consumer) message.
///
/// `published_nanos` is the broker receipt time as nanoseconds since the
/// Unix epoch; sub-millisecond precision is dropped.
pub fn decode_durable(
    subject: &str,
    payload: &[u8],
    published_nanos: i128,
) -> Result<PoolEvent, DecodeError> {
    let text = payload_text(subject, payload)?;
    let timestamp = broker_nanos_to_iso(subject, published_nanos)?;
    Ok(PoolEvent {
        id: Uuid::new_v4().to_string(),
        timestamp,
        subject: subject.to_string(),
        payload: text,
    })
}

fn payload_text(subject: &str, payload: &[u8]) -> Result<String, DecodeError> {
    std::str::from_utf8(payload)
        .map(str::to_owned)
        .map_err(|_| DecodeError::PayloadNotUtf8 {
            subject: subject.to_string(),
        })
}

fn broker_nanos_to_iso(subject: &str, nanos: i128) -> Result<String, DecodeError> {
    let millis = i64::try_from(nanos / 1_000_000).map_err(|_| DecodeError::BadBrokerTimestamp {
        subject: subject.to_string(),
        nanos,
    })?;
    let datetime =
        DateTime::from_timestamp_millis(millis).ok_or_else(|| DecodeError::BadBrokerTimestamp {
            subject: subject.to_string(),
            nanos,
        })?;
    Ok(datetime.to_rfc3339_opts(SecondsFormat::Millis, true))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
