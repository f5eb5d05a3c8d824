//! Events and their two wire encodings.
//!
//! Both channels wrap an event in the same outer record,
//! `{ "sequenceNumber": "<decimal>", "data": "<string>" }`, but encode `data`
//! differently:
//!
//! | Channel | `data` |
//! |---------|--------|
//! | archive | JSON text of `{ "type", "data" }`, one record per line |
//! | live    | base64 of that same JSON text |

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EnvelopeError;
use crate::sequence::SequenceNumber;

/// A decoded application event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    event_type: String,
    data: Value,
}

impl Event {
    /// Builds an event, rejecting an empty type.
    pub fn new(event_type: impl Into<String>, data: Value) -> Result<Self, EnvelopeError> {
        let event_type = event_type.into();
        if event_type.trim().is_empty() {
            return Err(EnvelopeError::MissingEventType);
        }
        Ok(Self { event_type, data })
    }

    /// Decodes an event from its JSON object form. A missing `data` field
    /// becomes `null`.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        let Value::Object(mut fields) = value else {
            return Err(EnvelopeError::EventNotObject);
        };
        let event_type = match fields.remove("type") {
            Some(Value::String(t)) => t,
            _ => return Err(EnvelopeError::MissingEventType),
        };
        let data = fields.remove("data").unwrap_or(Value::Null);
        Self::new(event_type, data)
    }

    fn from_json_slice(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_slice(bytes).map_err(EnvelopeError::MalformedEvent)?;
        Self::from_value(value)
    }

    /// The event type, used as the handler lookup key.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The opaque payload handed to the handler.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Consumes the event, returning its payload.
    pub fn into_data(self) -> Value {
        self.data
    }
}

/// The outer record shared by both channels.
#[derive(Debug, Deserialize)]
struct WireRecord {
    #[serde(rename = "sequenceNumber")]
    sequence_number: Option<String>,
    data: Option<String>,
}

impl WireRecord {
    fn parse(bytes: &[u8]) -> Result<(SequenceNumber, String), EnvelopeError> {
        let record: WireRecord =
            serde_json::from_slice(bytes).map_err(EnvelopeError::MalformedEnvelope)?;
        let sequence_number = match record.sequence_number {
            Some(s) if !s.is_empty() => s.parse::<SequenceNumber>()?,
            _ => return Err(EnvelopeError::MissingSequenceNumber),
        };
        let data = match record.data {
            Some(d) if !d.is_empty() => d,
            _ => return Err(EnvelopeError::MissingData),
        };
        Ok((sequence_number, data))
    }
}

/// A sequence number paired with the event it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Position of the event in the stream.
    pub sequence_number: SequenceNumber,
    /// The decoded event.
    pub event: Event,
}

impl Envelope {
    /// Decodes one line of an archived object.
    pub fn from_archive_line(line: &str) -> Result<Self, EnvelopeError> {
        let (sequence_number, data) = WireRecord::parse(line.as_bytes())?;
        let event = Event::from_json_slice(data.as_bytes())?;
        Ok(Self {
            sequence_number,
            event,
        })
    }

    /// Decodes the body of a live push request.
    pub fn from_live_body(body: &[u8]) -> Result<Self, EnvelopeError> {
        let (sequence_number, data) = WireRecord::parse(body)?;
        let decoded = STANDARD.decode(data.as_bytes())?;
        let event = Event::from_json_slice(&decoded)?;
        Ok(Self {
            sequence_number,
            event,
        })
    }
}
