//! Decoding of raw broker payloads
//!
//! The cloud broker delivers one JSON document per state change:
//!
//! ```json
//! {
//!   "event": "DoorSensor.Alert",
//!   "time": 1634174176389,
//!   "msgid": "1634174176388",
//!   "data": { "state": "open", "battery": 4 },
//!   "deviceId": "d88b4c0100001234"
//! }
//! ```
//!
//! A payload that does not fit this shape is a [`DecodeError`]; the
//! caller logs it and moves on to the next message.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not UTF-8 text")]
    NotUtf8,

    #[error("payload is not a report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload carries no device id")]
    MissingDeviceId,
}

/// One decoded device state change. Consumed once; never persisted.
#[derive(Debug, Clone)]
pub struct Event {
    /// Id of the reporting device
    pub device_id: String,

    /// Vendor event type, e.g. `DoorSensor.Alert`
    pub event_type: String,

    /// When the device reported, from the vendor's millisecond clock
    pub timestamp: Option<DateTime<Utc>>,

    /// Sensor readings (`state`, `battery`, ...)
    pub data: serde_json::Value,

    /// Original payload text, kept for downstream forwarding
    pub raw: String,
}

#[derive(Debug, Deserialize)]
struct WireReport {
    #[serde(rename = "deviceId")]
    device_id: String,
    event: String,
    #[serde(default)]
    time: Option<i64>,
    #[serde(default)]
    data: serde_json::Value,
}

impl Event {
    /// Decode one raw broker payload
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(payload).map_err(|_| DecodeError::NotUtf8)?;
        let report: WireReport = serde_json::from_str(text)?;

        if report.device_id.is_empty() {
            return Err(DecodeError::MissingDeviceId);
        }

        Ok(Event {
            device_id: report.device_id,
            event_type: report.event,
            timestamp: report
                .time
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            data: report.data,
            raw: text.to_string(),
        })
    }

    /// Raw `state` field, when the report carries one
    pub fn state(&self) -> Option<&str> {
        self.data.get("state").and_then(|v| v.as_str())
    }
}
