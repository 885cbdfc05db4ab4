//! Per-message event handling
//!
//! Decodes each inbound payload, labels it against the device
//! registry and emits one log line per event. Decode failures and
//! events from devices outside the configured list are skipped
//! without touching the subscription.

use tracing::{debug, info, warn};

use yolink_core::{DeviceRegistry, Event};

use crate::forward::Forwarder;

pub struct EventHandler {
    registry: DeviceRegistry,
    forwarder: Option<Forwarder>,
    received: u64,
}

impl EventHandler {
    pub fn new(registry: DeviceRegistry, forwarder: Option<Forwarder>) -> Self {
        Self {
            registry,
            forwarder,
            received: 0,
        }
    }

    /// Events handled so far
    pub fn received(&self) -> u64 {
        self.received
    }

    pub async fn handle(&mut self, payload: &[u8]) {
        let event = match Event::decode(payload) {
            Ok(event) => event,
            Err(e) => {
                // Non-fatal: log and wait for the next message
                warn!(error = %e, "skipping message that does not decode");
                return;
            }
        };

        let record = self.registry.get(&event.device_id);
        if record.is_none() && !self.registry.is_empty() {
            // The account topic carries every device; only the
            // configured ones are interesting
            debug!(device_id = %event.device_id, "ignoring event from unlisted device");
            return;
        }
        self.received += 1;

        let name = record.map(|r| r.name.as_str()).unwrap_or("unknown");
        let summary = record
            .and_then(|r| r.kind)
            .and_then(|kind| kind.summarize(&event.data))
            .or_else(|| event.state().map(str::to_string));

        info!(
            device = %name,
            device_id = %event.device_id,
            event = %event.event_type,
            state = summary.as_deref().unwrap_or("-"),
            "sensor event"
        );

        if let (Some(forwarder), Some(record)) = (&self.forwarder, record) {
            if let Err(e) = forwarder.publish(record, &event).await {
                warn!(error = %e, "failed to forward event downstream");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yolink_core::{DeviceKind, DeviceRecord};

    fn registry_with_door() -> DeviceRegistry {
        let mut registry = DeviceRegistry::new();
        registry.insert(DeviceRecord {
            device_id: "door-1".to_string(),
            name: "front door".to_string(),
            kind: Some(DeviceKind::Door),
            raw_type: "DoorSensor".to_string(),
            token: "tok".to_string(),
        });
        registry
    }

    fn report(device_id: &str, state: &str) -> Vec<u8> {
        serde_json::json!({
            "event": "DoorSensor.Alert",
            "time": 1634174176389i64,
            "data": {"state": state},
            "deviceId": device_id
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn test_one_event_per_valid_payload() {
        let mut handler = EventHandler::new(registry_with_door(), None);

        for state in ["open", "closed", "open", "closed", "open"] {
            handler.handle(&report("door-1", state)).await;
        }
        assert_eq!(handler.received(), 5);
    }

    #[tokio::test]
    async fn test_malformed_payload_does_not_block_later_ones() {
        let mut handler = EventHandler::new(registry_with_door(), None);

        handler.handle(&report("door-1", "open")).await;
        handler.handle(b"not json at all").await;
        handler.handle(&report("door-1", "closed")).await;

        assert_eq!(handler.received(), 2);
    }

    #[tokio::test]
    async fn test_unlisted_device_is_filtered() {
        let mut handler = EventHandler::new(registry_with_door(), None);

        handler.handle(&report("someone-elses-sensor", "open")).await;
        assert_eq!(handler.received(), 0);

        handler.handle(&report("door-1", "open")).await;
        assert_eq!(handler.received(), 1);
    }

    #[tokio::test]
    async fn test_empty_registry_accepts_everything() {
        let mut handler = EventHandler::new(DeviceRegistry::new(), None);

        handler.handle(&report("anything", "open")).await;
        handler.handle(&report("whatever", "closed")).await;
        assert_eq!(handler.received(), 2);
    }
}
