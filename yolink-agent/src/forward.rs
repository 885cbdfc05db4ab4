//! Optional downstream republisher
//!
//! All of the account's sensors report on one shared cloud topic, so
//! a home-automation consumer cannot subscribe per device there. The
//! forwarder republishes each event to its own topic on a local
//! broker: `{prefix}/{device-type}/{device-id}/report`.

use std::time::Duration;

use rumqttc::{AsyncClient, MqttOptions, QoS};
use tracing::{debug, warn};

use yolink_core::{DeviceRecord, Event, ForwardConfig};

const KEEP_ALIVE: Duration = Duration::from_secs(10);
const REQUEST_QUEUE: usize = 16;

pub struct Forwarder {
    client: AsyncClient,
    topic_prefix: String,
}

impl Forwarder {
    /// Connect to the downstream broker. The connection is driven by
    /// a background task; publish failures are logged, never fatal.
    pub fn start(config: &ForwardConfig) -> Self {
        let client_id = format!("yolink-agent-fwd-{}", std::process::id());
        let mut options = MqttOptions::new(client_id, &config.host, config.port);
        options.set_keep_alive(KEEP_ALIVE);
        if let (Some(user), Some(password)) = (&config.user, &config.password) {
            options.set_credentials(user, password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_QUEUE);

        // rumqttc only sends queued publishes while its event loop is
        // being polled
        tokio::spawn(async move {
            loop {
                if let Err(e) = eventloop.poll().await {
                    warn!(error = %e, "downstream broker connection error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        });

        Self {
            client,
            topic_prefix: config.topic_prefix.clone(),
        }
    }

    fn topic_for(prefix: &str, record: &DeviceRecord) -> String {
        format!("{}/{}/{}/report", prefix, record.raw_type, record.device_id)
    }

    /// Republish one event under the device's own topic
    pub async fn publish(
        &self,
        record: &DeviceRecord,
        event: &Event,
    ) -> Result<(), rumqttc::ClientError> {
        let topic = Self::topic_for(&self.topic_prefix, record);
        debug!(%topic, "forwarding event");
        self.client
            .publish(topic, QoS::AtLeastOnce, false, event.raw.clone())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yolink_core::DeviceKind;

    #[test]
    fn test_topic_layout() {
        let record = DeviceRecord {
            device_id: "d88b4c0100001234".to_string(),
            name: "front door".to_string(),
            kind: Some(DeviceKind::Door),
            raw_type: "DoorSensor".to_string(),
            token: "tok".to_string(),
        };
        assert_eq!(
            Forwarder::topic_for("yolink", &record),
            "yolink/DoorSensor/d88b4c0100001234/report"
        );
    }
}
