//! The one long-lived broker connection
//!
//! Credentials are the account id and the session token issued by the
//! auth client. The subscriber owns the connection for the life of
//! the process and feeds every publish to the handler in receipt
//! order; any connection failure ends the process.

use std::time::Duration;

use rumqttc::{AsyncClient, ConnectionError, Event, MqttOptions, Packet, QoS};
use thiserror::Error;
use tracing::{debug, info};

use yolink_core::Session;

use crate::handler::EventHandler;

const KEEP_ALIVE: Duration = Duration::from_secs(10);
const REQUEST_QUEUE: usize = 16;

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("broker rejected the session token: {0}")]
    Unauthorized(rumqttc::ConnectionError),

    #[error("broker connection lost: {0}")]
    Connection(rumqttc::ConnectionError),

    #[error("subscribe request failed: {0}")]
    Request(#[from] rumqttc::ClientError),
}

pub struct EventSubscriber {
    client: AsyncClient,
    eventloop: rumqttc::EventLoop,
    topic: String,
}

impl EventSubscriber {
    pub fn new(session: &Session) -> Self {
        let client_id = format!("yolink-agent-{}", std::process::id());
        let mut options = MqttOptions::new(client_id, &session.broker_host, session.broker_port);
        options.set_credentials(&session.csid, &session.access_token);
        options.set_keep_alive(KEEP_ALIVE);

        let (client, eventloop) = AsyncClient::new(options, REQUEST_QUEUE);

        Self {
            client,
            eventloop,
            topic: session.topic.clone(),
        }
    }

    /// Subscribe and pump messages into the handler. Returns only
    /// when the connection fails.
    pub async fn run(mut self, handler: &mut EventHandler) -> Result<(), SubscribeError> {
        // Queued by the client, sent once the connection is up
        self.client
            .subscribe(self.topic.clone(), QoS::AtLeastOnce)
            .await?;

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!(code = ?ack.code, "connected to cloud broker");
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    debug!(topic = %self.topic, "subscription acknowledged");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    handler.handle(&publish.payload).await;
                }
                Ok(_) => {}
                Err(e @ ConnectionError::ConnectionRefused(_)) => {
                    // ConnAck refusal: bad or stale token
                    return Err(SubscribeError::Unauthorized(e));
                }
                Err(e) => return Err(SubscribeError::Connection(e)),
            }
        }
    }
}
