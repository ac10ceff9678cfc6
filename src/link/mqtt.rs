//! MQTT transport over rumqttc
//!
//! Every `connect` builds a fresh `AsyncClient`/`EventLoop` pair; rumqttc's
//! own reconnect-on-poll is never used, the managed link owns retries.

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
};
use std::time::Duration;
use tokio::time::timeout;
use tracing::trace;

use super::error::{LinkError, LinkResult};
use super::session::{Connector, Delivery, Endpoint, Session};

/// Pending requests between client handle and event loop
const REQUEST_CHANNEL_CAPACITY: usize = 256;

/// Crowd density events carry whole grids
const MAX_PACKET_SIZE: usize = 256 * 1024;

/// How long `close` waits for the DISCONNECT to go out
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Connects to MQTT brokers with QoS 1 subscriptions and publishes
#[derive(Debug, Clone, Copy, Default)]
pub struct MqttConnector;

#[async_trait]
impl Connector for MqttConnector {
    async fn connect(&self, endpoint: &Endpoint, client_id: &str) -> LinkResult<Box<dyn Session>> {
        let mut options = MqttOptions::new(client_id, endpoint.host.clone(), endpoint.port);
        options.set_keep_alive(endpoint.keep_alive);
        options.set_clean_session(true);
        options.set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);

        if let Some(creds) = &endpoint.credentials {
            options.set_credentials(creds.username.clone(), creds.password.clone());
        }

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        match timeout(endpoint.connect_timeout, await_connack(&mut eventloop)).await {
            Ok(Ok(())) => Ok(Box::new(MqttSession { client, eventloop })),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(LinkError::ConnectTimeout {
                addr: endpoint.addr(),
                secs: endpoint.connect_timeout.as_secs(),
            }),
        }
    }
}

async fn await_connack(eventloop: &mut EventLoop) -> LinkResult<()> {
    loop {
        if let Event::Incoming(Packet::ConnAck(ack)) = eventloop.poll().await? {
            return match ack.code {
                ConnectReturnCode::Success => Ok(()),
                code => Err(LinkError::Refused(format!("{:?}", code))),
            };
        }
    }
}

struct MqttSession {
    client: AsyncClient,
    eventloop: EventLoop,
}

#[async_trait]
impl Session for MqttSession {
    async fn subscribe(&mut self, topic: &str) -> LinkResult<()> {
        self.client.subscribe(topic, QoS::AtLeastOnce).await?;
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> LinkResult<()> {
        // The event loop runs on this same task, so never wait for queue space
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload)?;
        Ok(())
    }

    async fn poll(&mut self) -> LinkResult<Delivery> {
        loop {
            match self.eventloop.poll().await? {
                Event::Incoming(Packet::Publish(publish)) => {
                    return Ok(Delivery {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    });
                }
                event => trace!(?event, "MQTT event"),
            }
        }
    }

    async fn close(&mut self) {
        if self.client.try_disconnect().is_err() {
            return;
        }

        let flush = async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        let _ = timeout(CLOSE_TIMEOUT, flush).await;
    }
}
