use std::future::Future;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, LastWill, MqttOptions, QoS};
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::bridge::Publisher;
use crate::config::Config;

use super::ConnectionEvent;

pub struct MqttClient {
    client: AsyncClient,
    eventloop: EventLoop,
    status_topic: String,
}

/// Cloneable publish handle owned by the poll loop.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl Publisher for MqttPublisher {
    /// Never waits: when the request queue is full (broker unreachable) the
    /// message is dropped.
    fn publish(&self, topic: String, payload: String, qos: QoS) -> impl Future<Output = ()> + Send {
        if let Err(e) = self.client.try_publish(&topic, qos, false, payload) {
            warn!("Dropped publish to {}: {}", topic, e);
        }
        std::future::ready(())
    }
}

impl MqttClient {
    pub fn new(config: &Config) -> Self {
        let mut mqttopts = MqttOptions::new(
            &config.mqtt.client_id,
            &config.mqtt.broker_host,
            config.mqtt.broker_port,
        );
        mqttopts.set_keep_alive(Duration::from_secs(30));

        if let (Some(user), Some(pass)) = (&config.mqtt.username, &config.mqtt.password) {
            mqttopts.set_credentials(user, pass);
        }

        let status_topic = config.bridge_status_topic();
        mqttopts.set_last_will(LastWill::new(
            &status_topic,
            "offline".as_bytes().to_vec(),
            QoS::AtLeastOnce,
            true,
        ));

        let (client, eventloop) = AsyncClient::new(mqttopts, 100);

        Self {
            client,
            eventloop,
            status_topic,
        }
    }

    pub fn publisher(&self) -> MqttPublisher {
        MqttPublisher {
            client: self.client.clone(),
        }
    }

    /// Drive the MQTT event loop, which performs the actual network I/O for
    /// every publish. Connection-level notifications go to `events`.
    pub async fn run(mut self, events: mpsc::Sender<ConnectionEvent>) {
        loop {
            let event = match self.eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                    // This task is the only consumer of the request queue, so
                    // waiting for space here would never return.
                    if let Err(e) =
                        self.client
                            .try_publish(&self.status_topic, QoS::AtLeastOnce, true, "online")
                    {
                        error!("Failed to publish online status: {}", e);
                    }
                    ConnectionEvent::Connected {
                        code: format!("{:?}", ack.code),
                    }
                }
                Ok(Event::Incoming(Incoming::PubAck(ack))) => {
                    ConnectionEvent::PublishAcknowledged { pkid: ack.pkid }
                }
                Ok(_) => continue,
                Err(e) => {
                    let _ = events
                        .send(ConnectionEvent::Disconnected {
                            reason: e.to_string(),
                        })
                        .await;
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            if events.send(event).await.is_err() {
                warn!("Connection event channel closed");
            }
        }
    }
}
