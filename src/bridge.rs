//! Poll the controller and republish its state over MQTT.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use rumqttc::QoS;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::tsmart::codec::{decode_control_response, encode_request};
use crate::tsmart::{DeviceState, RequestKind, transport};

const CONTROL_READ_REQUEST: [u8; 4] = encode_request(RequestKind::ControlRead);

/// Sink for state messages. Delivery is the implementor's concern; the loop
/// never waits for acknowledgement or retries.
pub trait Publisher {
    fn publish(&self, topic: String, payload: String, qos: QoS) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub device: SocketAddr,
    pub local: SocketAddr,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub retry_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Polling,
    Idle(Duration),
}

/// Topic suffix and payload for every published field.
/// `power` is decoded but deliberately not published.
pub fn publish_values(state: &DeviceState) -> [(&'static str, String); 4] {
    [
        ("mode", state.mode.to_string()),
        ("temperature", format!("{:.1}", state.current_temperature)),
        ("setpoint", format!("{:.1}", state.set_point)),
        ("heating", if state.heating { "1" } else { "0" }.to_string()),
    ]
}

pub struct PollLoop<P> {
    publisher: P,
    settings: PollSettings,
    topic_prefix: String,
}

impl<P: Publisher> PollLoop<P> {
    pub fn new(publisher: P, settings: PollSettings, topic_prefix: String) -> Self {
        Self {
            publisher,
            settings,
            topic_prefix,
        }
    }

    /// Runs for the life of the process. Only one device request is ever in
    /// flight.
    pub async fn run(&self) {
        let mut state = LoopState::Polling;
        loop {
            state = self.step(state).await;
        }
    }

    pub async fn step(&self, state: LoopState) -> LoopState {
        match state {
            LoopState::Polling => match self.poll_once().await {
                Ok(device_state) => {
                    info!(
                        "T-Smart status: temperature={:.1}°C set_point={:.1}°C mode={} heating={} power={}",
                        device_state.current_temperature,
                        device_state.set_point,
                        device_state.mode,
                        device_state.heating,
                        device_state.power,
                    );
                    self.publish(&device_state).await;
                    LoopState::Idle(self.settings.poll_interval)
                }
                Err(e) => {
                    warn!(
                        "Control read from {} failed: {}. Retrying in {:?}",
                        self.settings.device.ip(),
                        e,
                        self.settings.retry_delay
                    );
                    LoopState::Idle(self.settings.retry_delay)
                }
            },
            LoopState::Idle(delay) => {
                tokio::time::sleep(delay).await;
                LoopState::Polling
            }
        }
    }

    pub async fn poll_once(&self) -> Result<DeviceState> {
        debug!("Polling control data from {}", self.settings.device);
        let raw = transport::send_and_await(
            self.settings.device,
            &CONTROL_READ_REQUEST,
            self.settings.local,
            self.settings.timeout,
        )
        .await?;
        decode_control_response(&raw)
    }

    async fn publish(&self, state: &DeviceState) {
        for (suffix, payload) in publish_values(state) {
            let topic = format!("{}/{}", self.topic_prefix, suffix);
            self.publisher.publish(topic, payload, QoS::AtLeastOnce).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::Error;
    use crate::tsmart::testing::{CONTROL_FIXTURE, silent_device, spawn_responder};

    #[derive(Clone, Default)]
    struct RecordingPublisher {
        calls: Arc<Mutex<Vec<(String, String, QoS)>>>,
    }

    impl RecordingPublisher {
        fn calls(&self) -> Vec<(String, String, QoS)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Publisher for RecordingPublisher {
        fn publish(&self, topic: String, payload: String, qos: QoS) -> impl Future<Output = ()> + Send {
            self.calls.lock().unwrap().push((topic, payload, qos));
            async {}
        }
    }

    fn settings(device: SocketAddr) -> PollSettings {
        PollSettings {
            device,
            local: "127.0.0.1:0".parse().unwrap(),
            timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(30),
            retry_delay: Duration::from_millis(10),
        }
    }

    fn expected_cycle() -> Vec<(String, String, QoS)> {
        [
            ("house/immersion/mode", "2"),
            ("house/immersion/temperature", "37.7"),
            ("house/immersion/setpoint", "10.0"),
            ("house/immersion/heating", "1"),
        ]
        .into_iter()
        .map(|(t, v)| (t.to_string(), v.to_string(), QoS::AtLeastOnce))
        .collect()
    }

    #[test]
    fn publish_values_format() {
        let state = DeviceState {
            current_temperature: -3.0,
            set_point: 55.25,
            mode: 7,
            heating: false,
            power: true,
        };
        let values = publish_values(&state);
        assert_eq!(values[0], ("mode", "7".to_string()));
        assert_eq!(values[1], ("temperature", "-3.0".to_string()));
        assert_eq!(values[2].0, "setpoint");
        assert_eq!(values[2].1.len(), 4);
        assert_eq!(values[3], ("heating", "0".to_string()));
        assert!(values.iter().all(|(suffix, _)| *suffix != "power"));
    }

    #[tokio::test]
    async fn successful_poll_publishes_four_fields_then_idles() {
        let (device, _seen) = spawn_responder(CONTROL_FIXTURE.to_vec()).await;
        let publisher = RecordingPublisher::default();
        let poll = PollLoop::new(publisher.clone(), settings(device), "house/immersion".into());

        let next = poll.step(LoopState::Polling).await;

        assert_eq!(next, LoopState::Idle(Duration::from_millis(30)));
        assert_eq!(publisher.calls(), expected_cycle());
    }

    #[tokio::test]
    async fn timeout_skips_publish_and_uses_retry_delay() {
        let device = silent_device().await;
        let publisher = RecordingPublisher::default();
        let poll = PollLoop::new(
            publisher.clone(),
            settings(device.local_addr().unwrap()),
            "house/immersion".into(),
        );

        assert!(matches!(poll.poll_once().await, Err(Error::TimedOut(_))));
        let next = poll.step(LoopState::Polling).await;

        assert_eq!(next, LoopState::Idle(Duration::from_millis(10)));
        assert!(publisher.calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_reply_skips_publish_and_uses_retry_delay() {
        let (device, _seen) = spawn_responder(CONTROL_FIXTURE[..6].to_vec()).await;
        let publisher = RecordingPublisher::default();
        let poll = PollLoop::new(publisher.clone(), settings(device), "house/immersion".into());

        assert!(matches!(
            poll.poll_once().await,
            Err(Error::MalformedResponse { len: 6, min: 10 })
        ));
        let next = poll.step(LoopState::Polling).await;

        assert_eq!(next, LoopState::Idle(Duration::from_millis(10)));
        assert!(publisher.calls().is_empty());
    }

    #[tokio::test]
    async fn idle_sleeps_then_polls() {
        let publisher = RecordingPublisher::default();
        let poll = PollLoop::new(
            publisher.clone(),
            settings("127.0.0.1:9".parse().unwrap()),
            "house/immersion".into(),
        );
        let started = std::time::Instant::now();

        let next = poll.step(LoopState::Idle(Duration::from_millis(40))).await;

        assert_eq!(next, LoopState::Polling);
        assert!(started.elapsed() >= Duration::from_millis(40));
        assert!(publisher.calls().is_empty());
    }

    #[tokio::test]
    async fn n_cycles_publish_n_times_four_messages() {
        const CYCLES: usize = 3;
        let (device, mut seen) = spawn_responder(CONTROL_FIXTURE.to_vec()).await;
        let publisher = RecordingPublisher::default();
        let poll = PollLoop::new(publisher.clone(), settings(device), "house/immersion".into());

        let mut state = LoopState::Polling;
        for _ in 0..CYCLES * 2 {
            state = poll.step(state).await;
        }

        assert_eq!(state, LoopState::Polling);
        let calls = publisher.calls();
        assert_eq!(calls.len(), CYCLES * 4);
        for cycle in calls.chunks(4) {
            assert_eq!(cycle, expected_cycle().as_slice());
        }
        for _ in 0..CYCLES {
            assert_eq!(seen.recv().await.unwrap(), CONTROL_READ_REQUEST);
        }
    }
}
