pub mod client;

/// Connection notifications from the MQTT event loop, for logging only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected { code: String },
    PublishAcknowledged { pkid: u16 },
    Disconnected { reason: String },
}
