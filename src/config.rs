use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::tsmart::DEFAULT_UDP_PORT;

#[derive(Debug, Clone)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub tsmart: TsmartConfig,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic_prefix: String,
    pub client_id: String,
}

#[derive(Debug, Clone)]
pub struct TsmartConfig {
    /// `None` means the device is found by broadcast discovery.
    pub device_ip: Option<IpAddr>,
    pub discover: bool,
    pub local_ip: IpAddr,
    pub udp_port: u16,
    pub poll_interval_secs: u64,
    pub retry_delay_secs: u64,
    pub timeout_ms: u64,
}

/// Reads configuration values by key.
struct Source<F>(F);

impl<F: Fn(&str) -> Option<String>> Source<F> {
    fn required(&self, key: &str) -> Result<String, String> {
        (self.0)(key).ok_or_else(|| format!("{key} environment variable is required"))
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.is_empty())
    }

    fn or_default<T>(&self, key: &str, default: T) -> Result<T, String>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parsed(key)?.unwrap_or(default))
    }

    /// Accepts `true`/`false` and `1`/`0`.
    fn flag(&self, key: &str) -> Result<bool, String> {
        match self.optional(key).as_deref() {
            None | Some("false") | Some("0") => Ok(false),
            Some("true") | Some("1") => Ok(true),
            Some(other) => Err(format!("{key} invalid: expected true/false, got {other}")),
        }
    }

    fn parsed<T>(&self, key: &str) -> Result<Option<T>, String>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key)
            .map(|v| v.parse().map_err(|e| format!("{key} invalid: {e}")))
            .transpose()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let src = Source(lookup);

        let config = Self {
            mqtt: MqttConfig {
                broker_host: src.required("MQTT_BROKER_HOST")?,
                broker_port: src.or_default("MQTT_BROKER_PORT", 1883)?,
                username: src.optional("MQTT_USERNAME"),
                password: src.optional("MQTT_PASSWORD"),
                topic_prefix: src.or_default("MQTT_TOPIC_PREFIX", "house/immersion".to_string())?,
                client_id: src.or_default("MQTT_CLIENT_ID", "tsmart-to-mqtt".to_string())?,
            },
            tsmart: TsmartConfig {
                device_ip: src.parsed("TSMART_DEVICE_IP")?,
                discover: src.flag("TSMART_DISCOVER")?,
                local_ip: src
                    .parsed("TSMART_LOCAL_IP")?
                    .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
                udp_port: src.or_default("TSMART_UDP_PORT", DEFAULT_UDP_PORT)?,
                poll_interval_secs: src.or_default("TSMART_POLL_INTERVAL_SECS", 15)?,
                retry_delay_secs: src.or_default("TSMART_RETRY_DELAY_SECS", 1)?,
                timeout_ms: src.or_default("TSMART_TIMEOUT_MS", 2000)?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.mqtt.broker_host.is_empty() {
            return Err("MQTT_BROKER_HOST must not be empty".into());
        }
        if self.tsmart.udp_port == 0 {
            return Err("TSMART_UDP_PORT must be > 0".into());
        }
        if self.tsmart.poll_interval_secs == 0 {
            return Err("TSMART_POLL_INTERVAL_SECS must be > 0".into());
        }
        if self.tsmart.retry_delay_secs >= self.tsmart.poll_interval_secs {
            return Err("TSMART_RETRY_DELAY_SECS must be shorter than the poll interval".into());
        }
        if self.tsmart.timeout_ms == 0 {
            return Err("TSMART_TIMEOUT_MS must be > 0".into());
        }
        Ok(())
    }

    pub fn bridge_status_topic(&self) -> String {
        format!("{}/bridge_status", self.mqtt.topic_prefix)
    }

    /// Whether the device address has to be found by broadcast first.
    pub fn needs_discovery(&self) -> bool {
        self.tsmart.discover || self.tsmart.device_ip.is_none()
    }

    /// Local bind address; the same port is used to send and receive.
    pub fn local_addr(&self) -> SocketAddr {
        SocketAddr::new(self.tsmart.local_ip, self.tsmart.udp_port)
    }

    /// Self-echo filtering compares senders against the bound address, which
    /// never matches while bound to the unspecified address.
    pub fn filters_self_echo(&self) -> bool {
        !self.tsmart.local_ip.is_unspecified()
    }

    pub fn device_addr(&self, ip: IpAddr) -> SocketAddr {
        SocketAddr::new(ip, self.tsmart.udp_port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.tsmart.poll_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.tsmart.retry_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.tsmart.timeout_ms)
    }
}
