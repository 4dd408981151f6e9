mod bridge;
mod config;
mod error;
mod mqtt;
mod tsmart;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bridge::{PollLoop, PollSettings};
use crate::mqtt::ConnectionEvent;
use crate::tsmart::discovery;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting tsmart-to-mqtt bridge (mqtt={}:{}, prefix={}, local={})",
        config.mqtt.broker_host,
        config.mqtt.broker_port,
        config.mqtt.topic_prefix,
        config.local_addr(),
    );

    if !config.filters_self_echo() {
        warn!(
            "TSMART_LOCAL_IP is unspecified ({}); self-echo filtering is off",
            config.tsmart.local_ip
        );
    }

    let device_ip = match config.tsmart.device_ip {
        Some(ip) if !config.needs_discovery() => ip,
        _ => {
            let destination = discovery::broadcast_destination(config.tsmart.udp_port);
            info!("Discovering T-Smart via {}", destination);
            match discovery::discover(config.local_addr(), destination, config.request_timeout()).await {
                Ok(ip) => ip,
                Err(e) => {
                    error!("Discovery failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    let mqtt_client = mqtt::client::MqttClient::new(&config);
    let publisher = mqtt_client.publisher();

    // Connection notifications are only logged; the poll loop never waits on them.
    let (event_tx, mut event_rx) = mpsc::channel::<ConnectionEvent>(100);
    let mqtt_handle = tokio::spawn(async move {
        mqtt_client.run(event_tx).await;
    });
    let sink_handle = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                ConnectionEvent::Connected { code } => info!("Connected to MQTT broker ({})", code),
                ConnectionEvent::PublishAcknowledged { pkid } => debug!("Publish {} acknowledged", pkid),
                ConnectionEvent::Disconnected { reason } => {
                    warn!("MQTT connection error: {}. Reconnecting...", reason)
                }
            }
        }
    });

    let settings = PollSettings {
        device: config.device_addr(device_ip),
        local: config.local_addr(),
        timeout: config.request_timeout(),
        poll_interval: config.poll_interval(),
        retry_delay: config.retry_delay(),
    };
    info!(
        "Polling T-Smart at {} every {:?}",
        settings.device, settings.poll_interval
    );
    let poll_loop = PollLoop::new(publisher, settings, config.mqtt.topic_prefix.clone());

    tokio::select! {
        _ = poll_loop.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down");
        }
        _ = async {
            let mut sigterm = tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate()
            ).expect("Failed to register SIGTERM handler");
            sigterm.recv().await;
        } => {
            info!("Received SIGTERM, shutting down");
        }
    }

    mqtt_handle.abort();
    sink_handle.abort();
    info!("tsmart-to-mqtt bridge stopped");
}
