use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Error, Result};

use super::RequestKind;
use super::codec::encode_request;
use super::transport::{bind, recv_reply};

/// Limited broadcast address on the controller's port.
pub fn broadcast_destination(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), port)
}

/// Broadcast a discovery request and return the address of the first
/// responder. Any sender is accepted.
pub async fn discover(local: SocketAddr, destination: SocketAddr, timeout: Duration) -> Result<IpAddr> {
    let socket = bind(local, true).await?;
    socket
        .send_to(&encode_request(RequestKind::Discovery), destination)
        .await?;
    debug!("Discovery request sent to {}", destination);

    match recv_reply(&socket, timeout, None).await? {
        Some((data, from)) => {
            info!("Discovered T-Smart at {} ({} byte reply)", from.ip(), data.len());
            Ok(from.ip())
        }
        None => Err(Error::NotFound(timeout)),
    }
}
