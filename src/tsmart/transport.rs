//! Request/response exchange with the controller over UDP.
//!
//! The protocol carries no request identifiers, so a reply is matched to its
//! request only by arriving on the socket that sent it. Callers must keep at
//! most one request outstanding per device.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout_at};
use tracing::debug;

use crate::error::{Error, Result};

use super::MAX_DATAGRAM_LEN;

pub(crate) async fn bind(local: SocketAddr, broadcast: bool) -> Result<UdpSocket> {
    let socket = UdpSocket::bind(local).await?;
    if broadcast {
        socket.set_broadcast(true)?;
    }
    Ok(socket)
}

/// Wait for the first datagram not sent from `ignore`.
/// Returns `None` once `timeout` has elapsed.
pub(crate) async fn recv_reply(
    socket: &UdpSocket,
    timeout: Duration,
    ignore: Option<SocketAddr>,
) -> Result<Option<(Vec<u8>, SocketAddr)>> {
    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; MAX_DATAGRAM_LEN];

    loop {
        let (len, from) = match timeout_at(deadline, socket.recv_from(&mut buf)).await {
            Ok(received) => received?,
            Err(_) => return Ok(None),
        };
        if Some(from) == ignore {
            debug!("Ignoring {} byte self-echo from {}", len, from);
            continue;
        }
        return Ok(Some((buf[..len].to_vec(), from)));
    }
}

/// Send `payload` to `destination` from a socket bound to `local` and return
/// the first reply that did not come from `local` itself.
///
/// The socket lives only for this exchange and is closed on every return
/// path. Self-echo filtering compares against the bound address, so bind to
/// a concrete interface address where echoes are expected.
pub async fn send_and_await(
    destination: SocketAddr,
    payload: &[u8],
    local: SocketAddr,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let socket = bind(local, false).await?;
    let own = socket.local_addr()?;

    socket.send_to(payload, destination).await?;
    debug!("Sent {} bytes to {} from {}", payload.len(), destination, own);

    match recv_reply(&socket, timeout, Some(own)).await? {
        Some((data, from)) => {
            debug!("Received {} bytes from {}", data.len(), from);
            Ok(data)
        }
        None => Err(Error::TimedOut(timeout)),
    }
}
