//! UDP transport
//!
//! Owns the one socket the client uses. The RX task forwards every inbound
//! datagram with its source address over a channel; filtering by expected
//! device address is the protocol layer's job. Sends are best-effort:
//! failures are logged, and a missing answer surfaces through the request
//! timeout path instead.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::constants::{
    BIND_RETRY_DELAY_MS, CHANNEL_CAPACITY, LOCAL_PORT_BASE, MAX_SOCKET_RETRY_ATTEMPTS,
    UDP_BUFFER_SIZE,
};
use crate::error::{AcError, Result};

/// UDP socket plus the channel its RX task feeds.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    shutdown: Arc<AtomicBool>,
}

/// One inbound datagram with its source.
pub type Datagram = (Bytes, SocketAddr);

impl UdpTransport {
    /// Bind the local socket and start the RX task.
    ///
    /// Returns the transport and the inbound-datagram channel. The RX task
    /// runs until `shutdown()` is called.
    pub async fn bind(local_port: u16) -> Result<(Self, mpsc::Receiver<Datagram>)> {
        let socket = create_reusable_udp_socket(local_port).await?;
        let shutdown = Arc::new(AtomicBool::new(false));

        let (in_tx, in_rx) = mpsc::channel::<Datagram>(CHANNEL_CAPACITY);
        let socket_rx = socket.clone();
        let shutdown_rx = shutdown.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; UDP_BUFFER_SIZE];
            while !shutdown_rx.load(Ordering::Relaxed) {
                match tokio::time::timeout(
                    Duration::from_millis(100),
                    socket_rx.recv_from(&mut buf),
                )
                .await
                {
                    Ok(Ok((len, addr))) => {
                        trace!(%addr, len, "datagram received");
                        if in_tx
                            .send((Bytes::copy_from_slice(&buf[..len]), addr))
                            .await
                            .is_err()
                        {
                            // Receiver gone, client is shutting down
                            break;
                        }
                    }
                    Ok(Err(e)) => {
                        // Socket recv error - keep polling
                        trace!("udp recv error: {}", e);
                    }
                    Err(_) => {
                        // Timeout - expected, allows checking the shutdown flag
                    }
                }
            }
        });

        Ok((Self { socket, shutdown }, in_rx))
    }

    /// Fire-and-forget send. Failures are logged, never returned.
    pub async fn send_to(&self, data: &[u8], target: SocketAddr) {
        if let Err(e) = self.socket.send_to(data, target).await {
            warn!(%target, "udp send failed: {}", e);
        }
    }

    /// The port the socket actually bound (useful with port 0).
    pub fn local_port(&self) -> u16 {
        self.socket.local_addr().map(|a| a.port()).unwrap_or(0)
    }

    /// Stop the RX task. The socket closes once the task drops its handle.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

/// Local port rule from the reference implementation: one stable port per
/// device, derived from the device address so replies route back to us.
pub fn derive_local_port(device_ip: &std::net::IpAddr) -> u16 {
    match device_ip {
        std::net::IpAddr::V4(v4) => LOCAL_PORT_BASE + u16::from(v4.octets()[3]),
        std::net::IpAddr::V6(_) => 0,
    }
}

/// Create a UDP socket with SO_REUSEADDR for quick rebind after a restart.
///
/// Retries on a fixed delay if the port is still held (e.g. by a previous
/// run) so device connectivity self-heals after transient hiccups.
async fn create_reusable_udp_socket(port: u16) -> Result<Arc<UdpSocket>> {
    // 0.0.0.0:port with a u16 port is always valid
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse().unwrap();
    let map_err = |e| AcError::SocketBind { port, source: e };

    for attempt in 0..MAX_SOCKET_RETRY_ATTEMPTS {
        let socket =
            Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(map_err)?;
        socket.set_reuse_address(true).map_err(map_err)?;
        socket.set_nonblocking(true).map_err(map_err)?;

        match socket.bind(&addr.into()) {
            Ok(_) => {
                let std_socket: std::net::UdpSocket = socket.into();
                let tokio_socket = UdpSocket::from_std(std_socket).map_err(map_err)?;
                return Ok(Arc::new(tokio_socket));
            }
            Err(e) if attempt < MAX_SOCKET_RETRY_ATTEMPTS - 1 => {
                warn!(port, "bind failed ({}), retrying", e);
                tokio::time::sleep(Duration::from_millis(BIND_RETRY_DELAY_MS)).await;
            }
            Err(e) => return Err(map_err(e)),
        }
    }

    Err(AcError::SocketBind {
        port,
        source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "failed after retries"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_local_port() {
        let ip: std::net::IpAddr = "192.168.1.50".parse().unwrap();
        assert_eq!(derive_local_port(&ip), 8050);
        let ip: std::net::IpAddr = "10.0.0.255".parse().unwrap();
        assert_eq!(derive_local_port(&ip), 8255);
    }

    #[tokio::test]
    async fn test_bind_ephemeral_and_loopback_roundtrip() {
        let (transport, mut rx) = UdpTransport::bind(0).await.unwrap();
        let port = transport.local_port();
        assert_ne!(port, 0);

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(b"ping", format!("127.0.0.1:{}", port))
            .await
            .unwrap();

        let (data, from) = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timeout")
            .expect("channel closed");
        assert_eq!(data.as_ref(), b"ping");
        assert_eq!(from.ip(), sender.local_addr().unwrap().ip());

        transport.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_stops_rx_task() {
        let (transport, mut rx) = UdpTransport::bind(0).await.unwrap();
        transport.shutdown();
        // RX task exits on the next flag check and drops its sender
        let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert_eq!(closed.expect("rx task did not stop"), None);
    }
}
