//! Transport seam between the session loop and the network
//!
//! The session loop only needs three things from the network: open a link,
//! send a heartbeat, and wait for the next datagram until the read deadline.
//! [`Endpoint`] and [`Link`] capture exactly that, so the loop runs the same
//! against a real UDP socket ([`UdpEndpoint`]) and a scripted link in tests.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::debug;

use crate::config::SessionConfig;
use crate::protocol::HEARTBEAT_PAYLOAD;
use crate::{Result, TelemetryError};

/// Something the session loop can (re)connect to.
///
/// `open` is called once per start and once per restart. Its errors are
/// fatal to the session.
#[async_trait]
pub trait Endpoint: Send + Sync + 'static {
    type Link: Link;

    async fn open(&self) -> Result<Self::Link>;
}

/// One bound connection to the console.
#[async_trait]
pub trait Link: Send + 'static {
    /// Arm a fresh read deadline, then send one heartbeat.
    ///
    /// The deadline is armed even if the send fails.
    async fn send_heartbeat(&mut self) -> Result<()>;

    /// Wait for the next datagram.
    ///
    /// Returns `Ok(None)` when the read deadline expires. Must be cancel-safe:
    /// the session loop races it against stop and restart signals.
    async fn recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>>;

    /// Local address of the link, when it has one.
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// UDP endpoint for a console on the network.
#[derive(Debug, Clone)]
pub struct UdpEndpoint {
    host: String,
    send_port: u16,
    bind: SocketAddr,
    read_timeout: Duration,
}

impl UdpEndpoint {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            host: config.host.clone(),
            send_port: config.send_port,
            bind: SocketAddr::new(config.bind_addr, config.receive_port),
            read_timeout: config.read_timeout(),
        }
    }

    async fn resolve(&self) -> Result<SocketAddr> {
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.send_port))
            .await
            .map_err(|e| TelemetryError::resolve_failed(&self.host, e))?;

        addrs.next().ok_or_else(|| {
            TelemetryError::resolve_failed(
                &self.host,
                io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses"),
            )
        })
    }
}

#[async_trait]
impl Endpoint for UdpEndpoint {
    type Link = UdpLink;

    async fn open(&self) -> Result<UdpLink> {
        let target = self.resolve().await?;
        let socket =
            UdpSocket::bind(self.bind).await.map_err(|e| TelemetryError::bind_failed(self.bind, e))?;

        debug!("Bound {:?}, heartbeats go to {}", socket.local_addr().ok(), target);

        Ok(UdpLink { socket, target, read_timeout: self.read_timeout, deadline: Instant::now() })
    }
}

/// Bound UDP socket plus its read deadline.
///
/// Heartbeats are sent from the same socket that receives the stream; the
/// console replies to the heartbeat's source address.
#[derive(Debug)]
pub struct UdpLink {
    socket: UdpSocket,
    target: SocketAddr,
    read_timeout: Duration,
    deadline: Instant,
}

impl UdpLink {
    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

#[async_trait]
impl Link for UdpLink {
    async fn send_heartbeat(&mut self) -> Result<()> {
        self.deadline = Instant::now() + self.read_timeout;
        self.socket
            .send_to(HEARTBEAT_PAYLOAD, self.target)
            .await
            .map_err(|e| TelemetryError::heartbeat_failed(self.target, e))?;
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        match tokio::time::timeout_at(self.deadline, self.socket.recv_from(buf)).await {
            Ok(Ok((len, _from))) => Ok(Some(len)),
            Ok(Err(source)) => Err(TelemetryError::Receive { source }),
            Err(_elapsed) => Ok(None),
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }
}
