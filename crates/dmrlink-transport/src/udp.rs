//! Connected-UDP transport for master links.
//!
//! This module provides [`UdpTransport`], the datagram transport both
//! protocol clients build on. A client transport is *connected*: after
//! [`UdpTransport::connect`] the socket only exchanges datagrams with the
//! master, and the OS filters out packets from other sources.
//!
//! UDP "connect" does not perform a handshake -- it merely sets a default
//! destination and filters incoming datagrams.
//!
//! # Example
//!
//! ```no_run
//! use dmrlink_transport::UdpTransport;
//!
//! # async fn example() -> dmrlink_core::Result<()> {
//! // Connect to a master; the default port is appended when missing.
//! let transport = UdpTransport::connect("master.example.org", 62030).await?;
//!
//! transport.send(b"RPTL00bf861a").await?;
//!
//! let mut buf = [0u8; 512];
//! let n = transport.recv(&mut buf).await?;
//! println!("received {} bytes", n);
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use dmrlink_core::error::{Error, Result};

/// UDP transport for datagram exchange with a single master server.
///
/// Wraps a [`tokio::net::UdpSocket`]. All methods take `&self`, so the
/// transport can be shared between a receive worker and a sending event
/// loop through an `Arc` without locking.
#[derive(Debug)]
pub struct UdpTransport {
    /// The underlying UDP socket.
    socket: UdpSocket,
    /// The local address the socket is bound to.
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind to a local address without connecting.
    ///
    /// Use `"0.0.0.0:0"` for any available port, or a fixed port for a
    /// well-known service (test harnesses bind `"127.0.0.1:0"`).
    pub async fn bind(addr: &str) -> Result<Self> {
        tracing::debug!(addr = %addr, "binding UDP socket");

        let socket = UdpSocket::bind(addr).await.map_err(|e| {
            tracing::error!(addr = %addr, error = %e, "failed to bind UDP socket");
            Error::Io(e)
        })?;

        let local_addr = socket.local_addr().map_err(Error::Io)?;
        tracing::debug!(local_addr = %local_addr, "UDP socket bound");

        Ok(Self { socket, local_addr })
    }

    /// Bind to a specific port on all interfaces.
    ///
    /// Convenience method equivalent to `bind(&format!("0.0.0.0:{port}"))`.
    /// Pass 0 for any available port.
    pub async fn bind_port(port: u16) -> Result<Self> {
        Self::bind(&format!("0.0.0.0:{}", port)).await
    }

    /// Create a transport connected to a master.
    ///
    /// When `addr` carries no port (`"master.example.org"`), `default_port`
    /// is appended. Binds an ephemeral local port on all interfaces, then
    /// connects, so [`send`](Self::send) and [`recv`](Self::recv) exchange
    /// datagrams with the master only.
    pub async fn connect(addr: &str, default_port: u16) -> Result<Self> {
        let addr = if addr.contains(':') {
            addr.to_string()
        } else {
            format!("{}:{}", addr, default_port)
        };

        tracing::debug!(addr = %addr, "connecting to udp://{}", addr);

        let transport = Self::bind("0.0.0.0:0").await?;
        transport.socket.connect(&addr).await.map_err(|e| {
            tracing::error!(addr = %addr, error = %e, "failed to connect UDP socket");
            Error::Io(e)
        })?;

        tracing::debug!(
            local = %transport.local_addr,
            remote = %addr,
            "UDP socket connected"
        );

        Ok(transport)
    }

    /// Connect an already-bound transport to a specific peer.
    ///
    /// Used by tests to pair two bound sockets.
    pub async fn connect_peer(&self, addr: SocketAddr) -> Result<()> {
        self.socket.connect(addr).await.map_err(Error::Io)
    }

    /// Get the local address this socket is bound to.
    ///
    /// Useful after binding port 0 to discover the assigned port.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send a datagram to the connected peer.
    ///
    /// The entire `data` slice is sent as a single datagram. UDP does not
    /// guarantee delivery or ordering, but each datagram is atomic.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        tracing::trace!(local = %self.local_addr, bytes = data.len(), "sending datagram");

        self.socket.send(data).await.map_err(|e| {
            tracing::error!(local = %self.local_addr, error = %e, "failed to send datagram");
            Error::Io(e)
        })?;

        Ok(())
    }

    /// Send a datagram to a specific address (unconnected sockets).
    pub async fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<()> {
        self.socket.send_to(data, addr).await.map_err(Error::Io)?;
        Ok(())
    }

    /// Receive one datagram from the connected peer.
    ///
    /// Blocks until a datagram arrives. The buffer should be large enough
    /// for an entire datagram; bytes beyond `buf.len()` are discarded
    /// (standard UDP behavior). 512 bytes comfortably holds the largest
    /// packet of either master protocol.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let n = self.socket.recv(buf).await.map_err(|e| {
            tracing::trace!(local = %self.local_addr, error = %e, "failed to receive datagram");
            Error::Io(e)
        })?;

        tracing::trace!(local = %self.local_addr, bytes = n, "received datagram");
        Ok(n)
    }

    /// Receive one datagram with a deadline.
    ///
    /// Returns [`Error::Timeout`] if no datagram arrives within `timeout`.
    pub async fn recv_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        match tokio::time::timeout(timeout, self.recv(buf)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::trace!(
                    local = %self.local_addr,
                    timeout_ms = timeout.as_millis(),
                    "timeout waiting for datagram"
                );
                Err(Error::Timeout(timeout))
            }
        }
    }

    /// Receive one datagram with its source address (unconnected sockets).
    pub async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await.map_err(Error::Io)
    }
}
