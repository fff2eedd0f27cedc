//! Mock master server for protocol-level testing.
//!
//! [`MockMaster`] is a UDP listener pre-loaded with scripted expectations,
//! enabling deterministic testing of the Homebrew and Rewind clients
//! without a real master. Expectations are consumed in order: for each one
//! the server waits for a datagram from the client, verifies it, and
//! answers with zero or more scripted datagrams.
//!
//! # Example
//!
//! ```
//! use dmrlink_test_harness::MockMaster;
//!
//! # async fn example() -> dmrlink_core::Result<()> {
//! let mut master = MockMaster::new().await?;
//!
//! // When the client sends its login, answer with an ACK.
//! master.expect_prefix(b"RPTL", &[b"MSTACK00000001abcdefgh"]);
//!
//! let addr = master.addr();
//! master.start();
//! // ... connect a client to `addr` and drive it ...
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::task::JoinHandle;

use dmrlink_core::error::Result;
use dmrlink_transport::UdpTransport;

/// How long the mock waits for each expected datagram before declaring the
/// script violated.
const EXPECTATION_TIMEOUT: Duration = Duration::from_secs(5);

/// How an expected datagram is matched.
#[derive(Debug, Clone)]
enum Match {
    /// The datagram must equal these bytes exactly.
    Exact(Vec<u8>),
    /// The datagram must start with these bytes.
    Prefix(Vec<u8>),
}

/// A pre-loaded expectation: one datagram from the client, answered with
/// zero or more datagrams from the master.
#[derive(Debug, Clone)]
struct Expectation {
    matcher: Match,
    replies: Vec<Vec<u8>>,
}

/// A scripted mock master listening on a random localhost port.
///
/// Load expectations with [`expect`](MockMaster::expect) /
/// [`expect_prefix`](MockMaster::expect_prefix), then call
/// [`start`](MockMaster::start). The mock replies to whichever peer sent
/// the matched datagram, so clients on ephemeral ports work naturally.
/// Call [`wait`](MockMaster::wait) at the end of the test to surface any
/// script violation as an `Err(String)`.
pub struct MockMaster {
    transport: Option<UdpTransport>,
    addr: SocketAddr,
    expectations: VecDeque<Expectation>,
    server_handle: Option<JoinHandle<std::result::Result<(), String>>>,
}

impl MockMaster {
    /// Create a new mock master bound to a random localhost port.
    ///
    /// The mock does not serve until [`start`](MockMaster::start) is
    /// called, allowing expectations to be loaded first.
    pub async fn new() -> Result<Self> {
        let transport = UdpTransport::bind("127.0.0.1:0").await?;
        let addr = transport.local_addr();
        Ok(Self {
            transport: Some(transport),
            addr,
            expectations: VecDeque::new(),
            server_handle: None,
        })
    }

    /// Add an expectation matched on the exact datagram bytes.
    pub fn expect(&mut self, request: &[u8], replies: &[&[u8]]) {
        self.expectations.push_back(Expectation {
            matcher: Match::Exact(request.to_vec()),
            replies: replies.iter().map(|r| r.to_vec()).collect(),
        });
    }

    /// Add an expectation matched on a datagram prefix.
    ///
    /// Useful when the tail of the packet is not interesting to the test
    /// (hex digests, sequence counters).
    pub fn expect_prefix(&mut self, prefix: &[u8], replies: &[&[u8]]) {
        self.expectations.push_back(Expectation {
            matcher: Match::Prefix(prefix.to_vec()),
            replies: replies.iter().map(|r| r.to_vec()).collect(),
        });
    }

    /// The address the mock is listening on. Connect clients here.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start serving the loaded expectations on a background task.
    pub fn start(&mut self) {
        let transport = self
            .transport
            .take()
            .expect("MockMaster already started");
        let expectations: Vec<Expectation> = self.expectations.drain(..).collect();

        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 512];

            for (i, expectation) in expectations.iter().enumerate() {
                let (n, peer) =
                    match tokio::time::timeout(EXPECTATION_TIMEOUT, transport.recv_from(&mut buf))
                        .await
                    {
                        Ok(Ok(received)) => received,
                        Ok(Err(e)) => {
                            return Err(format!("expectation {}: recv error: {}", i, e));
                        }
                        Err(_) => {
                            return Err(format!(
                                "expectation {}: timed out waiting for the client",
                                i
                            ));
                        }
                    };
                let received = &buf[..n];

                let matched = match &expectation.matcher {
                    Match::Exact(request) => received == &request[..],
                    Match::Prefix(prefix) => received.starts_with(prefix),
                };
                if !matched {
                    return Err(format!(
                        "expectation {}: datagram mismatch: expected {:?}, got {:02X?}",
                        i, expectation.matcher, received
                    ));
                }

                for reply in &expectation.replies {
                    transport
                        .send_to(reply, peer)
                        .await
                        .map_err(|e| format!("expectation {}: send error: {}", i, e))?;
                }
            }

            Ok(())
        });

        self.server_handle = Some(handle);
    }

    /// Wait for the script to complete and return any violation.
    ///
    /// Call this after the client has finished its interactions to verify
    /// that every expectation was met.
    pub async fn wait(self) -> std::result::Result<(), String> {
        if let Some(handle) = self.server_handle {
            handle
                .await
                .map_err(|e| format!("mock master task panicked: {}", e))?
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_exchange() {
        let mut master = MockMaster::new().await.unwrap();
        master.expect(b"RPTL00000001", &[b"MSTACK"]);
        master.expect_prefix(b"RPTK", &[b"MSTACK", b"RPTPONG"]);
        let addr = master.addr();
        master.start();

        let client = UdpTransport::connect(&addr.to_string(), 0).await.unwrap();
        let mut buf = [0u8; 64];

        client.send(b"RPTL00000001").await.unwrap();
        let n = client
            .recv_timeout(&mut buf, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"MSTACK");

        client.send(b"RPTKwhatever").await.unwrap();
        let n = client
            .recv_timeout(&mut buf, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"MSTACK");
        let n = client
            .recv_timeout(&mut buf, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"RPTPONG");

        master.wait().await.unwrap();
    }

    #[tokio::test]
    async fn mismatch_is_reported() {
        let mut master = MockMaster::new().await.unwrap();
        master.expect(b"RPTL00000001", &[]);
        let addr = master.addr();
        master.start();

        let client = UdpTransport::connect(&addr.to_string(), 0).await.unwrap();
        client.send(b"MSTPING0000").await.unwrap();

        let err = master.wait().await.unwrap_err();
        assert!(err.contains("mismatch"), "unexpected error: {}", err);
    }
}
