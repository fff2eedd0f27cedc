//! Rewind protocol client.
//!
//! [`RewindClient`] attaches a simple external application to a DMR master
//! over UDP. The session is keep-alive driven: the client announces itself
//! with a [`VersionData`], answers the server's challenge with a SHA-256
//! digest, sends its configuration and subscriptions, and then receives a
//! multi-class payload stream that is dispatched to the consumer sink as
//! [`RewindEvent`]s.
//!
//! One background task owns the socket's read direction; the event loop
//! owns the write direction and the authentication state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use dmrlink_core::error::{Error, Result};
use dmrlink_core::frame::TYPE_EMBEDDED_DATA;
use dmrlink_transport::UdpTransport;

use crate::event::RewindEvent;
use crate::packet::{
    ConfigurationData, PacketHeader, Payload, SessionType, SubscriptionData, SuperHeader,
    VersionData, DEFAULT_KEEP_ALIVE, DEFAULT_PORT, DEFAULT_TIMEOUT, HEADER_LEN,
    SERVICE_SIMPLE_APPLICATION, SIGN, SIGN_LEN, TYPE_AUTHENTICATION, TYPE_CHALLENGE, TYPE_CLOSE,
    TYPE_CONFIGURATION, TYPE_DMR_AUDIO_BASE, TYPE_DMR_DATA_BASE, TYPE_DMR_EMBEDDED_DATA,
    TYPE_KEEP_ALIVE, TYPE_REPORT, TYPE_SUBSCRIPTION, TYPE_SUPER_HEADER,
};

/// Options for configuring a Rewind client session.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// DMR ID announced to the server.
    pub remote_id: u32,
    /// Software description announced in every keep-alive.
    pub description: String,
    /// Session option flags ([`crate::packet::OPTION_SUPER_HEADER`], ...).
    pub options: u32,
    /// Subscriptions re-established after every successful configuration
    /// exchange: target ID to session type.
    pub subscriptions: HashMap<u32, SessionType>,
    /// Keep-alive interval.
    pub keep_alive: Duration,
    /// Link timeout.
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            remote_id: 0,
            description: format!("dmrlink/rewind {}", env!("CARGO_PKG_VERSION")),
            options: 0,
            subscriptions: HashMap::new(),
            keep_alive: DEFAULT_KEEP_ALIVE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// State owned exclusively by the event loop.
struct Session {
    auth: bool,
    last_configuration: Option<Instant>,
    last_received: Instant,
}

/// Client implementing the Rewind simple-external-application protocol.
///
/// # Example
///
/// ```no_run
/// use dmrlink_rewind::{ClientOptions, RewindClient, RewindEvent, SessionType};
/// use tokio::sync::mpsc;
///
/// # async fn example() -> dmrlink_core::Result<()> {
/// let mut options = ClientOptions {
///     remote_id: 2040073,
///     ..ClientOptions::default()
/// };
/// options.subscriptions.insert(204, SessionType::GroupVoice);
///
/// let client = RewindClient::new_with_options("master.example.org", "secret", options).await?;
/// let (tx, mut rx) = mpsc::channel(16);
///
/// tokio::spawn(async move {
///     while let Some(event) = rx.recv().await {
///         if let RewindEvent::SuperHeader(sh) = event {
///             println!("call {} -> {}", sh.source, sh.target);
///         }
///     }
/// });
///
/// client.listen_and_serve(tx).await
/// # }
/// ```
pub struct RewindClient {
    options: ClientOptions,
    password: String,
    transport: Arc<UdpTransport>,
    sequence: AtomicU32,
    quit_tx: mpsc::Sender<()>,
    quit_rx: tokio::sync::Mutex<Option<mpsc::Receiver<()>>>,
}

impl RewindClient {
    /// Create a client connected to the master at `addr` with default
    /// options. The default port 54005 is appended when `addr` carries
    /// none.
    pub async fn new(addr: &str, password: &str) -> Result<Self> {
        Self::new_with_options(addr, password, ClientOptions::default()).await
    }

    /// Create a client with custom options.
    pub async fn new_with_options(
        addr: &str,
        password: &str,
        options: ClientOptions,
    ) -> Result<Self> {
        let transport = UdpTransport::connect(addr, DEFAULT_PORT).await?;
        let (quit_tx, quit_rx) = mpsc::channel(2);

        Ok(Self {
            options,
            password: password.to_string(),
            transport: Arc::new(transport),
            sequence: AtomicU32::new(0),
            quit_tx,
            quit_rx: tokio::sync::Mutex::new(Some(quit_rx)),
        })
    }

    /// Run the packet receiver and the protocol event loop.
    ///
    /// Announces the client with a keep-alive, then reacts to the server:
    /// challenges are answered, configuration is exchanged, subscriptions
    /// re-established, and every application payload is decoded and
    /// delivered to `sink`. Blocks until a transport error, a link
    /// timeout, or [`close`](Self::close).
    pub async fn listen_and_serve(&self, sink: mpsc::Sender<RewindEvent>) -> Result<()> {
        let mut quit_rx = self
            .quit_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::Protocol("listen_and_serve may only run once".into()))?;

        let (data_tx, mut data_rx) = mpsc::channel::<Vec<u8>>(1);
        let (err_tx, mut err_rx) = mpsc::channel::<Error>(1);

        let transport = Arc::clone(&self.transport);
        let receiver = tokio::spawn(async move {
            let mut buf = [0u8; 512];
            loop {
                match transport.recv(&mut buf).await {
                    Ok(n) => {
                        if data_tx.send(buf[..n].to_vec()).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = err_tx.send(e).await;
                        return;
                    }
                }
            }
        });

        let result = self
            .serve(&mut data_rx, &mut err_rx, &mut quit_rx, &sink)
            .await;
        receiver.abort();
        result
    }

    async fn serve(
        &self,
        data_rx: &mut mpsc::Receiver<Vec<u8>>,
        err_rx: &mut mpsc::Receiver<Error>,
        quit_rx: &mut mpsc::Receiver<()>,
        sink: &mpsc::Sender<RewindEvent>,
    ) -> Result<()> {
        let mut session = Session {
            auth: false,
            last_configuration: None,
            last_received: Instant::now(),
        };

        self.send_keep_alive().await?;

        let mut keep_alive = tokio::time::interval_at(
            Instant::now() + self.options.keep_alive,
            self.options.keep_alive,
        );
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let deadline = tokio::time::sleep(self.options.timeout);
        tokio::pin!(deadline);

        loop {
            // While authenticated, refresh the configuration so the server
            // keeps the session's options and subscriptions current.
            if session.auth
                && session
                    .last_configuration
                    .map_or(true, |sent| sent.elapsed() > self.options.keep_alive)
            {
                self.send_configuration(&mut session).await?;
            }

            tokio::select! {
                maybe = data_rx.recv() => {
                    let data = match maybe {
                        Some(data) => data,
                        None => {
                            return Err(err_rx.recv().await.unwrap_or_else(|| {
                                Error::Protocol("receive worker stopped unexpectedly".into())
                            }));
                        }
                    };

                    if data.len() < SIGN_LEN {
                        tracing::trace!(bytes = data.len(), "ignoring runt datagram");
                        continue;
                    }
                    if &data[..SIGN_LEN] != SIGN {
                        tracing::trace!(
                            sign = %String::from_utf8_lossy(&data[..SIGN_LEN]),
                            "ignoring datagram with foreign signature"
                        );
                        continue;
                    }

                    self.handle_packet(&data, &mut session, sink).await?;

                    session.last_received = Instant::now();
                    deadline.as_mut().reset(Instant::now() + self.options.timeout);
                }

                _ = keep_alive.tick() => {
                    self.send_keep_alive().await?;
                }

                () = &mut deadline => {
                    return Err(Error::Timeout(session.last_received.elapsed()));
                }

                _ = quit_rx.recv() => {
                    return Ok(());
                }

                Some(err) = err_rx.recv() => {
                    return Err(err);
                }
            }
        }
    }

    /// Stop the event loop.
    ///
    /// Enqueues quit tokens for the loop and, transitively, the receive
    /// worker. Safe to call more than once.
    pub fn close(&self) {
        let _ = self.quit_tx.try_send(());
        let _ = self.quit_tx.try_send(());
    }

    /// Subscribe to a target DMR ID with the given session type.
    ///
    /// Subscriptions configured through [`ClientOptions::subscriptions`]
    /// are re-sent automatically after every configuration exchange; this
    /// method issues an additional one-off request.
    pub async fn subscribe(&self, target: u32, session_type: SessionType) -> Result<()> {
        self.send_data(
            TYPE_SUBSCRIPTION,
            &SubscriptionData {
                session_type,
                target,
            },
        )
        .await
    }

    async fn handle_packet(
        &self,
        data: &[u8],
        session: &mut Session,
        sink: &mpsc::Sender<RewindEvent>,
    ) -> Result<()> {
        let header = match PacketHeader::decode(data) {
            Ok(header) => header,
            Err(e) => {
                tracing::debug!(bytes = data.len(), error = %e, "ignoring undecodable header");
                return Ok(());
            }
        };
        let payload = &data[HEADER_LEN..];

        match header.packet_type {
            TYPE_CLOSE => {
                // The server tore the session down; stay up and let the
                // next keep-alive re-initiate authentication.
                tracing::warn!("server sent close");
                session.auth = false;
            }

            TYPE_KEEP_ALIVE => {
                if !session.auth {
                    return self.send_configuration(session).await;
                }
            }

            TYPE_CHALLENGE => {
                session.auth = false;
                return self.send_challenge_response(payload).await;
            }

            TYPE_CONFIGURATION => {
                tracing::debug!("configuration accepted");
                session.auth = true;
                for (&target, &session_type) in &self.options.subscriptions {
                    self.subscribe(target, session_type).await?;
                }
            }

            TYPE_SUBSCRIPTION => {
                tracing::debug!("subscription confirmed");
            }

            TYPE_REPORT => {
                tracing::debug!(report = %String::from_utf8_lossy(payload), "received report");
            }

            TYPE_SUPER_HEADER => match SuperHeader::decode(payload) {
                Ok(super_header) => {
                    sink.send(RewindEvent::SuperHeader(super_header))
                        .await
                        .map_err(|_| Error::StreamClosed)?;
                }
                Err(e) => {
                    tracing::warn!(bytes = payload.len(), error = %e, "dropping super header");
                }
            },

            TYPE_DMR_EMBEDDED_DATA => {
                sink.send(RewindEvent::DmrData {
                    data_type: TYPE_EMBEDDED_DATA,
                    data: payload.to_vec(),
                })
                .await
                .map_err(|_| Error::StreamClosed)?;
            }

            t if (TYPE_DMR_DATA_BASE..TYPE_DMR_AUDIO_BASE).contains(&t) => {
                sink.send(RewindEvent::DmrData {
                    data_type: (t & 0x0F) as u8,
                    data: payload.to_vec(),
                })
                .await
                .map_err(|_| Error::StreamClosed)?;
            }

            t if (TYPE_DMR_AUDIO_BASE..TYPE_DMR_EMBEDDED_DATA).contains(&t) => {
                sink.send(RewindEvent::DmrAudio {
                    audio_type: (t - TYPE_DMR_AUDIO_BASE) as u8,
                    data: payload.to_vec(),
                })
                .await
                .map_err(|_| Error::StreamClosed)?;
            }

            t => {
                tracing::trace!(packet_type = format!("{:#06x}", t), "forwarding unknown packet type");
                sink.send(RewindEvent::Raw {
                    packet_type: t,
                    data: payload.to_vec(),
                })
                .await
                .map_err(|_| Error::StreamClosed)?;
            }
        }

        Ok(())
    }

    async fn send_data(&self, packet_type: u16, payload: &dyn Payload) -> Result<()> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let header = PacketHeader {
            packet_type,
            flags: 0,
            sequence,
            length: payload.wire_len() as u16,
        };

        let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.wire_len());
        buf.extend_from_slice(&header.encode());
        payload.encode(&mut buf);

        self.transport.send(&buf).await
    }

    async fn send_challenge_response(&self, challenge: &[u8]) -> Result<()> {
        let mut hasher = Sha256::new();
        hasher.update(challenge);
        hasher.update(self.password.as_bytes());
        let digest = hasher.finalize();

        tracing::debug!(challenge_bytes = challenge.len(), "answering challenge");
        self.send_data(TYPE_AUTHENTICATION, &digest.as_slice()).await
    }

    async fn send_configuration(&self, session: &mut Session) -> Result<()> {
        tracing::debug!(
            options = format!("{:#010x}", self.options.options),
            "sending configuration"
        );
        session.last_configuration = Some(Instant::now());
        self.send_data(TYPE_CONFIGURATION, &ConfigurationData(self.options.options))
            .await
    }

    async fn send_keep_alive(&self) -> Result<()> {
        let version = VersionData::new(
            self.options.remote_id,
            SERVICE_SIMPLE_APPLICATION,
            &self.options.description,
        );
        self.send_data(TYPE_KEEP_ALIVE, &version).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{OPTION_SUPER_HEADER, SUPER_HEADER_LEN};
    use dmrlink_test_harness::MockMaster;

    const PASSWORD: &str = "secret";

    fn test_options() -> ClientOptions {
        ClientOptions {
            remote_id: 2040073,
            description: "dump 1.0".into(),
            options: OPTION_SUPER_HEADER,
            ..ClientOptions::default()
        }
    }

    /// Build a server-originated packet.
    fn server_packet(packet_type: u16, sequence: u32, payload: &[u8]) -> Vec<u8> {
        let header = PacketHeader {
            packet_type,
            flags: 0,
            sequence,
            length: payload.len() as u16,
        };
        let mut packet = header.encode().to_vec();
        packet.extend_from_slice(payload);
        packet
    }

    /// The exact packet the client sends for `payload` at `sequence`.
    fn client_packet(packet_type: u16, sequence: u32, payload: &dyn Payload) -> Vec<u8> {
        let header = PacketHeader {
            packet_type,
            flags: 0,
            sequence,
            length: payload.wire_len() as u16,
        };
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&header.encode());
        payload.encode(&mut buf);
        buf.to_vec()
    }

    fn expected_keep_alive(sequence: u32) -> Vec<u8> {
        let version = VersionData::new(2040073, SERVICE_SIMPLE_APPLICATION, "dump 1.0");
        client_packet(TYPE_KEEP_ALIVE, sequence, &version)
    }

    async fn connect(master: &MockMaster, options: ClientOptions) -> RewindClient {
        RewindClient::new_with_options(&master.addr().to_string(), PASSWORD, options)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn announces_itself_with_version_data() {
        let mut master = MockMaster::new().await.unwrap();
        master.expect(&expected_keep_alive(1), &[]);
        master.start();

        let client = Arc::new(connect(&master, test_options()).await);
        let (tx, _rx) = mpsc::channel(16);

        let serve = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.listen_and_serve(tx).await })
        };

        master.wait().await.unwrap();
        client.close();
        serve.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn challenge_is_answered_with_digest() {
        let challenge = b"\xAA\xBB\xCC\xDD\xEE\xFF\x00\x11";

        let mut hasher = Sha256::new();
        hasher.update(challenge);
        hasher.update(PASSWORD.as_bytes());
        let digest = hasher.finalize();
        let expected = client_packet(TYPE_AUTHENTICATION, 2, &digest.as_slice());

        let mut master = MockMaster::new().await.unwrap();
        master.expect(
            &expected_keep_alive(1),
            &[&server_packet(TYPE_CHALLENGE, 1, challenge)],
        );
        master.expect(&expected, &[]);
        master.start();

        let client = Arc::new(connect(&master, test_options()).await);
        let (tx, _rx) = mpsc::channel(16);

        let serve = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.listen_and_serve(tx).await })
        };

        master.wait().await.unwrap();
        client.close();
        serve.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn configuration_and_subscriptions_after_auth() {
        let mut options = test_options();
        options.subscriptions.insert(91, SessionType::GroupVoice);

        let expected_config =
            client_packet(TYPE_CONFIGURATION, 2, &ConfigurationData(OPTION_SUPER_HEADER));
        let expected_subscription = client_packet(
            TYPE_SUBSCRIPTION,
            3,
            &SubscriptionData {
                session_type: SessionType::GroupVoice,
                target: 91,
            },
        );

        let mut master = MockMaster::new().await.unwrap();
        // An unauthenticated client answers a server keep-alive with its
        // configuration; the configuration echo authenticates it and
        // triggers the subscription map.
        master.expect(
            &expected_keep_alive(1),
            &[&server_packet(TYPE_KEEP_ALIVE, 1, &[])],
        );
        master.expect(
            &expected_config,
            &[&server_packet(TYPE_CONFIGURATION, 2, &[])],
        );
        master.expect(&expected_subscription, &[]);
        master.start();

        let client = Arc::new(connect(&master, options).await);
        let (tx, _rx) = mpsc::channel(16);

        let serve = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.listen_and_serve(tx).await })
        };

        master.wait().await.unwrap();
        client.close();
        serve.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn payloads_dispatch_to_events() {
        let mut super_header = Vec::new();
        super_header.extend_from_slice(&7u32.to_le_bytes());
        super_header.extend_from_slice(&2041017u32.to_le_bytes());
        super_header.extend_from_slice(&204u32.to_le_bytes());
        super_header.extend_from_slice(b"PD0ZZ\0\0\0\0\0");
        super_header.extend_from_slice(b"\0\0\0\0\0\0\0\0\0\0");

        let mut master = MockMaster::new().await.unwrap();
        master.expect_prefix(
            SIGN,
            &[
                &server_packet(TYPE_SUPER_HEADER, 1, &super_header),
                &server_packet(0x0912, 2, b"\x01\x02\x03"),
                &server_packet(TYPE_DMR_EMBEDDED_DATA, 3, b"\x04\x05"),
                &server_packet(0x0923, 4, b"\x06\x07\x08"),
                &server_packet(0x0200, 5, b"busy"),
            ],
        );
        master.start();

        let client = Arc::new(connect(&master, test_options()).await);
        let (tx, mut rx) = mpsc::channel(16);

        let serve = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.listen_and_serve(tx).await })
        };

        let mut events = Vec::new();
        for _ in 0..5 {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for an event")
                .expect("sink closed");
            events.push(event);
        }

        match &events[0] {
            RewindEvent::SuperHeader(sh) => {
                assert_eq!(sh.session_type, 7);
                assert_eq!(sh.source, 2041017);
                assert_eq!(sh.target, 204);
                assert_eq!(sh.source_call(), "PD0ZZ");
                assert_eq!(sh.target_call(), "");
            }
            other => panic!("expected SuperHeader, got {:?}", other),
        }
        assert_eq!(
            events[1],
            RewindEvent::DmrData {
                data_type: 0x02,
                data: vec![0x01, 0x02, 0x03],
            }
        );
        assert_eq!(
            events[2],
            RewindEvent::DmrData {
                data_type: 0x11,
                data: vec![0x04, 0x05],
            }
        );
        assert_eq!(
            events[3],
            RewindEvent::DmrAudio {
                audio_type: 0x03,
                data: vec![0x06, 0x07, 0x08],
            }
        );
        assert_eq!(
            events[4],
            RewindEvent::Raw {
                packet_type: 0x0200,
                data: b"busy".to_vec(),
            }
        );

        master.wait().await.unwrap();
        client.close();
        serve.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn corrupt_super_header_is_skipped() {
        let valid = vec![0u8; SUPER_HEADER_LEN];

        let mut master = MockMaster::new().await.unwrap();
        master.expect_prefix(
            SIGN,
            &[
                &server_packet(TYPE_SUPER_HEADER, 1, &[0u8; 10]),
                &server_packet(TYPE_SUPER_HEADER, 2, &valid),
            ],
        );
        master.start();

        let client = Arc::new(connect(&master, test_options()).await);
        let (tx, mut rx) = mpsc::channel(16);

        let serve = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.listen_and_serve(tx).await })
        };

        // Only the well-formed super header may surface.
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("sink closed");
        assert!(matches!(event, RewindEvent::SuperHeader(_)));
        assert!(rx.try_recv().is_err());

        master.wait().await.unwrap();
        client.close();
        serve.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn close_clears_auth_and_keeps_serving() {
        let mut master = MockMaster::new().await.unwrap();
        master.expect(
            &expected_keep_alive(1),
            &[&server_packet(TYPE_KEEP_ALIVE, 1, &[])],
        );
        // Configuration authenticates, close de-authenticates, and the
        // follow-up keep-alive must trigger a fresh configuration.
        master.expect_prefix(
            &client_packet(TYPE_CONFIGURATION, 2, &ConfigurationData(OPTION_SUPER_HEADER))[..10],
            &[
                &server_packet(TYPE_CONFIGURATION, 2, &[]),
                &server_packet(TYPE_CLOSE, 3, &[]),
                &server_packet(TYPE_KEEP_ALIVE, 4, &[]),
            ],
        );
        master.expect_prefix(
            &client_packet(TYPE_CONFIGURATION, 3, &ConfigurationData(OPTION_SUPER_HEADER))[..10],
            &[],
        );
        master.start();

        let client = Arc::new(connect(&master, test_options()).await);
        let (tx, _rx) = mpsc::channel(16);

        let serve = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.listen_and_serve(tx).await })
        };

        master.wait().await.unwrap();
        client.close();
        serve.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn keep_alives_repeat_while_idle() {
        let mut options = test_options();
        options.keep_alive = Duration::from_millis(50);
        options.timeout = Duration::from_secs(5);

        let mut master = MockMaster::new().await.unwrap();
        master.expect(&expected_keep_alive(1), &[]);
        master.expect(&expected_keep_alive(2), &[]);
        master.expect(&expected_keep_alive(3), &[]);
        master.start();

        let client = Arc::new(connect(&master, options).await);
        let (tx, _rx) = mpsc::channel(16);

        let serve = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.listen_and_serve(tx).await })
        };

        master.wait().await.unwrap();
        client.close();
        serve.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn authenticated_client_refreshes_configuration() {
        let mut options = test_options();
        options.keep_alive = Duration::from_millis(50);
        options.timeout = Duration::from_secs(5);

        let master = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let client = Arc::new(
            RewindClient::new_with_options(&master.local_addr().to_string(), PASSWORD, options)
                .await
                .unwrap(),
        );
        let (tx, _rx) = mpsc::channel(16);

        let serve = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.listen_and_serve(tx).await })
        };

        // Drive the handshake by hand: keep-alive in, configuration out.
        let mut buf = [0u8; 512];
        let (_, peer) = master.recv_from(&mut buf).await.unwrap();
        master
            .send_to(&server_packet(TYPE_KEEP_ALIVE, 1, &[]), peer)
            .await
            .unwrap();

        // First configuration, answered to authenticate the client.
        loop {
            let (n, _) = master.recv_from(&mut buf).await.unwrap();
            let header = PacketHeader::decode(&buf[..n]).unwrap();
            if header.packet_type == TYPE_CONFIGURATION {
                break;
            }
        }
        master
            .send_to(&server_packet(TYPE_CONFIGURATION, 2, &[]), peer)
            .await
            .unwrap();

        // The authenticated client must re-send its configuration without
        // further prompting once the keep-alive interval elapses.
        let refreshed = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let (n, _) = master.recv_from(&mut buf).await.unwrap();
                let header = PacketHeader::decode(&buf[..n]).unwrap();
                if header.packet_type == TYPE_CONFIGURATION {
                    return header;
                }
            }
        })
        .await
        .expect("no configuration refresh observed");
        assert_eq!(refreshed.packet_type, TYPE_CONFIGURATION);

        client.close();
        serve.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn foreign_signatures_do_not_advance_the_deadline() {
        let mut options = test_options();
        options.keep_alive = Duration::from_secs(5);
        options.timeout = Duration::from_millis(300);

        let master = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let client =
            RewindClient::new_with_options(&master.local_addr().to_string(), PASSWORD, options)
                .await
                .unwrap();
        let (tx, mut rx) = mpsc::channel(16);

        let feeder = tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (_, peer) = master.recv_from(&mut buf).await.unwrap();
            // Keep feeding garbage past the timeout deadline.
            for _ in 0..4 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                let _ = master.send_to(b"NOTREWIND_GARBAGE", peer).await;
            }
        });

        let started = std::time::Instant::now();
        let result = client.listen_and_serve(tx).await;

        assert!(matches!(result, Err(Error::Timeout(_))));
        assert!(
            started.elapsed() < Duration::from_millis(450),
            "garbage datagrams must not postpone the timeout"
        );
        assert!(rx.try_recv().is_err(), "garbage must not reach the sink");

        feeder.abort();
    }

    #[tokio::test]
    async fn sequence_numbers_increase_from_one() {
        let master = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let client =
            RewindClient::new_with_options(&master.local_addr().to_string(), PASSWORD, test_options())
                .await
                .unwrap();

        client.subscribe(204, SessionType::GroupVoice).await.unwrap();
        client.subscribe(91, SessionType::PrivateVoice).await.unwrap();

        let mut buf = [0u8; 512];
        let (n, _) = master.recv_from(&mut buf).await.unwrap();
        let first = PacketHeader::decode(&buf[..n]).unwrap();
        let (n, _) = master.recv_from(&mut buf).await.unwrap();
        let second = PacketHeader::decode(&buf[..n]).unwrap();

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(first.packet_type, TYPE_SUBSCRIPTION);
        assert_eq!(first.length, 8);
    }
}
