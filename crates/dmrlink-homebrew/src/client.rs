//! Homebrew protocol client.
//!
//! [`HomebrewClient`] links a repeater to a DMR master over UDP: a
//! four-step authenticated handshake (login, nonce, keyed response,
//! configuration), then a steady state of keep-alive pings and `DMRD`
//! record exchange. Decoded records are delivered to a caller-supplied
//! sink; outbound records go through [`write_dmr`](HomebrewClient::write_dmr).
//!
//! One background task owns the socket's read direction; the event loop
//! owns the write direction and all authentication state.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use dmrlink_core::error::{Error, Result};
use dmrlink_transport::UdpTransport;

use crate::config::Config;
use crate::wire::{
    DmrData, DEFAULT_KEEP_ALIVE, DEFAULT_PORT, DEFAULT_TIMEOUT, SIGN_DMR_DATA, SIGN_MASTER_ACK,
    SIGN_MASTER_CLOSE, SIGN_MASTER_NAK, SIGN_MASTER_PING, SIGN_REPEATER_KEY, SIGN_REPEATER_LOGIN,
    SIGN_REPEATER_PONG,
};

/// Authentication progress of the login handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthState {
    None,
    SentLogin,
    SentKey,
    Done,
    Failed,
}

/// State owned exclusively by the event loop.
struct Session {
    auth: AuthState,
    nonce: [u8; 8],
    ping_sent: Option<Instant>,
    last_received: Instant,
}

/// Client implementing the Homebrew repeater-linking protocol.
///
/// # Example
///
/// ```no_run
/// use dmrlink_homebrew::{Config, DmrData, HomebrewClient};
/// use tokio::sync::mpsc;
///
/// # async fn example() -> dmrlink_core::Result<()> {
/// let config = Config {
///     callsign: "PD0ZZ".into(),
///     id: 2041099,
///     rx_freq: 438_200_000,
///     tx_freq: 430_600_000,
///     color_code: 1,
///     ..Config::default()
/// };
///
/// let client = HomebrewClient::new(config, "master.example.org", "secret").await?;
/// let (tx, mut rx) = mpsc::channel::<DmrData>(16);
///
/// tokio::spawn(async move {
///     while let Some(record) = rx.recv().await {
///         println!("burst {} -> {}", record.source, record.target);
///     }
/// });
///
/// client.listen_and_serve(tx).await
/// # }
/// ```
pub struct HomebrewClient {
    keep_alive: Duration,
    timeout: Duration,
    config: Config,
    password: String,
    hex_id: [u8; 8],
    transport: Arc<UdpTransport>,
    quit_tx: mpsc::Sender<()>,
    quit_rx: tokio::sync::Mutex<Option<mpsc::Receiver<()>>>,
    ping_latency: Mutex<Option<Duration>>,
}

impl HomebrewClient {
    /// Create a client connected to the master at `addr`.
    ///
    /// The configuration is normalized and validated first
    /// ([`Config::check`]); the default port 62030 is appended when `addr`
    /// carries none. No packet is sent until
    /// [`listen_and_serve`](Self::listen_and_serve).
    pub async fn new(mut config: Config, addr: &str, password: &str) -> Result<Self> {
        config.check()?;

        let transport = UdpTransport::connect(addr, DEFAULT_PORT).await?;

        let mut hex_id = [0u8; 8];
        hex_id.copy_from_slice(format!("{:08x}", config.id).as_bytes());

        let (quit_tx, quit_rx) = mpsc::channel(2);

        Ok(Self {
            keep_alive: DEFAULT_KEEP_ALIVE,
            timeout: DEFAULT_TIMEOUT,
            config,
            password: password.to_string(),
            hex_id,
            transport: Arc::new(transport),
            quit_tx,
            quit_rx: tokio::sync::Mutex::new(Some(quit_rx)),
            ping_latency: Mutex::new(None),
        })
    }

    /// Override the keep-alive (ping) interval.
    pub fn with_keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = interval;
        self
    }

    /// Override the link timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The last measured ping round-trip time, if any pong arrived yet.
    pub fn latency(&self) -> Option<Duration> {
        *self.ping_latency.lock().expect("latency lock poisoned")
    }

    /// Run the packet receiver and the protocol event loop.
    ///
    /// Performs the login handshake, then delivers every decoded inbound
    /// [`DmrData`] record to `sink`. Blocks until a fatal protocol error,
    /// a transport error, a link timeout, or [`close`](Self::close).
    pub async fn listen_and_serve(&self, sink: mpsc::Sender<DmrData>) -> Result<()> {
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
        sink: &mpsc::Sender<DmrData>,
    ) -> Result<()> {
        let mut session = Session {
            auth: AuthState::None,
            nonce: [0u8; 8],
            ping_sent: None,
            last_received: Instant::now(),
        };

        self.send_login(&mut session).await?;

        let mut keep_alive =
            tokio::time::interval_at(Instant::now() + self.keep_alive, self.keep_alive);
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            // Ping whenever the interval has lapsed, not only on ticks.
            if session.auth == AuthState::Done
                && session
                    .ping_sent
                    .map_or(true, |sent| sent.elapsed() > self.keep_alive)
            {
                self.send_ping(&mut session).await?;
            }

            tokio::select! {
                maybe = data_rx.recv() => {
                    let data = match maybe {
                        Some(data) => data,
                        None => {
                            // The receive worker ended; its error is queued.
                            return Err(err_rx.recv().await.unwrap_or_else(|| {
                                Error::Protocol("receive worker stopped unexpectedly".into())
                            }));
                        }
                    };

                    self.handle_packet(&data, &mut session, sink).await?;

                    session.last_received = Instant::now();
                    deadline.as_mut().reset(Instant::now() + self.timeout);
                }

                _ = keep_alive.tick() => {
                    if session.auth == AuthState::Done {
                        self.send_ping(&mut session).await?;
                    }
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
    /// worker. Safe to call more than once; the tokens are best-effort
    /// once the loop has already returned.
    pub fn close(&self) {
        let _ = self.quit_tx.try_send(());
        let _ = self.quit_tx.try_send(());
    }

    /// Encode and send an outbound DMR data record.
    ///
    /// The `DMRD` signature is part of the encoding, so whatever record the
    /// caller built goes out correctly signed.
    pub async fn write_dmr(&self, record: &DmrData) -> Result<()> {
        self.transport.send(&record.encode()).await
    }

    async fn handle_packet(
        &self,
        b: &[u8],
        session: &mut Session,
        sink: &mpsc::Sender<DmrData>,
    ) -> Result<()> {
        if b.len() < 3 {
            tracing::debug!(bytes = b.len(), "ignoring runt packet");
            return Ok(());
        }

        match session.auth {
            AuthState::SentLogin => {
                // We expect MSTACK (with nonce) or MSTNAK.
                if b.starts_with(SIGN_MASTER_NAK) {
                    session.auth = AuthState::Failed;
                    return Err(Error::MasterRefusedLogin);
                }
                if b.starts_with(SIGN_MASTER_ACK) {
                    let nonce_offset = SIGN_MASTER_ACK.len() + 8;
                    if b.len() < nonce_offset + 8 {
                        session.auth = AuthState::Failed;
                        return Err(Error::MasterShortNonce);
                    }
                    session
                        .nonce
                        .copy_from_slice(&b[nonce_offset..nonce_offset + 8]);
                    tracing::debug!("received nonce, sending password digest");
                    return self.send_key(session).await;
                }
                tracing::debug!(packet = %String::from_utf8_lossy(b), "ignoring packet during login");
                return Ok(());
            }

            AuthState::SentKey => {
                // We expect MSTACK or MSTNAK.
                if b.starts_with(SIGN_MASTER_NAK) {
                    session.auth = AuthState::Failed;
                    return Err(Error::MasterRefusedPassword);
                }
                if b.starts_with(SIGN_MASTER_ACK) {
                    tracing::debug!("logged in, sending configuration");
                    session.auth = AuthState::Done;
                    return self.send_configuration().await;
                }
                tracing::debug!(packet = %String::from_utf8_lossy(b), "ignoring packet during key exchange");
                return Ok(());
            }

            _ => {}
        }

        if b.starts_with(SIGN_DMR_DATA) {
            match DmrData::decode(b) {
                Ok(record) => {
                    sink.send(record).await.map_err(|_| Error::StreamClosed)?;
                }
                Err(e) => {
                    tracing::warn!(bytes = b.len(), error = %e, "failed to decode DMRD record");
                }
            }
            return Ok(());
        }

        if b.starts_with(SIGN_MASTER_CLOSE) {
            return Err(Error::MasterClose);
        }

        if b.starts_with(SIGN_MASTER_ACK) {
            tracing::debug!("configuration accepted by master");
            return self.send_ping(session).await;
        }

        if b.starts_with(SIGN_MASTER_NAK) {
            tracing::warn!("master dropped the link, logging in again");
            return self.send_login(session).await;
        }

        if b.starts_with(SIGN_REPEATER_PONG) {
            if let Some(sent) = session.ping_sent {
                let latency = sent.elapsed();
                *self.ping_latency.lock().expect("latency lock poisoned") = Some(latency);
                tracing::debug!(latency_ms = latency.as_millis() as u64, "ping RTT");
            }
            return Ok(());
        }

        tracing::debug!(packet = %String::from_utf8_lossy(b), "ignoring unknown packet");
        Ok(())
    }

    async fn send_login(&self, session: &mut Session) -> Result<()> {
        let mut data = Vec::with_capacity(SIGN_REPEATER_LOGIN.len() + 8);
        data.extend_from_slice(SIGN_REPEATER_LOGIN);
        data.extend_from_slice(&self.hex_id);
        session.auth = AuthState::SentLogin;
        self.transport.send(&data).await
    }

    async fn send_key(&self, session: &mut Session) -> Result<()> {
        let mut hasher = Sha256::new();
        hasher.update(session.nonce);
        hasher.update(self.password.as_bytes());
        let digest = hasher.finalize();

        let mut data = Vec::with_capacity(SIGN_REPEATER_KEY.len() + 8 + 64);
        data.extend_from_slice(SIGN_REPEATER_KEY);
        data.extend_from_slice(&self.hex_id);
        data.extend_from_slice(hex::encode(digest).as_bytes());
        session.auth = AuthState::SentKey;
        self.transport.send(&data).await
    }

    async fn send_configuration(&self) -> Result<()> {
        self.config.validate()?;
        tracing::debug!(callsign = %self.config.callsign, id = self.config.id, "sending configuration");
        self.transport.send(&self.config.encode()).await
    }

    async fn send_ping(&self, session: &mut Session) -> Result<()> {
        let mut data = Vec::with_capacity(SIGN_MASTER_PING.len() + 8);
        data.extend_from_slice(SIGN_MASTER_PING);
        data.extend_from_slice(&self.hex_id);
        let result = self.transport.send(&data).await;
        session.ping_sent = Some(Instant::now());
        result
    }
}
