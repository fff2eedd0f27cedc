//! Error types for dmrlink.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Configuration, transport, protocol,
//! and liveness errors are all captured here.

use std::time::Duration;

/// The error type for all dmrlink operations.
///
/// Variants cover the full range of failure modes encountered when talking
/// to a DMR master server: invalid repeater configuration, socket failures,
/// protocol rejections, malformed payloads, and link timeouts.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The repeater callsign is missing, too short/long, or contains
    /// characters outside `A-Z0-9`.
    #[error("invalid callsign")]
    InvalidCallsign,

    /// The DMR color code is outside `[0, 15]`.
    #[error("invalid color code")]
    InvalidColorCode,

    /// The latitude is outside `[-90, +90]` degrees.
    #[error("invalid latitude")]
    InvalidLatitude,

    /// The longitude is outside `[-180, +180]` degrees.
    #[error("invalid longitude")]
    InvalidLongitude,

    /// The master rejected the login request (`MSTNAK` after `RPTL`).
    ///
    /// Typically means the repeater ID is unknown to the master or the
    /// master is not accepting new links.
    #[error("master refused login")]
    MasterRefusedLogin,

    /// The master rejected the authentication digest (`MSTNAK` after
    /// `RPTK`) -- the shared password is wrong.
    #[error("master refused password")]
    MasterRefusedPassword,

    /// The master closed the link (`MSTCL`).
    #[error("master sent close")]
    MasterClose,

    /// The master's login acknowledgement carried fewer than 8 nonce bytes.
    #[error("master sent short nonce")]
    MasterShortNonce,

    /// A buffer was too short for the fixed layout being decoded.
    #[error("short buffer")]
    ShortBuffer,

    /// The DMR data-type byte does not select a decodable frame layout.
    #[error("unknown data type {0:#04x}")]
    UnknownDataType(u8),

    /// A Rewind super header payload was shorter than its fixed layout.
    #[error("corrupt super header of {0} bytes")]
    CorruptSuperHeader(usize),

    /// A protocol-level error that does not fit a more specific variant
    /// (malformed record, unexpected length, bad signature).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No traffic was received from the master within the configured
    /// timeout interval. Carries the time since the last received packet.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The consumer side of the frame sink was dropped while the event
    /// loop was still delivering frames.
    #[error("stream closed")]
    StreamClosed,

    /// An underlying I/O error (socket read/write, dial failure).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
