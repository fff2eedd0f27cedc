//! Rewind wire format: the 18-byte packet header, the type taxonomy, and
//! the payload codecs.
//!
//! Every Rewind datagram starts with the ASCII signature `REWIND01`
//! followed by a little-endian header and a payload whose layout depends
//! on the 16-bit packet type. Types are grouped into 256-wide classes by
//! their high byte. This module is a pure codec with no I/O dependencies.

use std::time::Duration;

use bytes::{BufMut, BytesMut};

use dmrlink_core::error::{Error, Result};

/// Protocol signature opening every datagram.
pub const SIGN: &[u8] = b"REWIND01";

/// Length of the signature.
pub const SIGN_LEN: usize = 8;

/// Length of the full packet header (signature included).
pub const HEADER_LEN: usize = SIGN_LEN + 10;

/// Length of a callsign buffer in a super header.
pub const CALL_LEN: usize = 10;

/// Length of the description buffer in a [`VersionData`].
pub const DESCRIPTION_LEN: usize = 96;

/// Wire size of a [`SuperHeader`] payload.
pub const SUPER_HEADER_LEN: usize = 32;

/// Default master port for Rewind links.
pub const DEFAULT_PORT: u16 = 54005;

/// Default keep-alive interval.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(5);

/// Default link timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

// Packet classes (high byte of the type).
/// Transport control: keep-alives and authentication.
pub const CLASS_REWIND_CONTROL: u16 = 0x0000;
/// System console traffic.
pub const CLASS_SYSTEM_CONSOLE: u16 = 0x0100;
/// Service notices.
pub const CLASS_SERVICE_NOTICE: u16 = 0x0200;
/// Vendor device data.
pub const CLASS_DEVICE_DATA: u16 = 0x0800;
/// Simple external application traffic.
pub const CLASS_APPLICATION: u16 = 0x0900;

// Control types.
/// Keep-alive, carries a [`VersionData`] from the client.
pub const TYPE_KEEP_ALIVE: u16 = CLASS_REWIND_CONTROL;
/// Session teardown from the server.
pub const TYPE_CLOSE: u16 = CLASS_REWIND_CONTROL + 1;
/// Authentication challenge from the server.
pub const TYPE_CHALLENGE: u16 = CLASS_REWIND_CONTROL + 2;
/// Challenge response from the client.
pub const TYPE_AUTHENTICATION: u16 = CLASS_REWIND_CONTROL + 3;

// System console types.
/// Informational report from the server.
pub const TYPE_REPORT: u16 = CLASS_SYSTEM_CONSOLE;

// Service notice types.
/// Server busy notice.
pub const TYPE_BUSY_NOTICE: u16 = CLASS_SERVICE_NOTICE;
/// Address notice.
pub const TYPE_ADDRESS_NOTICE: u16 = CLASS_SERVICE_NOTICE + 1;
/// Binding notice.
pub const TYPE_BINDING_NOTICE: u16 = CLASS_SERVICE_NOTICE + 2;

// Vendor subspaces within the device data class.
/// Kairos device data.
pub const CLASS_KAIROS_DATA: u16 = CLASS_DEVICE_DATA;
/// Hytera device data.
pub const CLASS_HYTERA_DATA: u16 = CLASS_DEVICE_DATA + 0x10;

// Application types.
/// Session configuration, carries a [`ConfigurationData`].
pub const TYPE_CONFIGURATION: u16 = CLASS_APPLICATION;
/// Talk-group subscription, carries a [`SubscriptionData`].
pub const TYPE_SUBSCRIPTION: u16 = CLASS_APPLICATION + 1;
/// First of the DMR data types; the low nibble is the DMR data type.
pub const TYPE_DMR_DATA_BASE: u16 = CLASS_APPLICATION + 0x10;
/// First of the DMR audio types; the offset is the voice burst index.
pub const TYPE_DMR_AUDIO_BASE: u16 = CLASS_APPLICATION + 0x20;
/// Embedded data extracted from a voice superframe.
pub const TYPE_DMR_EMBEDDED_DATA: u16 = CLASS_APPLICATION + 0x27;
/// Call metadata preamble, carries a [`SuperHeader`].
pub const TYPE_SUPER_HEADER: u16 = CLASS_APPLICATION + 0x28;
/// Failure code.
pub const TYPE_FAILURE_CODE: u16 = CLASS_APPLICATION + 0x29;

// Service identifiers announced in a VersionData.
/// Repeater agent role base.
pub const ROLE_REPEATER_AGENT: u8 = 0x10;
/// Application role base.
pub const ROLE_APPLICATION: u8 = 0x20;
/// Cronos repeater agent.
pub const SERVICE_CRONOS_AGENT: u8 = ROLE_REPEATER_AGENT;
/// Tellus repeater agent.
pub const SERVICE_TELLUS_AGENT: u8 = ROLE_REPEATER_AGENT + 1;
/// Simple external application (this library).
pub const SERVICE_SIMPLE_APPLICATION: u8 = ROLE_APPLICATION;

// Session option flags carried in a ConfigurationData.
/// Ask the server to send super header metadata before each call.
pub const OPTION_SUPER_HEADER: u32 = 1;
/// Ask for linear coded AMBE without FEC.
pub const OPTION_LINEAR_FRAME: u32 = 2;

/// Type of a voice session, used in subscriptions and super headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SessionType {
    /// Private (unit-to-unit) voice call.
    PrivateVoice = 5,
    /// Group (talk-group) voice call.
    GroupVoice = 7,
}

impl SessionType {
    /// The wire value of this session type.
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// The Rewind packet header that follows the signature on the wire.
///
/// `length` declares the payload size on outbound packets; inbound packets
/// are sized by the datagram boundary instead, so the field is decoded but
/// not enforced. `flags` is decoded but never interpreted, and always zero
/// on send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketHeader {
    /// Packet type, class-tagged by its high byte.
    pub packet_type: u16,
    /// Flags; preserved but uninterpreted.
    pub flags: u16,
    /// Per-sender monotonic sequence number.
    pub sequence: u32,
    /// Declared payload length.
    pub length: u16,
}

impl PacketHeader {
    /// Decode a header from the start of a datagram.
    ///
    /// Requires [`HEADER_LEN`] bytes and the `REWIND01` signature.
    pub fn decode(b: &[u8]) -> Result<Self> {
        if b.len() < HEADER_LEN {
            return Err(Error::ShortBuffer);
        }
        if &b[..SIGN_LEN] != SIGN {
            return Err(Error::Protocol(format!(
                "bad signature {:02X?}",
                &b[..SIGN_LEN]
            )));
        }
        Ok(PacketHeader {
            packet_type: u16::from_le_bytes([b[8], b[9]]),
            flags: u16::from_le_bytes([b[10], b[11]]),
            sequence: u32::from_le_bytes([b[12], b[13], b[14], b[15]]),
            length: u16::from_le_bytes([b[16], b[17]]),
        })
    }

    /// Encode the header, signature included.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[..SIGN_LEN].copy_from_slice(SIGN);
        buf[8..10].copy_from_slice(&self.packet_type.to_le_bytes());
        buf[10..12].copy_from_slice(&self.flags.to_le_bytes());
        buf[12..16].copy_from_slice(&self.sequence.to_le_bytes());
        buf[16..18].copy_from_slice(&self.length.to_le_bytes());
        buf
    }
}

/// A payload that can follow a [`PacketHeader`] on the wire.
pub trait Payload: Send + Sync {
    /// Number of bytes [`encode`](Self::encode) will write.
    fn wire_len(&self) -> usize;

    /// Append the payload's wire form to `buf`.
    fn encode(&self, buf: &mut BytesMut);
}

impl Payload for &[u8] {
    fn wire_len(&self) -> usize {
        self.len()
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(self);
    }
}

/// Client identification carried in every outbound keep-alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionData {
    /// The remote application's DMR ID.
    pub remote_id: u32,
    /// Announced service, e.g. [`SERVICE_SIMPLE_APPLICATION`].
    pub service: u8,
    /// NUL-padded software description.
    pub description: [u8; DESCRIPTION_LEN],
}

impl VersionData {
    /// Build a version record with the description truncated to fit.
    pub fn new(remote_id: u32, service: u8, description: &str) -> Self {
        let mut buf = [0u8; DESCRIPTION_LEN];
        let bytes = description.as_bytes();
        let n = bytes.len().min(DESCRIPTION_LEN);
        buf[..n].copy_from_slice(&bytes[..n]);
        VersionData {
            remote_id,
            service,
            description: buf,
        }
    }

    /// Length of the description up to its first NUL.
    fn description_len(&self) -> usize {
        self.description
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(DESCRIPTION_LEN)
    }
}

impl Payload for VersionData {
    fn wire_len(&self) -> usize {
        5 + self.description_len()
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.remote_id);
        buf.put_u8(self.service);
        buf.put_slice(&self.description[..self.description_len()]);
    }
}

/// Session option flags sent in a configuration packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigurationData(pub u32);

impl Payload for ConfigurationData {
    fn wire_len(&self) -> usize {
        4
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.0);
    }
}

/// A talk-group or private-call subscription request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionData {
    /// Session type of the subscription.
    pub session_type: SessionType,
    /// Target DMR ID.
    pub target: u32,
}

impl Payload for SubscriptionData {
    fn wire_len(&self) -> usize {
        8
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.session_type.as_u32());
        buf.put_u32_le(self.target);
    }
}

/// Call metadata the server sends before voice traffic when
/// [`OPTION_SUPER_HEADER`] is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperHeader {
    /// Session type as sent by the server (5 = private, 7 = group).
    pub session_type: u32,
    /// Source DMR ID.
    pub source: u32,
    /// Target DMR ID.
    pub target: u32,
    /// Source callsign, NUL-padded (or all zeros).
    pub source_call: [u8; CALL_LEN],
    /// Target callsign, NUL-padded (or all zeros).
    pub target_call: [u8; CALL_LEN],
}

impl SuperHeader {
    /// Decode from a packet payload of at least [`SUPER_HEADER_LEN`] bytes.
    pub fn decode(b: &[u8]) -> Result<Self> {
        if b.len() < SUPER_HEADER_LEN {
            return Err(Error::CorruptSuperHeader(b.len()));
        }
        let mut source_call = [0u8; CALL_LEN];
        source_call.copy_from_slice(&b[12..22]);
        let mut target_call = [0u8; CALL_LEN];
        target_call.copy_from_slice(&b[22..32]);
        Ok(SuperHeader {
            session_type: u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            source: u32::from_le_bytes([b[4], b[5], b[6], b[7]]),
            target: u32::from_le_bytes([b[8], b[9], b[10], b[11]]),
            source_call,
            target_call,
        })
    }

    /// The source callsign up to its first NUL.
    pub fn source_call(&self) -> String {
        call_to_string(&self.source_call)
    }

    /// The target callsign up to its first NUL.
    pub fn target_call(&self) -> String {
        call_to_string(&self.target_call)
    }
}

fn call_to_string(call: &[u8; CALL_LEN]) -> String {
    let end = call.iter().position(|&b| b == 0).unwrap_or(CALL_LEN);
    String::from_utf8_lossy(&call[..end]).into_owned()
}
