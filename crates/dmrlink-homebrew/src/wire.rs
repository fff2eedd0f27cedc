//! Homebrew wire format: packet signatures, the packed options byte, and
//! the 53-byte `DMRD` record.
//!
//! The Homebrew protocol mixes ASCII-prefixed control packets (`RPTL`,
//! `MSTACK`, ...) with one fixed binary record type carrying DMR bursts.
//! All multi-byte integers in the binary record are big-endian.

use std::time::Duration;

use bytes::{BufMut, BytesMut};

use dmrlink_core::error::{Error, Result};
use dmrlink_core::id::DmrId;

/// Default master port for Homebrew links.
pub const DEFAULT_PORT: u16 = 62030;

/// Default keep-alive (ping) interval.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(5);

/// Default link timeout. The master is declared dead when nothing is
/// received for this long.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

// Packet signatures. Repeater-originated packets are prefixed `RPT`,
// master-originated packets `MST`; `DMRD` flows both ways.
/// DMR data record, both directions.
pub const SIGN_DMR_DATA: &[u8] = b"DMRD";
/// Repeater configuration record.
pub const SIGN_REPEATER_CONFIG: &[u8] = b"RPTC";
/// Repeater login request.
pub const SIGN_REPEATER_LOGIN: &[u8] = b"RPTL";
/// Repeater authentication key.
pub const SIGN_REPEATER_KEY: &[u8] = b"RPTK";
/// Ping response from the master.
pub const SIGN_REPEATER_PONG: &[u8] = b"RPTPONG";
/// Positive acknowledgement from the master.
pub const SIGN_MASTER_ACK: &[u8] = b"MSTACK";
/// Negative acknowledgement from the master.
pub const SIGN_MASTER_NAK: &[u8] = b"MSTNAK";
/// Keep-alive ping to the master.
pub const SIGN_MASTER_PING: &[u8] = b"MSTPING";
/// Link teardown from the master.
pub const SIGN_MASTER_CLOSE: &[u8] = b"MSTCL";

/// Frame type carried in bits 2-3 of [`Options`]: plain voice burst.
pub const FRAME_TYPE_VOICE: u8 = 0x00;
/// Frame type: voice burst with sync.
pub const FRAME_TYPE_VOICE_SYNC: u8 = 0x01;
/// Frame type: data burst.
pub const FRAME_TYPE_DATA: u8 = 0x02;

/// A DMR time slot.
///
/// DMR multiplexes two logical channels onto one carrier; every burst
/// belongs to exactly one of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TimeSlot {
    /// Time slot 1 (wire index 0).
    #[default]
    Ts1,
    /// Time slot 2 (wire index 1).
    Ts2,
}

impl TimeSlot {
    /// The wire index of this slot.
    pub fn index(self) -> u8 {
        match self {
            TimeSlot::Ts1 => 0,
            TimeSlot::Ts2 => 1,
        }
    }
}

/// The bit-packed options byte of a `DMRD` record.
///
/// Layout: bit 0 = time slot, bit 1 = call protect flag, bits 2-3 = frame
/// type, bits 4-7 = data-type nibble (DMR data type for data calls, voice
/// burst index for voice calls). The four accessors recompose the raw
/// byte exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options(u8);

impl Options {
    /// Wrap a raw options byte.
    pub fn from_raw(raw: u8) -> Self {
        Options(raw)
    }

    /// Pack the four fields into an options byte.
    pub fn pack(slot: TimeSlot, protect: bool, frame_type: u8, data_type: u8) -> Self {
        Options(
            slot.index()
                | (protect as u8) << 1
                | (frame_type & 0x03) << 2
                | (data_type & 0x0F) << 4,
        )
    }

    /// The raw byte.
    pub fn raw(&self) -> u8 {
        self.0
    }

    /// Slot index (0 = TS1, 1 = TS2).
    pub fn slot(&self) -> u8 {
        self.0 & 0x01
    }

    /// The time slot the burst belongs to.
    pub fn time_slot(&self) -> TimeSlot {
        match self.slot() {
            0 => TimeSlot::Ts1,
            _ => TimeSlot::Ts2,
        }
    }

    /// Protect flag (`false` = group call, `true` = private call).
    pub fn protect(&self) -> bool {
        (self.0 >> 1) & 0x01 == 1
    }

    /// Frame type ([`FRAME_TYPE_VOICE`], [`FRAME_TYPE_VOICE_SYNC`],
    /// [`FRAME_TYPE_DATA`]).
    pub fn frame_type(&self) -> u8 {
        (self.0 >> 2) & 0x03
    }

    /// DMR data type for data calls, voice burst index for voice calls.
    pub fn data_type(&self) -> u8 {
        self.0 >> 4
    }
}

/// Wire size of a [`DmrData`] record.
pub const DMR_DATA_LEN: usize = 53;

/// Payload size of a [`DmrData`] record (one DMR burst).
pub const DMR_DATA_PAYLOAD_LEN: usize = 33;

/// The Homebrew `DMRD` record: one DMR burst with its link metadata.
///
/// The 4-byte `DMRD` signature is implicit -- [`encode`](Self::encode)
/// always writes it and [`decode`](Self::decode) requires it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmrData {
    /// Sequence number of the burst within its transmission.
    pub sequence: u8,
    /// Source subscriber ID.
    pub source: DmrId,
    /// Target (talk-group or subscriber) ID.
    pub target: DmrId,
    /// ID of the repeater the burst passed through.
    pub repeater: u32,
    /// Packed slot/protect/frame-type/data-type flags.
    pub options: Options,
    /// Stream ID, constant for all bursts of one transmission.
    pub stream: u32,
    /// The raw DMR burst.
    pub data: [u8; DMR_DATA_PAYLOAD_LEN],
}

impl Default for DmrData {
    fn default() -> Self {
        DmrData {
            sequence: 0,
            source: DmrId::default(),
            target: DmrId::default(),
            repeater: 0,
            options: Options::default(),
            stream: 0,
            data: [0u8; DMR_DATA_PAYLOAD_LEN],
        }
    }
}

impl DmrData {
    /// Decode a record from exactly [`DMR_DATA_LEN`] bytes.
    ///
    /// Shorter buffers fail with [`Error::ShortBuffer`]; longer buffers or
    /// a wrong signature fail with [`Error::Protocol`]. The strict length
    /// check keeps a truncated datagram from decoding into garbage IDs.
    pub fn decode(b: &[u8]) -> Result<Self> {
        if b.len() < DMR_DATA_LEN {
            return Err(Error::ShortBuffer);
        }
        if b.len() > DMR_DATA_LEN {
            return Err(Error::Protocol(format!(
                "DMRD record of {} bytes, expected {}",
                b.len(),
                DMR_DATA_LEN
            )));
        }
        if &b[..4] != SIGN_DMR_DATA {
            return Err(Error::Protocol(format!(
                "bad DMRD signature {:02X?}",
                &b[..4]
            )));
        }

        let mut data = [0u8; DMR_DATA_PAYLOAD_LEN];
        data.copy_from_slice(&b[20..53]);

        Ok(DmrData {
            sequence: b[4],
            source: DmrId::from_bytes([b[5], b[6], b[7]]),
            target: DmrId::from_bytes([b[8], b[9], b[10]]),
            repeater: u32::from_be_bytes([b[11], b[12], b[13], b[14]]),
            options: Options::from_raw(b[15]),
            stream: u32::from_be_bytes([b[16], b[17], b[18], b[19]]),
            data,
        })
    }

    /// Encode the record to its exact wire layout, signature included.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(DMR_DATA_LEN);
        buf.put_slice(SIGN_DMR_DATA);
        buf.put_u8(self.sequence);
        buf.put_slice(&self.source.as_bytes());
        buf.put_slice(&self.target.as_bytes());
        buf.put_u32(self.repeater);
        buf.put_u8(self.options.raw());
        buf.put_u32(self.stream);
        buf.put_slice(&self.data);
        buf.to_vec()
    }
}
