//! DMR frame codec.
//!
//! Parses the payload of a DMR burst into a typed frame, selected by the
//! data-type byte that accompanies it on both the Homebrew and Rewind
//! links. This module is a pure codec with no I/O dependencies: all
//! functions operate on raw byte slices and return parsed structures or
//! errors.
//!
//! Multi-byte integers are big-endian. Decoders are tolerant of trailing
//! bytes -- bursts arrive padded to 12 bytes while the Full Link Control
//! layout is 9 -- but never of short buffers.

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::id::DmrId;

// Standard DMR data types (ETSI TS 102 361-1).
/// PI (privacy indicator) header.
pub const TYPE_PI_HEADER: u8 = 0x00;
/// Voice LC header, opens a voice call.
pub const TYPE_VOICE_HEADER: u8 = 0x01;
/// Terminator with LC, closes a voice call.
pub const TYPE_TERMINATOR_LC: u8 = 0x02;
/// Control Signalling Block.
pub const TYPE_CSBK: u8 = 0x03;
/// Multi Block Control header.
pub const TYPE_MBC_HEADER: u8 = 0x04;
/// Multi Block Control continuation.
pub const TYPE_MBC_CONTINUATION: u8 = 0x05;
/// Data header.
pub const TYPE_DATA_HEADER: u8 = 0x06;
/// Rate 1/2 coded data.
pub const TYPE_RATE12_DATA: u8 = 0x07;
/// Rate 3/4 coded data.
pub const TYPE_RATE34_DATA: u8 = 0x08;
/// Idle burst.
pub const TYPE_IDLE: u8 = 0x09;

// Pseudo types used by the master links for the six voice bursts of a
// superframe and for extracted embedded data.
/// Voice burst A (pseudo type).
pub const TYPE_VOICE_FRAME_A: u8 = 0x0A;
/// Voice burst B (pseudo type).
pub const TYPE_VOICE_FRAME_B: u8 = 0x0B;
/// Voice burst C (pseudo type).
pub const TYPE_VOICE_FRAME_C: u8 = 0x0C;
/// Voice burst D (pseudo type).
pub const TYPE_VOICE_FRAME_D: u8 = 0x0D;
/// Voice burst E (pseudo type).
pub const TYPE_VOICE_FRAME_E: u8 = 0x0E;
/// Voice burst F (pseudo type).
pub const TYPE_VOICE_FRAME_F: u8 = 0x0F;
/// Embedded data extracted from a voice superframe (pseudo type).
pub const TYPE_EMBEDDED_DATA: u8 = 0x11;

/// Wire size of a [`FullLc`].
pub const FULL_LC_LEN: usize = 9;
/// Wire size of an [`EmbeddedData`].
pub const EMBEDDED_DATA_LEN: usize = 8;
/// Wire size of a [`Voice`] burst.
pub const VOICE_LEN: usize = 33;

/// Link Control lead-in: the options byte and the feature set ID.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lc {
    /// Bit 7 is the protect flag, bits 0-6 the FLCO opcode.
    pub options: u8,
    /// Feature set ID (0 for the standardized feature set).
    pub feature_set_id: u8,
}

impl Lc {
    /// Protect flag: `true` indicates a private call.
    pub fn protect(&self) -> bool {
        self.options & 0x80 == 0x80
    }

    /// The FLCO (Full Link Control Opcode).
    pub fn opcode(&self) -> u8 {
        self.options & 0x7F
    }
}

/// Full Link Control: call signaling carried in voice headers and
/// terminators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullLc {
    /// Link Control lead-in.
    pub lc: Lc,
    /// Service options (priority, broadcast, emergency flags).
    pub service_options: u8,
    /// Target (talk-group or subscriber) ID.
    pub target: DmrId,
    /// Source subscriber ID.
    pub source: DmrId,
}

impl FullLc {
    /// Decode from the first [`FULL_LC_LEN`] bytes of `data`. Trailing
    /// bytes are ignored.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < FULL_LC_LEN {
            return Err(Error::ShortBuffer);
        }
        Ok(FullLc {
            lc: Lc {
                options: data[0],
                feature_set_id: data[1],
            },
            service_options: data[2],
            target: DmrId::from_bytes([data[3], data[4], data[5]]),
            source: DmrId::from_bytes([data[6], data[7], data[8]]),
        })
    }

    /// Encode to the exact wire layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(FULL_LC_LEN);
        buf.put_u8(self.lc.options);
        buf.put_u8(self.lc.feature_set_id);
        buf.put_u8(self.service_options);
        buf.put_slice(&self.target.as_bytes());
        buf.put_slice(&self.source.as_bytes());
        buf.to_vec()
    }
}

/// Embedded Data: abbreviated Link Control distributed across the EMB
/// fields of a voice superframe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbeddedData {
    /// Link Control lead-in.
    pub lc: Lc,
    /// Target (talk-group or subscriber) ID.
    pub target: DmrId,
    /// Source subscriber ID.
    pub source: DmrId,
}

impl EmbeddedData {
    /// Decode from the first [`EMBEDDED_DATA_LEN`] bytes of `data`.
    /// Trailing bytes are ignored.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < EMBEDDED_DATA_LEN {
            return Err(Error::ShortBuffer);
        }
        Ok(EmbeddedData {
            lc: Lc {
                options: data[0],
                feature_set_id: data[1],
            },
            target: DmrId::from_bytes([data[2], data[3], data[4]]),
            source: DmrId::from_bytes([data[5], data[6], data[7]]),
        })
    }

    /// Encode to the exact wire layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(EMBEDDED_DATA_LEN);
        buf.put_u8(self.lc.options);
        buf.put_u8(self.lc.feature_set_id);
        buf.put_slice(&self.target.as_bytes());
        buf.put_slice(&self.source.as_bytes());
        buf.to_vec()
    }
}

/// A single AMBE-encoded voice burst. The audio is opaque to this library;
/// vocoder work happens downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Voice(pub [u8; VOICE_LEN]);

impl Voice {
    /// Decode from the first [`VOICE_LEN`] bytes of `data`. Trailing bytes
    /// are ignored.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < VOICE_LEN {
            return Err(Error::ShortBuffer);
        }
        let mut bytes = [0u8; VOICE_LEN];
        bytes.copy_from_slice(&data[..VOICE_LEN]);
        Ok(Voice(bytes))
    }

    /// The raw burst bytes.
    pub fn as_bytes(&self) -> &[u8; VOICE_LEN] {
        &self.0
    }
}

impl Default for Voice {
    fn default() -> Self {
        Voice([0u8; VOICE_LEN])
    }
}

/// A parsed DMR frame, tagged by the data type it was decoded from.
///
/// Voice headers and terminators share the [`FullLc`] layout but keep
/// distinct identity so consumers can open and close calls on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Voice LC header ([`TYPE_VOICE_HEADER`]).
    VoiceHeader(FullLc),
    /// Terminator with LC ([`TYPE_TERMINATOR_LC`]).
    TerminatorLc(FullLc),
    /// Embedded data ([`TYPE_EMBEDDED_DATA`]).
    EmbeddedData(EmbeddedData),
    /// One of the six voice bursts A-F.
    Voice(Voice),
}

/// Parse a DMR payload according to its data-type byte.
///
/// Only voice headers, terminators, embedded data, and the six voice
/// pseudo-types carry a layout this codec decodes; any other data type
/// fails with [`Error::UnknownDataType`]. Buffers shorter than the
/// selected layout fail with [`Error::ShortBuffer`]; longer buffers are
/// accepted and the excess ignored.
///
/// The codec is stateless -- parallel invocations on disjoint buffers are
/// safe.
///
/// # Example
///
/// ```
/// use dmrlink_core::frame::{parse, Frame, TYPE_VOICE_HEADER};
///
/// let burst = [0x00, 0x00, 0x00, 0x00, 0x00, 0xCC, 0x1F, 0x24, 0xB9, 0x8B, 0x3D, 0xD8];
/// match parse(TYPE_VOICE_HEADER, &burst).unwrap() {
///     Frame::VoiceHeader(lc) => assert_eq!(lc.target.as_u32(), 204),
///     other => panic!("unexpected frame: {:?}", other),
/// }
/// ```
pub fn parse(data_type: u8, data: &[u8]) -> Result<Frame> {
    match data_type {
        TYPE_VOICE_HEADER => Ok(Frame::VoiceHeader(FullLc::decode(data)?)),
        TYPE_TERMINATOR_LC => Ok(Frame::TerminatorLc(FullLc::decode(data)?)),
        TYPE_EMBEDDED_DATA => Ok(Frame::EmbeddedData(EmbeddedData::decode(data)?)),
        TYPE_VOICE_FRAME_A..=TYPE_VOICE_FRAME_F => Ok(Frame::Voice(Voice::decode(data)?)),
        other => Err(Error::UnknownDataType(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_voice_header() {
        // Captured burst: group call to TG 204 from 2041017.
        let data = [
            0x00, 0x00, 0x00, 0x00, 0x00, 0xCC, 0x1F, 0x24, 0xB9, 0x8B, 0x3D, 0xD8,
        ];
        let frame = parse(TYPE_VOICE_HEADER, &data).unwrap();
        match frame {
            Frame::VoiceHeader(lc) => {
                assert_eq!(lc.lc.options, 0);
                assert!(!lc.lc.protect());
                assert_eq!(lc.lc.opcode(), 0);
                assert_eq!(lc.lc.feature_set_id, 0);
                assert_eq!(lc.service_options, 0);
                assert_eq!(lc.target.as_u32(), 204);
                assert_eq!(lc.source.as_u32(), 2041017);
            }
            other => panic!("expected VoiceHeader, got {:?}", other),
        }
    }

    #[test]
    fn parse_terminator_lc() {
        // Captured burst: end of a call to TG 310 from 3147543.
        let data = [
            0x00, 0x00, 0x00, 0x00, 0x01, 0x36, 0x30, 0x07, 0x17, 0x70, 0x94, 0x07,
        ];
        let frame = parse(TYPE_TERMINATOR_LC, &data).unwrap();
        match frame {
            Frame::TerminatorLc(lc) => {
                assert_eq!(lc.target.as_u32(), 310);
                assert_eq!(lc.source.as_u32(), 3147543);
            }
            other => panic!("expected TerminatorLc, got {:?}", other),
        }
    }

    #[test]
    fn parse_embedded_data() {
        let data = [0x80, 0x00, 0x00, 0x00, 0x09, 0x1F, 0x24, 0xB9];
        let frame = parse(TYPE_EMBEDDED_DATA, &data).unwrap();
        match frame {
            Frame::EmbeddedData(ed) => {
                assert!(ed.lc.protect());
                assert_eq!(ed.target.as_u32(), 9);
                assert_eq!(ed.source.as_u32(), 2041017);
            }
            other => panic!("expected EmbeddedData, got {:?}", other),
        }
    }

    #[test]
    fn parse_voice_frames() {
        let data = [0x42u8; VOICE_LEN];
        for data_type in TYPE_VOICE_FRAME_A..=TYPE_VOICE_FRAME_F {
            let frame = parse(data_type, &data).unwrap();
            match frame {
                Frame::Voice(v) => assert_eq!(v.as_bytes(), &data),
                other => panic!("expected Voice for {:#04x}, got {:?}", data_type, other),
            }
        }
    }

    #[test]
    fn parse_rejects_unknown_data_type() {
        let err = parse(0xFF, &[0xFF]).unwrap_err();
        assert!(matches!(err, Error::UnknownDataType(0xFF)));
    }

    #[test]
    fn parse_rejects_undecodable_standard_types() {
        for data_type in [TYPE_PI_HEADER, TYPE_CSBK, TYPE_DATA_HEADER, TYPE_IDLE] {
            let err = parse(data_type, &[0u8; 12]).unwrap_err();
            assert!(
                matches!(err, Error::UnknownDataType(t) if t == data_type),
                "data type {:#04x}",
                data_type
            );
        }
    }

    #[test]
    fn parse_rejects_short_buffers() {
        assert!(matches!(
            parse(TYPE_EMBEDDED_DATA, &[]).unwrap_err(),
            Error::ShortBuffer
        ));
        assert!(matches!(
            parse(TYPE_VOICE_HEADER, &[0u8; 8]).unwrap_err(),
            Error::ShortBuffer
        ));
        assert!(matches!(
            parse(TYPE_VOICE_FRAME_A, &[0u8; 32]).unwrap_err(),
            Error::ShortBuffer
        ));
    }

    #[test]
    fn parse_tolerates_trailing_bytes() {
        // 12-byte bursts carry 3 bytes past the FullLc layout.
        let mut data = vec![0u8; FULL_LC_LEN];
        data[5] = 0x01; // target 1
        data.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        let frame = parse(TYPE_VOICE_HEADER, &data).unwrap();
        assert!(matches!(frame, Frame::VoiceHeader(lc) if lc.target.as_u32() == 1));
    }

    #[test]
    fn full_lc_round_trip() {
        let lc = FullLc {
            lc: Lc {
                options: 0x83,
                feature_set_id: 0x10,
            },
            service_options: 0x20,
            target: DmrId::from_u32(91),
            source: DmrId::from_u32(2345678),
        };
        let encoded = lc.encode();
        assert_eq!(encoded.len(), FULL_LC_LEN);
        assert_eq!(FullLc::decode(&encoded).unwrap(), lc);
    }

    #[test]
    fn embedded_data_round_trip() {
        let ed = EmbeddedData {
            lc: Lc {
                options: 0x03,
                feature_set_id: 0x00,
            },
            target: DmrId::from_u32(2620),
            source: DmrId::from_u32(2625094),
        };
        let encoded = ed.encode();
        assert_eq!(encoded.len(), EMBEDDED_DATA_LEN);
        assert_eq!(EmbeddedData::decode(&encoded).unwrap(), ed);
    }

    #[test]
    fn lc_protect_and_opcode() {
        let lc = Lc {
            options: 0x80 | 0x03,
            feature_set_id: 0,
        };
        assert!(lc.protect());
        assert_eq!(lc.opcode(), 0x03);

        let lc = Lc {
            options: 0x7F,
            feature_set_id: 0,
        };
        assert!(!lc.protect());
        assert_eq!(lc.opcode(), 0x7F);
    }
}
