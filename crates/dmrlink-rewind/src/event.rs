//! Consumer-facing events decoded from the Rewind payload stream.

use crate::packet::SuperHeader;

/// A decoded Rewind payload delivered to the consumer sink.
///
/// DMR data events feed straight into the frame codec:
/// `dmrlink_core::frame::parse(event.data_type, &event.data)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewindEvent {
    /// Call metadata preceding voice traffic.
    SuperHeader(SuperHeader),

    /// A DMR data burst.
    DmrData {
        /// DMR data type (low nibble of the packet type, or 0x11 for
        /// embedded data).
        data_type: u8,
        /// Raw burst bytes.
        data: Vec<u8>,
    },

    /// A DMR audio burst.
    DmrAudio {
        /// Voice burst index (offset from the audio base type).
        audio_type: u8,
        /// Raw AMBE bytes.
        data: Vec<u8>,
    },

    /// A payload of a type this client does not interpret.
    Raw {
        /// The packet type as received.
        packet_type: u16,
        /// Raw payload bytes.
        data: Vec<u8>,
    },
}
