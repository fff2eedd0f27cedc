//! DMR station and talk-group identifiers.
//!
//! A DMR ID is a 24-bit unsigned integer carried big-endian as three bytes
//! in Link Control and in the Homebrew `DMRD` record. [`DmrId`] stores the
//! wire form and converts to and from the 32-bit representation used by
//! registries and user interfaces.

use std::fmt;

/// A 24-bit DMR identifier in wire (big-endian three byte) form.
///
/// Identifies a subscriber, a repeater, or a talk-group depending on
/// context. The decimal rendering of the 32-bit value is the form users
/// know from the DMR-MARC / RadioID registries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DmrId([u8; 3]);

impl DmrId {
    /// Create an ID from a 32-bit value. Only the low 24 bits are kept.
    pub fn from_u32(id: u32) -> Self {
        DmrId([(id >> 16) as u8, (id >> 8) as u8, id as u8])
    }

    /// Create an ID directly from its three wire bytes (big-endian).
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        DmrId(bytes)
    }

    /// Return the 32-bit value of this ID (high byte always zero).
    pub fn as_u32(&self) -> u32 {
        u32::from(self.0[0]) << 16 | u32::from(self.0[1]) << 8 | u32::from(self.0[2])
    }

    /// Return the three wire bytes (big-endian).
    pub fn as_bytes(&self) -> [u8; 3] {
        self.0
    }
}

impl fmt::Display for DmrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

impl From<u32> for DmrId {
    fn from(id: u32) -> Self {
        DmrId::from_u32(id)
    }
}

impl From<DmrId> for u32 {
    fn from(id: DmrId) -> Self {
        id.as_u32()
    }
}
