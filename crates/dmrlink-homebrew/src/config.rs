//! Repeater configuration and the `RPTC` record encoder.
//!
//! The master learns everything it displays about a repeater -- callsign,
//! frequencies, position, software -- from one space-padded ASCII record
//! sent after authentication. [`Config::check`] normalizes and validates
//! the caller-supplied values; [`Config::encode`] renders the fixed-width
//! record.

use std::sync::OnceLock;

use regex::Regex;

use dmrlink_core::error::{Error, Result};

/// Size of the configuration record proper (without the `RPTC` signature).
pub const RPTC_RECORD_LEN: usize = 302;

/// Size of a full `RPTC` packet: signature plus record.
pub const RPTC_PACKET_LEN: usize = 4 + RPTC_RECORD_LEN;

fn callsign_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z0-9]{0,8}$").expect("callsign regex is valid"))
}

/// Configuration of the repeater presented to the master.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// Callsign of the repeater, 4 to 8 characters `A-Z0-9`.
    pub callsign: String,

    /// DMR ID of the repeater.
    pub id: u32,

    /// RX frequency in Hz.
    pub rx_freq: u32,

    /// TX frequency in Hz.
    pub tx_freq: u32,

    /// TX power in dBm, decimal `[0, 99]`. Clamped, not rejected.
    pub tx_power: u8,

    /// Color code `[0, 15]`.
    pub color_code: u8,

    /// Latitude in degrees, north positive, `[-90, +90]`.
    pub latitude: f64,

    /// Longitude in degrees, east positive, `[-180, +180]`.
    pub longitude: f64,

    /// Antenna height above ground in meters. Clamped to 999.
    pub height: u16,

    /// Location description, at most 20 bytes.
    pub location: String,

    /// Optional description of the repeater, at most 20 bytes.
    pub description: String,

    /// Optional URL for the repeater or group, at most 124 bytes.
    pub url: String,

    /// Software name and version. Defaults to this library when empty.
    pub software_id: String,

    /// Package name with version and platform. Defaults when empty.
    pub package_id: String,
}

impl Config {
    /// Normalize and validate the configuration.
    ///
    /// Uppercases the callsign, clamps `tx_power` and `height`, truncates
    /// over-long string fields, and fills in default software/package IDs,
    /// then runs [`validate`](Self::validate).
    pub fn check(&mut self) -> Result<()> {
        self.callsign = self.callsign.to_uppercase();

        if self.tx_power > 99 {
            self.tx_power = 99;
        }
        if self.height > 999 {
            self.height = 999;
        }

        truncate_bytes(&mut self.location, 20);
        truncate_bytes(&mut self.description, 20);
        truncate_bytes(&mut self.url, 124);

        if self.software_id.is_empty() {
            self.software_id = format!("dmrlink/homebrew {}", env!("CARGO_PKG_VERSION"));
        }
        truncate_bytes(&mut self.software_id, 40);

        if self.package_id.is_empty() {
            self.package_id = format!(
                "rust {}/{}",
                std::env::consts::OS,
                std::env::consts::ARCH
            );
        }
        truncate_bytes(&mut self.package_id, 40);

        self.validate()
    }

    /// Validate without normalizing. Run on every send so a configuration
    /// mutated after construction cannot reach the wire invalid.
    pub fn validate(&self) -> Result<()> {
        if self.callsign.len() < 4 || self.callsign.len() > 8 {
            return Err(Error::InvalidCallsign);
        }
        if !callsign_regex().is_match(&self.callsign) {
            return Err(Error::InvalidCallsign);
        }
        if self.color_code > 15 {
            return Err(Error::InvalidColorCode);
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::InvalidLatitude);
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::InvalidLongitude);
        }
        Ok(())
    }

    /// Render the full `RPTC` packet (signature + 302-byte record).
    ///
    /// String fields are right-padded with spaces and truncated to their
    /// field width; numbers are zero-padded decimal except the ID, which
    /// is 8 lowercase hex digits. Coordinates render with a period decimal
    /// separator regardless of host locale.
    pub fn encode(&self) -> [u8; RPTC_PACKET_LEN] {
        let mut buf = [0u8; RPTC_PACKET_LEN];
        let mut cursor = 0;

        put_field(&mut buf, &mut cursor, "RPTC", 4);
        put_field(&mut buf, &mut cursor, &self.callsign, 8);
        put_field(&mut buf, &mut cursor, &format!("{:08x}", self.id), 8);
        put_field(&mut buf, &mut cursor, &format!("{:09}", self.rx_freq), 9);
        put_field(&mut buf, &mut cursor, &format!("{:09}", self.tx_freq), 9);
        put_field(&mut buf, &mut cursor, &format!("{:02}", self.tx_power), 2);
        put_field(&mut buf, &mut cursor, &format!("{:02}", self.color_code), 2);
        put_field(&mut buf, &mut cursor, &format!("{:.6}", self.latitude), 8);
        put_field(&mut buf, &mut cursor, &format!("{:.6}", self.longitude), 9);
        put_field(&mut buf, &mut cursor, &format!("{:03}", self.height), 3);
        put_field(&mut buf, &mut cursor, &self.location, 20);
        put_field(&mut buf, &mut cursor, &self.description, 20);
        put_field(&mut buf, &mut cursor, &self.url, 124);
        put_field(&mut buf, &mut cursor, &self.software_id, 40);
        put_field(&mut buf, &mut cursor, &self.package_id, 40);

        debug_assert_eq!(cursor, RPTC_PACKET_LEN);
        buf
    }
}

/// Write `s` into the next `width` bytes of `buf`: truncated to `width`,
/// right-padded with spaces.
fn put_field(buf: &mut [u8], cursor: &mut usize, s: &str, width: usize) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(width);
    buf[*cursor..*cursor + n].copy_from_slice(&bytes[..n]);
    for slot in &mut buf[*cursor + n..*cursor + width] {
        *slot = b' ';
    }
    *cursor += width;
}

/// Truncate a string to at most `max` bytes without splitting a character.
fn truncate_bytes(s: &mut String, max: usize) {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
}
