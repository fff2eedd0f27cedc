//! dmrlink-rewind: Rewind simple-external-application protocol client.
//!
//! The Rewind protocol lets lightweight applications attach directly to a
//! DMR master server to receive (and optionally send) traffic for one or
//! more DMR IDs, without posing as a repeater. This crate provides
//! [`RewindClient`], the application-side protocol engine, plus the packet
//! header codec and the payload taxonomy.
//!
//! Decoded payloads are delivered to the consumer as [`RewindEvent`]s; the
//! DMR data variants feed directly into `dmrlink_core::frame::parse`.

pub mod client;
pub mod event;
pub mod packet;

pub use client::{ClientOptions, RewindClient};
pub use event::RewindEvent;
pub use packet::{
    ConfigurationData, PacketHeader, Payload, SessionType, SubscriptionData, SuperHeader,
    VersionData,
};
